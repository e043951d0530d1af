#![forbid(unsafe_code)]
//! Command-line client for a running itemchain node's REST API.

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use itemchain::blockchain::OwnedItem;
use itemchain::transaction::{Transaction, TransactionKind};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "itemchain-client", version, about = "Talk to an itemchain node")]
struct Cli {
    /// Node replication address (base port + 1), as host:port
    #[arg(short, long, default_value = "127.0.0.1:7001")]
    node: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new item owned by OWNER
    Mint { item_name: String, owner: String },
    /// Hand an item to another user
    Transfer {
        item_name: String,
        origin_user: String,
        destination_user: String,
        #[arg(long)]
        item_id: Option<String>,
    },
    /// Use an item up
    Consume {
        item_name: String,
        owner: String,
        #[arg(long)]
        item_id: Option<String>,
    },
    /// Merge several items into one new item
    Combine {
        #[arg(long = "name", required = true)]
        input_item_names: Vec<String>,
        #[arg(long = "id", required = true)]
        input_item_ids: Vec<String>,
        #[arg(long)]
        output: String,
        #[arg(long)]
        owner: String,
    },
    /// Break one item into several new items
    Split {
        source_item_name: String,
        source_item_id: String,
        #[arg(long = "output", required = true)]
        output_item_names: Vec<String>,
        #[arg(long = "to", required = true)]
        destination_users: Vec<String>,
        #[arg(long)]
        owner: String,
    },
    /// Every transaction that touched an item
    History { item_id: String },
    /// Items a user currently holds
    Items { user: String },
    /// Chain height, tip and node state
    Chain,
    /// Known peers
    Peers,
}

struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    fn new(node: &str) -> Self {
        Self {
            base: format!("http://{}/api", node),
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<Value, Box<dyn std::error::Error>> {
        let response = self.http.get(format!("{}{}", self.base, path)).send().await?;
        Self::read(response).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, Box<dyn std::error::Error>> {
        let response = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> Result<Value, Box<dyn std::error::Error>> {
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"].as_str().unwrap_or("request failed");
            return Err(format!("{} ({})", message, status).into());
        }
        Ok(body)
    }
}

fn header(label: &str) -> Cell {
    Cell::new(label)
        .fg(TableColor::Cyan)
        .add_attribute(Attribute::Bold)
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| header(h)).collect::<Vec<_>>());
    table
}

fn describe(tx: &Transaction) -> (String, TableColor) {
    match &tx.kind {
        TransactionKind::Mint(m) => (
            format!("{} minted for {}", m.item_name, m.destination_user),
            TableColor::Green,
        ),
        TransactionKind::Transfer(t) => (
            format!("{}: {} -> {}", t.item_name, t.origin_user, t.destination_user),
            TableColor::Yellow,
        ),
        TransactionKind::Consume(c) => (
            format!("{} consumed by {}", c.item_name, c.owner_user),
            TableColor::Red,
        ),
        TransactionKind::Combine(c) => (
            format!(
                "[{}] -> {} for {}",
                c.input_item_names.join(", "),
                c.output_item_name,
                c.owner_user
            ),
            TableColor::Magenta,
        ),
        TransactionKind::Split(s) => (
            format!(
                "{} -> [{}] to [{}]",
                s.source_item_name,
                s.output_item_names.join(", "),
                s.destination_users.join(", ")
            ),
            TableColor::Blue,
        ),
    }
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_commit(body: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let block = &body["block"];
    let tx: Transaction = serde_json::from_value(block["transaction"].clone())?;
    let (details, _) = describe(&tx);

    println!("{}", "✅ Committed".green().bold());
    println!("   block:   #{}", block["index"]);
    println!("   hash:    {}", block["hash"].as_str().unwrap_or_default().bright_black());
    println!("   {}:  {}", tx.kind_name().cyan(), details);
    let created = tx.created_item_ids();
    if !created.is_empty() {
        println!("   new ids: {}", created.join(", ").bright_white());
    }
    println!("   sent to {} peer(s)", body["peers_notified"]);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.node);

    match cli.command {
        Command::Mint { item_name, owner } => {
            let body = client
                .post("/items/mint", json!({ "item_name": item_name, "owner": owner }))
                .await?;
            print_commit(&body)?;
        }
        Command::Transfer {
            item_name,
            origin_user,
            destination_user,
            item_id,
        } => {
            let body = client
                .post(
                    "/items/transfer",
                    json!({
                        "item_name": item_name,
                        "origin_user": origin_user,
                        "destination_user": destination_user,
                        "item_id": item_id,
                    }),
                )
                .await?;
            print_commit(&body)?;
        }
        Command::Consume {
            item_name,
            owner,
            item_id,
        } => {
            let body = client
                .post(
                    "/items/consume",
                    json!({ "item_name": item_name, "owner": owner, "item_id": item_id }),
                )
                .await?;
            print_commit(&body)?;
        }
        Command::Combine {
            input_item_names,
            input_item_ids,
            output,
            owner,
        } => {
            let body = client
                .post(
                    "/items/combine",
                    json!({
                        "input_item_names": input_item_names,
                        "input_item_ids": input_item_ids,
                        "output_item_name": output,
                        "owner": owner,
                    }),
                )
                .await?;
            print_commit(&body)?;
        }
        Command::Split {
            source_item_name,
            source_item_id,
            output_item_names,
            destination_users,
            owner,
        } => {
            let body = client
                .post(
                    "/items/split",
                    json!({
                        "source_item_name": source_item_name,
                        "source_item_id": source_item_id,
                        "output_item_names": output_item_names,
                        "owner": owner,
                        "destination_users": destination_users,
                    }),
                )
                .await?;
            print_commit(&body)?;
        }
        Command::History { item_id } => {
            let body = client.get(&format!("/items/{}/history", item_id)).await?;
            let transactions: Vec<Transaction> =
                serde_json::from_value(body["transactions"].clone())?;
            println!("{}", format!("📜 History of {}", item_id).bright_cyan().bold());
            if transactions.is_empty() {
                println!("{}", "No transactions touch this item.".yellow());
                return Ok(());
            }
            let mut table = new_table(&["Kind", "Details", "Time"]);
            for tx in &transactions {
                let (details, color) = describe(tx);
                table.add_row(vec![
                    Cell::new(tx.kind_name()).fg(color),
                    Cell::new(details).fg(TableColor::White),
                    Cell::new(format_timestamp(tx.time_transacted)).fg(TableColor::Grey),
                ]);
            }
            println!("{}", table);
        }
        Command::Items { user } => {
            let body = client.get(&format!("/owners/{}/items", user)).await?;
            let items: Vec<OwnedItem> = serde_json::from_value(body["items"].clone())?;
            println!("{}", format!("🎒 Items held by {}", user).bright_cyan().bold());
            if items.is_empty() {
                println!("{}", "Nothing here.".yellow());
                return Ok(());
            }
            let mut table = new_table(&["Item", "Id"]);
            for item in &items {
                table.add_row(vec![
                    Cell::new(&item.item_name).fg(TableColor::Green),
                    Cell::new(&item.item_id).fg(TableColor::Grey),
                ]);
            }
            println!("{}", table);
        }
        Command::Chain => {
            let info = client.get("/chain").await?;
            let valid = client.get("/chain/validate").await?;
            println!("{}", "⛓  Chain".bright_cyan().bold());
            println!("   state:  {}", info["node_state"].as_str().unwrap_or("?"));
            println!("   length: {}", info["length"]);
            println!("   tip:    {}", info["tip_hash"].as_str().unwrap_or("-"));
            if valid["valid"].as_bool().unwrap_or(false) {
                println!("   {}", "valid".green());
            } else {
                println!("   {} {}", "invalid:".red(), valid["error"].as_str().unwrap_or(""));
            }
        }
        Command::Peers => {
            let body = client.get("/network/peers").await?;
            println!("{}", "🌐 Peers".bright_cyan().bold());
            println!("   me: {}", body["me"]);
            let mut table = new_table(&["Host", "Membership port"]);
            for peer in body["peers"].as_array().cloned().unwrap_or_default() {
                table.add_row(vec![
                    Cell::new(peer["host"].as_str().unwrap_or("?")),
                    Cell::new(&peer["port"]),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
