/// Transaction types for itemchain
use serde::{Deserialize, Serialize};

/// Origin user recorded on every mint; items come from the system, not a user.
pub const SYSTEM_USER: &str = "-1";

/// A recorded mutation of item ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Unix seconds at which the transaction was built (not the block time).
    pub time_transacted: i64,
    pub kind: TransactionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Mint(MintTx),
    Transfer(TransferTx),
    Consume(ConsumeTx),
    Combine(CombineTx),
    Split(SplitTx),
}

/// Mint: a new item comes into existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTx {
    pub origin_user: String,
    pub destination_user: String,
    pub item_id: String,
    pub item_name: String,
}

/// Transfer: ownership of an existing item moves between users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTx {
    pub origin_user: String,
    pub destination_user: String,
    pub item_id: String,
    pub item_name: String,
}

/// Consume: an item ceases to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeTx {
    pub owner_user: String,
    pub item_id: String,
    pub item_name: String,
}

/// Combine: every input is used up and one new item is made from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombineTx {
    pub input_item_names: Vec<String>,
    pub input_item_ids: Vec<String>,
    pub output_item_name: String,
    pub output_item_id: String,
    pub owner_user: String,
}

/// Split: one item is divided into parts, each handed to a destination user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitTx {
    pub source_item_name: String,
    pub source_item_id: String,
    pub output_item_names: Vec<String>,
    pub output_item_ids: Vec<String>,
    pub owner_user: String,
    pub destination_users: Vec<String>,
}

impl Transaction {
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TransactionKind::Mint(_) => "mint",
            TransactionKind::Transfer(_) => "transfer",
            TransactionKind::Consume(_) => "consume",
            TransactionKind::Combine(_) => "combine",
            TransactionKind::Split(_) => "split",
        }
    }

    /// True when `item_id` is a primary subject of this transaction: the mint
    /// target, the transferred or consumed item, a combine input or output,
    /// or a split source or output.
    pub fn touches(&self, item_id: &str) -> bool {
        match &self.kind {
            TransactionKind::Mint(tx) => tx.item_id == item_id,
            TransactionKind::Transfer(tx) => tx.item_id == item_id,
            TransactionKind::Consume(tx) => tx.item_id == item_id,
            TransactionKind::Combine(tx) => {
                tx.output_item_id == item_id || tx.input_item_ids.iter().any(|id| id == item_id)
            }
            TransactionKind::Split(tx) => {
                tx.source_item_id == item_id || tx.output_item_ids.iter().any(|id| id == item_id)
            }
        }
    }

    /// Ids of the items this transaction brings into existence.
    pub fn created_item_ids(&self) -> Vec<&str> {
        match &self.kind {
            TransactionKind::Mint(tx) => vec![tx.item_id.as_str()],
            TransactionKind::Combine(tx) => vec![tx.output_item_id.as_str()],
            TransactionKind::Split(tx) => tx.output_item_ids.iter().map(String::as_str).collect(),
            TransactionKind::Transfer(_) | TransactionKind::Consume(_) => Vec::new(),
        }
    }
}
