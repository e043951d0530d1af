use crate::api::build_replication_router;
use crate::blockchain::{get_item_history, OwnedItem, OwnershipState};
use crate::cache::OwnershipCache;
use crate::config::Config;
use crate::error::{ChainError, Result};
use crate::network::{local_ipv4, membership_router, Peer, PeerBook};
use crate::sync::{BlockTransport, Commit, HttpTransport, Replicator};
use crate::transaction::{
    build_combine, build_consume, build_mint, build_split, build_transfer, Transaction,
};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeState {
    /// No chain yet.
    Uninitialized,
    /// Created the genesis block and started a new network.
    GenesisRoot,
    /// Adopted a chain snapshot from an existing member.
    Joined,
    /// Bootstrapped and serving peers.
    Active,
    /// Bootstrap failed; the node holds no usable chain.
    Failed,
}

impl NodeState {
    /// Whether the node has a chain it can extend and serve.
    pub fn is_operational(&self) -> bool {
        matches!(self, NodeState::GenesisRoot | NodeState::Joined | NodeState::Active)
    }
}

/// Summary of the local chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainInfo {
    pub height: Option<u64>,
    pub length: usize,
    pub tip_hash: Option<String>,
    pub node_state: NodeState,
}

/// Finds the address this host is reachable at when none is configured.
pub type AddressDiscovery = fn() -> Result<IpAddr>;

pub struct Node<T: BlockTransport = HttpTransport> {
    pub config: Config,
    pub replicator: Replicator<T>,
    ownership_cache: OwnershipCache,
    discover_address: AddressDiscovery,
}

impl Node<HttpTransport> {
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(config.network.request_timeout())?;
        Ok(Node::new(config, transport))
    }
}

impl<T: BlockTransport> Node<T> {
    pub fn new(config: Config, transport: T) -> Self {
        let peers = Arc::new(PeerBook::new());
        Self {
            config,
            replicator: Replicator::new(peers, transport),
            ownership_cache: OwnershipCache::default(),
            discover_address: local_ipv4,
        }
    }

    /// Replace the local address probe used when `network.advertise_host` is unset.
    pub fn with_address_discovery(mut self, discover: AddressDiscovery) -> Self {
        self.discover_address = discover;
        self
    }

    pub async fn state(&self) -> NodeState {
        self.replicator.state().await
    }

    /// The address peers reach this node at: the configured advertise host,
    /// or the detected local IPv4 address.
    pub fn local_peer(&self) -> Result<Peer> {
        let host = match &self.config.network.advertise_host {
            Some(host) => host.clone(),
            None => (self.discover_address)()?.to_string(),
        };
        Ok(Peer::new(host, self.config.network.base_port))
    }

    /// Start a network, or join one when `network.join` is configured.
    ///
    /// A missing local address or an unparsable join target leaves a node that
    /// has not bootstrapped yet `Failed`.
    pub async fn bootstrap(&self) -> Result<()> {
        let target = self
            .local_peer()
            .and_then(|me| Ok((me, self.config.network.join_peer()?)));
        let (me, friend) = match target {
            Ok(target) => target,
            Err(e) => {
                self.replicator.fail(&e).await;
                return Err(e);
            }
        };
        match friend {
            Some(friend) => self.replicator.bootstrap_join(friend, me).await,
            None => self.replicator.bootstrap_genesis(me).await,
        }
    }

    // ========================================================================
    // Local mutations
    // ========================================================================

    async fn require_operational(&self) -> Result<()> {
        if self.state().await.is_operational() {
            Ok(())
        } else {
            Err(ChainError::NotInitialized)
        }
    }

    async fn commit(&self, transaction: Transaction) -> Result<Commit> {
        self.require_operational().await?;
        self.replicator.commit(transaction).await
    }

    /// The id of a live item `owner` holds: `item_id` when given, otherwise
    /// the first item held under `item_name`.
    async fn resolve_item(&self, owner: &str, item_name: &str, item_id: Option<&str>) -> Result<String> {
        let chain = self.replicator.chain();
        let chain = chain.read().await;
        match item_id {
            Some(id) => {
                if OwnershipState::replay(&chain.blocks).owner_of(id) == Some(owner) {
                    Ok(id.to_string())
                } else {
                    Err(ChainError::ItemNotFound(format!("{} holds no item {}", owner, id)))
                }
            }
            None => chain
                .find_owned_item_by_name(owner, item_name)
                .map(|item| item.item_id)
                .ok_or_else(|| ChainError::ItemNotFound(format!("{} holds no '{}'", owner, item_name))),
        }
    }

    pub async fn mint(&self, item_name: &str, owner: &str) -> Result<Commit> {
        self.commit(build_mint(item_name, owner)?).await
    }

    pub async fn transfer(
        &self,
        item_name: &str,
        origin_user: &str,
        destination_user: &str,
        item_id: Option<&str>,
    ) -> Result<Commit> {
        let item_id = self.resolve_item(origin_user, item_name, item_id).await?;
        self.commit(build_transfer(item_name, origin_user, destination_user, &item_id)?)
            .await
    }

    pub async fn consume(&self, item_name: &str, owner: &str, item_id: Option<&str>) -> Result<Commit> {
        let item_id = self.resolve_item(owner, item_name, item_id).await?;
        self.commit(build_consume(item_name, owner, &item_id)?).await
    }

    pub async fn combine(
        &self,
        input_item_names: &[String],
        input_item_ids: &[String],
        output_item_name: &str,
        owner: &str,
    ) -> Result<Commit> {
        let tx = build_combine(input_item_names, input_item_ids, output_item_name, owner)?;
        self.commit(tx).await
    }

    pub async fn split(
        &self,
        source_item_name: &str,
        source_item_id: &str,
        output_item_names: &[String],
        owner: &str,
        destination_users: &[String],
    ) -> Result<Commit> {
        let tx = build_split(
            source_item_name,
            source_item_id,
            output_item_names,
            owner,
            destination_users,
        )?;
        self.commit(tx).await
    }

    // ========================================================================
    // Queries (empty results on an empty chain)
    // ========================================================================

    pub async fn item_history(&self, item_id: &str) -> Vec<Transaction> {
        let chain = self.replicator.chain();
        let chain = chain.read().await;
        get_item_history(item_id, &chain.blocks)
    }

    pub async fn items_of_owner(&self, user: &str) -> Vec<OwnedItem> {
        let chain = self.replicator.chain();
        let chain = chain.read().await;
        self.ownership_cache.items_of_owner(user, &chain.blocks)
    }

    pub async fn chain_info(&self) -> ChainInfo {
        let node_state = self.state().await;
        let chain = self.replicator.chain();
        let chain = chain.read().await;
        ChainInfo {
            height: chain.height(),
            length: chain.len(),
            tip_hash: chain.tip().map(|b| b.hash.clone()),
            node_state,
        }
    }

    pub async fn validate_chain(&self) -> Result<()> {
        let chain = self.replicator.chain();
        let chain = chain.read().await;
        chain.validate()
    }

    // ========================================================================
    // Servers
    // ========================================================================

    /// Bind the membership (base port) and replication (base port + 1) listeners.
    pub async fn bind(&self) -> Result<(TcpListener, TcpListener)> {
        let host = self.config.network.bind_host.as_str();
        let base_port = self.config.network.base_port;
        let membership = TcpListener::bind((host, base_port)).await.map_err(|e| {
            ChainError::NetworkError(format!("membership port {} unavailable: {}", base_port, e))
        })?;
        let replication_port = Peer::new(host.to_string(), base_port).replication_port();
        let replication = TcpListener::bind((host, replication_port)).await.map_err(|e| {
            ChainError::NetworkError(format!(
                "replication port {} unavailable: {}",
                replication_port, e
            ))
        })?;
        Ok((membership, replication))
    }

    /// Serve membership and replication traffic on already-bound listeners.
    pub fn spawn_servers(
        self: &Arc<Self>,
        membership: TcpListener,
        replication: TcpListener,
    ) -> Vec<JoinHandle<()>> {
        let membership_app = membership_router(self.replicator.peers().clone());
        let replication_app = build_replication_router(self.clone());

        let membership_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(membership, membership_app).await {
                error!("membership server failed: {}", e);
            }
        });
        let replication_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(replication, replication_app).await {
                error!("replication server failed: {}", e);
            }
        });
        vec![membership_task, replication_task]
    }

    /// Bind, serve, bootstrap, then run until Ctrl-C.
    ///
    /// Servers come up before bootstrap so a joiner can receive blocks as soon
    /// as peers learn about it.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let (membership, replication) = self.bind().await?;
        info!(
            name = %self.config.node.name,
            membership = %membership.local_addr()?,
            replication = %replication.local_addr()?,
            "listening"
        );
        let servers = self.spawn_servers(membership, replication);

        self.bootstrap().await?;
        self.replicator.activate().await?;
        let chain = self.chain_info().await;
        info!(height = ?chain.height, peers = self.replicator.peers().peer_count(), "node active");

        tokio::signal::ctrl_c().await?;
        info!("shutting down");
        for server in servers {
            server.abort();
        }
        Ok(())
    }
}
