//! Chain replication for itemchain
//!
//! This module provides:
//! - Bootstrap as the first node (genesis) or as a joiner (membership exchange
//!   plus a chain snapshot from the contacted member)
//! - Fire-and-forget broadcast of new blocks, one independent task per peer
//! - Acceptance of inbound blocks against the local tip
//!
//! There is no retry and no reconciliation. A peer that misses a block stays
//! behind, and a competing block for an index that is already filled is
//! rejected by every node that saw the other one first.

use crate::blockchain::{Block, Blockchain};
use crate::error::{ChainError, Result};
use crate::network::{Peer, PeerBook};
use crate::node::NodeState;
use crate::transaction::Transaction;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How a node reaches its peers. Every call is independent; callers decide
/// what a failure means.
pub trait BlockTransport: Clone + Send + Sync + 'static {
    /// Ask `friend` to admit `me`; returns every member `friend` knows, itself included.
    fn join_membership(
        &self,
        friend: &Peer,
        me: &Peer,
    ) -> impl Future<Output = Result<Vec<Peer>>> + Send;

    /// Tell `peer` that `me` exists.
    fn announce(&self, peer: &Peer, me: &Peer) -> impl Future<Output = Result<()>> + Send;

    /// Download `peer`'s full chain.
    fn fetch_chain(&self, peer: &Peer) -> impl Future<Output = Result<Vec<Block>>> + Send;

    /// Offer `block` to `peer`. Success means delivered, not accepted.
    fn push_block(&self, peer: &Peer, block: &Block) -> impl Future<Output = Result<()>> + Send;
}

/// JSON over HTTP, the production transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl BlockTransport for HttpTransport {
    async fn join_membership(&self, friend: &Peer, me: &Peer) -> Result<Vec<Peer>> {
        let response = self
            .client
            .post(friend.membership_url("/membership/join"))
            .json(me)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn announce(&self, peer: &Peer, me: &Peer) -> Result<()> {
        self.client
            .post(peer.membership_url("/membership/announce"))
            .json(me)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_chain(&self, peer: &Peer) -> Result<Vec<Block>> {
        let response = self
            .client
            .get(peer.replication_url("/chain-snapshot"))
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn push_block(&self, peer: &Peer, block: &Block) -> Result<()> {
        self.client
            .post(peer.replication_url("/inbound-block"))
            .json(block)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Outcome of offering a block to one peer.
#[derive(Debug)]
pub struct Delivery {
    pub peer: Peer,
    pub result: Result<()>,
}

/// Handles to the per-peer delivery tasks of one broadcast.
///
/// Dropping it detaches the tasks; they still run to completion.
#[derive(Debug, Default)]
pub struct Broadcast {
    deliveries: Vec<JoinHandle<Delivery>>,
}

impl Broadcast {
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// Wait for every delivery task to finish. Only observes outcomes.
    pub async fn settle(self) -> Vec<Delivery> {
        let mut outcomes = Vec::with_capacity(self.deliveries.len());
        for handle in self.deliveries {
            match handle.await {
                Ok(delivery) => outcomes.push(delivery),
                Err(e) => warn!(error = %e, "delivery task did not finish"),
            }
        }
        outcomes
    }
}

/// A block appended locally and the broadcast announcing it.
#[derive(Debug)]
pub struct Commit {
    pub block: Block,
    pub broadcast: Broadcast,
}

/// Owns the node's chain and keeps it in step with peers.
pub struct Replicator<T: BlockTransport> {
    chain: Arc<RwLock<Blockchain>>,
    peers: Arc<PeerBook>,
    state: Arc<RwLock<NodeState>>,
    transport: T,
}

impl<T: BlockTransport> Clone for Replicator<T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            peers: self.peers.clone(),
            state: self.state.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: BlockTransport> Replicator<T> {
    pub fn new(peers: Arc<PeerBook>, transport: T) -> Self {
        Self {
            chain: Arc::new(RwLock::new(Blockchain::new())),
            peers,
            state: Arc::new(RwLock::new(NodeState::Uninitialized)),
            transport,
        }
    }

    pub fn chain(&self) -> Arc<RwLock<Blockchain>> {
        self.chain.clone()
    }

    pub fn peers(&self) -> &Arc<PeerBook> {
        &self.peers
    }

    pub async fn state(&self) -> NodeState {
        *self.state.read().await
    }

    fn ensure_bootstrappable(state: NodeState) -> Result<()> {
        match state {
            NodeState::Uninitialized | NodeState::Failed => Ok(()),
            state => Err(ChainError::AlreadyInitialized(format!("{:?}", state))),
        }
    }

    /// Mark a node that has not bootstrapped yet as unusable, e.g. when no
    /// local address could be found. An operational node keeps its state.
    pub async fn fail(&self, reason: &ChainError) {
        let mut state = self.state.write().await;
        if Self::ensure_bootstrappable(*state).is_ok() {
            error!(error = %reason, "node is not operational");
            *state = NodeState::Failed;
        } else {
            warn!(error = %reason, state = ?*state, "bootstrap rejected");
        }
    }

    /// Start a new network: this node holds the genesis block and nothing else.
    ///
    /// The state lock is held for the whole transition, so concurrent
    /// bootstraps cannot both succeed.
    pub async fn bootstrap_genesis(&self, me: Peer) -> Result<()> {
        let mut state = self.state.write().await;
        Self::ensure_bootstrappable(*state)?;
        self.peers.start_network(me);
        *self.chain.write().await = Blockchain::with_genesis();
        *state = NodeState::GenesisRoot;
        info!("bootstrapped as genesis root");
        Ok(())
    }

    /// Join through `friend`: exchange membership, then adopt its chain.
    ///
    /// Any failure, including a snapshot that does not decode or validate,
    /// leaves the node `Failed` with an empty chain and no peers.
    pub async fn bootstrap_join(&self, friend: Peer, me: Peer) -> Result<()> {
        let mut state = self.state.write().await;
        Self::ensure_bootstrappable(*state)?;
        match self.join(&friend, &me).await {
            Ok(height) => {
                *state = NodeState::Joined;
                info!(friend = %friend, height, peers = self.peers.peer_count(), "joined network");
                Ok(())
            }
            Err(e) => {
                self.peers.clear();
                *self.chain.write().await = Blockchain::new();
                error!(friend = %friend, error = %e, "join failed, node is not operational");
                *state = NodeState::Failed;
                Err(e)
            }
        }
    }

    async fn join(&self, friend: &Peer, me: &Peer) -> Result<u64> {
        self.peers.register_self(me.clone());
        let members = self.transport.join_membership(friend, me).await?;
        self.peers.add_peer(friend.clone());
        self.peers.add_peers(members);

        for peer in self.peers.peers().into_iter().filter(|p| p != friend) {
            if let Err(e) = self.transport.announce(&peer, me).await {
                warn!(peer = %peer, error = %e, "could not announce to peer");
            }
        }

        let blocks = self.transport.fetch_chain(friend).await?;
        let mut chain = self.chain.write().await;
        chain.replace(blocks)?;
        Ok(chain.height().unwrap_or(0))
    }

    /// Move a bootstrapped node to `Active`.
    pub async fn activate(&self) -> Result<()> {
        let mut state = self.state.write().await;
        match *state {
            NodeState::GenesisRoot | NodeState::Joined | NodeState::Active => {
                *state = NodeState::Active;
                Ok(())
            }
            _ => Err(ChainError::NotInitialized),
        }
    }

    /// Append a block carrying `transaction` and broadcast it.
    ///
    /// The block is generated from the tip under the same write lock that
    /// appends it; the broadcast starts after the lock is released.
    pub async fn commit(&self, transaction: Transaction) -> Result<Commit> {
        let block = {
            let mut chain = self.chain.write().await;
            chain.append_transaction(transaction)?
        };
        info!(
            index = block.index,
            hash = %block.hash,
            kind = block.transaction.kind_name(),
            "block committed"
        );
        let broadcast = self.broadcast(&block);
        Ok(Commit { block, broadcast })
    }

    /// Offer `block` to every known peer, each on its own task.
    pub fn broadcast(&self, block: &Block) -> Broadcast {
        let deliveries = self
            .peers
            .peers()
            .into_iter()
            .map(|peer| {
                let transport = self.transport.clone();
                let block = block.clone();
                tokio::spawn(async move {
                    let result = transport.push_block(&peer, &block).await;
                    match &result {
                        Ok(()) => debug!(peer = %peer, index = block.index, "block delivered"),
                        Err(e) => warn!(peer = %peer, index = block.index, error = %e, "block delivery failed"),
                    }
                    Delivery { peer, result }
                })
            })
            .collect();
        Broadcast { deliveries }
    }

    /// Append `candidate` if it is a valid successor of the local tip.
    pub async fn on_inbound_block(&self, candidate: Block) -> bool {
        let index = candidate.index;
        let hash = candidate.hash.clone();
        let accepted = self.chain.write().await.append_validated(candidate);
        if accepted {
            info!(index, hash = %hash, "accepted inbound block");
        } else {
            debug!(index, hash = %hash, "discarded inbound block");
        }
        accepted
    }

    /// Decode and offer a raw inbound payload; undecodable payloads are discarded.
    pub async fn on_inbound_payload(&self, payload: &[u8]) -> bool {
        match serde_json::from_slice::<Block>(payload) {
            Ok(block) => self.on_inbound_block(block).await,
            Err(e) => {
                warn!(error = %e, "discarded undecodable inbound block");
                false
            }
        }
    }

    /// The full local chain, for a joining peer.
    pub async fn snapshot(&self) -> Vec<Block> {
        self.chain.read().await.blocks.clone()
    }
}
