//! Multi-node replication over real HTTP on localhost
//!
//! Each node gets a membership port and the replication port right above it.

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use itemchain::config::Config;
use itemchain::error::ChainError;
use itemchain::network::{membership_router, Peer, PeerBook};
use itemchain::node::{Node, NodeState};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const HOST: &str = "127.0.0.1";

/// Bind an adjacent (membership, replication) port pair.
async fn bind_pair() -> (u16, TcpListener, TcpListener) {
    loop {
        let replication = TcpListener::bind((HOST, 0)).await.expect("bind replication");
        let port = replication.local_addr().expect("local addr").port();
        if port <= 1 {
            continue;
        }
        if let Ok(membership) = TcpListener::bind((HOST, port - 1)).await {
            return (port - 1, membership, replication);
        }
    }
}

fn config_for(base_port: u16, join: Option<u16>) -> Config {
    let mut config = Config::default();
    config.node.name = format!("node-{}", base_port);
    config.network.bind_host = HOST.to_string();
    config.network.advertise_host = Some(HOST.to_string());
    config.network.base_port = base_port;
    config.network.join = join.map(|port| format!("{}:{}", HOST, port));
    config.network.request_timeout_secs = 2;
    config
}

struct RunningNode {
    node: Arc<Node>,
    base_port: u16,
    servers: Vec<JoinHandle<()>>,
}

impl Drop for RunningNode {
    fn drop(&mut self) {
        for server in &self.servers {
            server.abort();
        }
    }
}

async fn start_node(join: Option<u16>) -> RunningNode {
    let (base_port, membership, replication) = bind_pair().await;
    let node = Arc::new(Node::from_config(config_for(base_port, join)).expect("create node"));
    let servers = node.spawn_servers(membership, replication);
    node.bootstrap().await.expect("bootstrap");
    node.replicator.activate().await.expect("activate");
    RunningNode {
        node,
        base_port,
        servers,
    }
}

#[tokio::test]
async fn test_joiner_adopts_existing_chain() {
    let root = start_node(None).await;
    root.node.mint("gucci bag", "alice").await.expect("mint");
    root.node.mint("scarf", "alice").await.expect("mint");

    let joiner = start_node(Some(root.base_port)).await;

    assert_eq!(joiner.node.replicator.snapshot().await, root.node.replicator.snapshot().await);
    assert_eq!(joiner.node.items_of_owner("alice").await.len(), 2);
    assert!(joiner.node.validate_chain().await.is_ok());

    // Both sides know each other.
    let root_peers = root.node.replicator.peers().peers();
    assert_eq!(root_peers, vec![Peer::new(HOST.to_string(), joiner.base_port)]);
    let joiner_peers = joiner.node.replicator.peers().peers();
    assert_eq!(joiner_peers, vec![Peer::new(HOST.to_string(), root.base_port)]);
}

#[tokio::test]
async fn test_join_through_unreachable_member_fails() {
    let (dead_port, membership, replication) = bind_pair().await;
    drop(membership);
    drop(replication);

    let (base_port, membership, replication) = bind_pair().await;
    let node = Arc::new(Node::from_config(config_for(base_port, Some(dead_port))).expect("create node"));
    let servers = node.spawn_servers(membership, replication);

    assert!(node.bootstrap().await.is_err());
    assert_eq!(node.state().await, NodeState::Failed);
    assert!(node.mint("lamp", "frank").await.is_err());

    for server in servers {
        server.abort();
    }
}

#[tokio::test]
async fn test_broadcast_reaches_live_peers_despite_dead_one() {
    let a = start_node(None).await;
    let b = start_node(Some(a.base_port)).await;
    let c = start_node(Some(a.base_port)).await;

    // c learned about b from a's member list and announced itself to b.
    assert_eq!(a.node.replicator.peers().peer_count(), 2);
    assert_eq!(b.node.replicator.peers().peer_count(), 2);
    assert_eq!(c.node.replicator.peers().peer_count(), 2);

    let (dead_port, membership, replication) = bind_pair().await;
    drop(membership);
    drop(replication);
    let dead = Peer::new(HOST.to_string(), dead_port);
    assert!(a.node.replicator.peers().add_peer(dead.clone()));

    let commit = a.node.mint("gucci bag", "alice").await.expect("mint");
    assert_eq!(commit.broadcast.len(), 3);
    let deliveries = commit.broadcast.settle().await;
    assert_eq!(deliveries.len(), 3);
    for delivery in &deliveries {
        if delivery.peer == dead {
            assert!(delivery.result.is_err());
        } else {
            assert!(delivery.result.is_ok(), "delivery to {} failed", delivery.peer);
        }
    }

    let expected = a.node.replicator.snapshot().await;
    assert_eq!(expected.len(), 2);
    assert_eq!(b.node.replicator.snapshot().await, expected);
    assert_eq!(c.node.replicator.snapshot().await, expected);

    // A block committed on a joiner flows back to the others.
    let commit = c
        .node
        .transfer("gucci bag", "alice", "bob", None)
        .await
        .expect("transfer");
    commit.broadcast.settle().await;

    for running in [&a, &b, &c] {
        let items = running.node.items_of_owner("bob").await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_name, "gucci bag");
        assert_eq!(running.node.chain_info().await.height, Some(2));
    }
}

#[tokio::test]
async fn test_no_local_address_leaves_node_failed() {
    let mut config = config_for(7400, None);
    config.network.advertise_host = None;
    let node = Node::from_config(config)
        .expect("create node")
        .with_address_discovery(|| Err(ChainError::NoLocalAddress("only found 127.0.0.1".to_string())));

    assert!(matches!(node.bootstrap().await, Err(ChainError::NoLocalAddress(_))));
    assert_eq!(node.state().await, NodeState::Failed);
    assert!(node.replicator.snapshot().await.is_empty());
    assert!(node.replicator.activate().await.is_err());
}

#[tokio::test]
async fn test_unparsable_join_target_leaves_node_failed() {
    let mut config = config_for(7400, None);
    config.network.join = Some("no-port".to_string());
    let node = Node::from_config(config).expect("create node");

    assert!(matches!(node.bootstrap().await, Err(ChainError::ConfigError(_))));
    assert_eq!(node.state().await, NodeState::Failed);
}

#[tokio::test]
async fn test_undecodable_snapshot_leaves_joiner_failed() {
    // A member that admits joiners but serves garbage instead of its chain.
    let (friend_port, membership, replication) = bind_pair().await;
    let book = Arc::new(PeerBook::new());
    book.start_network(Peer::new(HOST.to_string(), friend_port));
    let membership_app = membership_router(book.clone());
    let replication_app = Router::new().route("/chain-snapshot", get(|| async { "{not json" }));
    let friend_servers = vec![
        tokio::spawn(async move {
            let _ = axum::serve(membership, membership_app).await;
        }),
        tokio::spawn(async move {
            let _ = axum::serve(replication, replication_app).await;
        }),
    ];

    let (base_port, membership, replication) = bind_pair().await;
    let node = Arc::new(Node::from_config(config_for(base_port, Some(friend_port))).expect("create node"));
    let servers = node.spawn_servers(membership, replication);

    assert!(matches!(node.bootstrap().await, Err(ChainError::DecodeError(_))));
    assert_eq!(node.state().await, NodeState::Failed);
    assert!(node.replicator.snapshot().await.is_empty());
    assert_eq!(node.replicator.peers().peer_count(), 0);
    // The friend did record the joiner before the snapshot was fetched.
    assert_eq!(book.peer_count(), 1);

    for server in servers.into_iter().chain(friend_servers) {
        server.abort();
    }
}
