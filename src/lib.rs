//! itemchain - item provenance on a hash-linked ledger replicated by gossip
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger
//! - [`crypto`] - Block digest and random identifiers
//! - [`transaction`] - Transaction kinds and their builders
//! - [`blockchain`] - Genesis, block generation, validation, provenance queries
//! - [`cache`] - Derived ownership cache kept equal to a full replay
//!
//! ## Networking
//! - [`network`] - Peer addressing and the membership directory
//! - [`sync`] - Bootstrap, broadcast and inbound block acceptance
//! - [`api`] - Replication endpoints and the client REST API
//! - [`node`] - Node orchestration and lifecycle
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger
// ============================================================================
pub mod blockchain;
pub mod cache;
pub mod crypto;
pub mod transaction;

// ============================================================================
// Networking
// ============================================================================
pub mod api;
pub mod network;
pub mod node;
pub mod sync;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
