// Thin re-export module: the ledger engine lives in `blockchain/core.rs` and
// its submodules (block construction, validation, ownership replay).

pub mod core;
pub use core::*;
