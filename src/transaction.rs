//! Transaction module split into types, builders and input validation

pub mod builders;
pub mod types;
pub mod validation;

pub use builders::*;
pub use types::*;
