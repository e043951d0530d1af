/// Input checks applied by the transaction builders before anything is built
use crate::error::ChainError;

/// Smallest number of parts a split may produce.
pub const MIN_SPLIT_OUTPUTS: usize = 2;

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ChainError> {
    if value.trim().is_empty() {
        return Err(ChainError::InvalidArgument(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub(crate) fn require_all_non_empty(field: &str, values: &[String]) -> Result<(), ChainError> {
    for (i, value) in values.iter().enumerate() {
        require_non_empty(&format!("{}[{}]", field, i), value)?;
    }
    Ok(())
}

/// Combine needs at least one input and a name for every input id.
pub(crate) fn check_combine_arity(names: &[String], ids: &[String]) -> Result<(), ChainError> {
    if names.len() != ids.len() {
        return Err(ChainError::InvalidArgument(format!(
            "combine input names ({}) and ids ({}) differ in length",
            names.len(),
            ids.len()
        )));
    }
    if names.is_empty() {
        return Err(ChainError::InvalidArgument(
            "combine requires at least one input item".to_string(),
        ));
    }
    Ok(())
}

/// Split needs one destination per output and at least two outputs.
pub(crate) fn check_split_arity(outputs: &[String], destinations: &[String]) -> Result<(), ChainError> {
    if outputs.len() != destinations.len() {
        return Err(ChainError::InvalidArgument(format!(
            "split output names ({}) and destination users ({}) differ in length",
            outputs.len(),
            destinations.len()
        )));
    }
    if outputs.len() < MIN_SPLIT_OUTPUTS {
        return Err(ChainError::InvalidArgument(format!(
            "split requires at least {} outputs, got {}",
            MIN_SPLIT_OUTPUTS,
            outputs.len()
        )));
    }
    Ok(())
}
