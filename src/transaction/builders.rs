/// Builders that assemble well-formed transactions from item and user identifiers.
///
/// Builders never read the chain. Callers that only know an item by name must
/// resolve its id first (see `Blockchain::find_owned_item_by_name`).
use crate::crypto::new_unique_id;
use crate::error::ChainError;
use crate::transaction::types::{
    CombineTx, ConsumeTx, MintTx, SplitTx, Transaction, TransactionKind, TransferTx, SYSTEM_USER,
};
use crate::transaction::validation::{
    check_combine_arity, check_split_arity, require_all_non_empty, require_non_empty,
};

fn owned<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().to_string()).collect()
}

fn stamp(kind: TransactionKind) -> Transaction {
    Transaction {
        id: new_unique_id(),
        time_transacted: chrono::Utc::now().timestamp(),
        kind,
    }
}

/// Mint a new item owned by `owner_user`, with a fresh item id.
pub fn build_mint(item_name: &str, owner_user: &str) -> Result<Transaction, ChainError> {
    require_non_empty("item_name", item_name)?;
    require_non_empty("owner_user", owner_user)?;

    Ok(stamp(TransactionKind::Mint(MintTx {
        origin_user: SYSTEM_USER.to_string(),
        destination_user: owner_user.to_string(),
        item_id: new_unique_id(),
        item_name: item_name.to_string(),
    })))
}

/// Move item `item_id` from `origin_user` to `destination_user`.
pub fn build_transfer(
    item_name: &str,
    origin_user: &str,
    destination_user: &str,
    item_id: &str,
) -> Result<Transaction, ChainError> {
    require_non_empty("item_name", item_name)?;
    require_non_empty("origin_user", origin_user)?;
    require_non_empty("destination_user", destination_user)?;
    require_non_empty("item_id", item_id)?;

    Ok(stamp(TransactionKind::Transfer(TransferTx {
        origin_user: origin_user.to_string(),
        destination_user: destination_user.to_string(),
        item_id: item_id.to_string(),
        item_name: item_name.to_string(),
    })))
}

pub fn build_consume(
    item_name: &str,
    owner_user: &str,
    item_id: &str,
) -> Result<Transaction, ChainError> {
    require_non_empty("item_name", item_name)?;
    require_non_empty("owner_user", owner_user)?;
    require_non_empty("item_id", item_id)?;

    Ok(stamp(TransactionKind::Consume(ConsumeTx {
        owner_user: owner_user.to_string(),
        item_id: item_id.to_string(),
        item_name: item_name.to_string(),
    })))
}

/// Combine the listed inputs into one new item owned by `owner_user`.
///
/// Fails with `InvalidArgument` unless there is at least one input and the
/// name and id lists have the same length.
pub fn build_combine<S: AsRef<str>, T: AsRef<str>>(
    input_item_names: &[S],
    input_item_ids: &[T],
    output_item_name: &str,
    owner_user: &str,
) -> Result<Transaction, ChainError> {
    let input_item_names = owned(input_item_names);
    let input_item_ids = owned(input_item_ids);
    check_combine_arity(&input_item_names, &input_item_ids)?;
    require_all_non_empty("input_item_names", &input_item_names)?;
    require_all_non_empty("input_item_ids", &input_item_ids)?;
    require_non_empty("output_item_name", output_item_name)?;
    require_non_empty("owner_user", owner_user)?;

    Ok(stamp(TransactionKind::Combine(CombineTx {
        input_item_names,
        input_item_ids,
        output_item_name: output_item_name.to_string(),
        output_item_id: new_unique_id(),
        owner_user: owner_user.to_string(),
    })))
}

/// Split a source item into parts, `output_item_names[i]` going to
/// `destination_users[i]`. Each part gets a fresh item id.
///
/// Fails with `InvalidArgument` on fewer than two parts or mismatched lengths.
pub fn build_split<S: AsRef<str>, T: AsRef<str>>(
    source_item_name: &str,
    source_item_id: &str,
    output_item_names: &[S],
    owner_user: &str,
    destination_users: &[T],
) -> Result<Transaction, ChainError> {
    let output_item_names = owned(output_item_names);
    let destination_users = owned(destination_users);
    check_split_arity(&output_item_names, &destination_users)?;
    require_non_empty("source_item_name", source_item_name)?;
    require_non_empty("source_item_id", source_item_id)?;
    require_all_non_empty("output_item_names", &output_item_names)?;
    require_all_non_empty("destination_users", &destination_users)?;
    require_non_empty("owner_user", owner_user)?;

    let output_item_ids = output_item_names.iter().map(|_| new_unique_id()).collect();

    Ok(stamp(TransactionKind::Split(SplitTx {
        source_item_name: source_item_name.to_string(),
        source_item_id: source_item_id.to_string(),
        output_item_names,
        output_item_ids,
        owner_user: owner_user.to_string(),
        destination_users,
    })))
}
