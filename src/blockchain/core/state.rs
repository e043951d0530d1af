use crate::transaction::{Transaction, TransactionKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::chain::Block;

/// An item that currently exists, with its current owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedItem {
    pub item_id: String,
    pub item_name: String,
    pub owner: String,
}

/// Item id to current holder, derived by replaying transactions in chain order.
#[derive(Debug, Clone, Default)]
pub struct OwnershipState {
    pub items: HashMap<String, OwnedItem>,
}

impl OwnershipState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay every non-genesis block of `blocks` from scratch.
    pub fn replay(blocks: &[Block]) -> Self {
        let mut state = Self::new();
        for block in blocks.iter().filter(|b| !b.is_genesis()) {
            state.apply_transaction(&block.transaction);
        }
        state
    }

    fn insert(&mut self, item_id: &str, item_name: &str, owner: &str) {
        self.items.insert(
            item_id.to_string(),
            OwnedItem {
                item_id: item_id.to_string(),
                item_name: item_name.to_string(),
                owner: owner.to_string(),
            },
        );
    }

    /// Apply one transaction's ownership effect. Nothing is checked: the
    /// ledger records who claims to move what, it does not authorize it.
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        match &tx.kind {
            TransactionKind::Mint(tx) => {
                self.insert(&tx.item_id, &tx.item_name, &tx.destination_user);
            }
            // Only a live item can change hands; consumed or unknown ids stay gone.
            TransactionKind::Transfer(tx) => {
                if let Some(item) = self.items.get_mut(&tx.item_id) {
                    item.owner = tx.destination_user.clone();
                }
            }
            TransactionKind::Consume(tx) => {
                self.items.remove(&tx.item_id);
            }
            TransactionKind::Combine(tx) => {
                for input in &tx.input_item_ids {
                    self.items.remove(input);
                }
                self.insert(&tx.output_item_id, &tx.output_item_name, &tx.owner_user);
            }
            TransactionKind::Split(tx) => {
                self.items.remove(&tx.source_item_id);
                let parts = tx
                    .output_item_ids
                    .iter()
                    .zip(&tx.output_item_names)
                    .zip(&tx.destination_users);
                for ((item_id, item_name), destination) in parts {
                    self.insert(item_id, item_name, destination);
                }
            }
        }
    }

    /// Items held by `user`, sorted by item id.
    pub fn items_of(&self, user: &str) -> Vec<OwnedItem> {
        let mut owned: Vec<OwnedItem> = self
            .items
            .values()
            .filter(|item| item.owner == user)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        owned
    }

    pub fn owner_of(&self, item_id: &str) -> Option<&str> {
        self.items.get(item_id).map(|item| item.owner.as_str())
    }
}

/// Every transaction that has `item_id` as a primary subject, in chain order.
pub fn get_item_history(item_id: &str, blocks: &[Block]) -> Vec<Transaction> {
    blocks
        .iter()
        .filter(|b| !b.is_genesis())
        .map(|b| &b.transaction)
        .filter(|tx| tx.touches(item_id))
        .cloned()
        .collect()
}

/// Items currently owned by `user_id`, re-derived by a full replay.
pub fn get_items_of_owner(user_id: &str, blocks: &[Block]) -> Vec<OwnedItem> {
    OwnershipState::replay(blocks).items_of(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::core::chain::{genesis, Blockchain, GENESIS_ID};
    use crate::transaction::{
        build_combine, build_consume, build_split, MintTx, TransferTx, SYSTEM_USER,
    };

    fn mint(item_id: &str, item_name: &str, owner: &str) -> Transaction {
        Transaction {
            id: format!("mint-{}", item_id),
            time_transacted: chrono::Utc::now().timestamp(),
            kind: TransactionKind::Mint(MintTx {
                origin_user: SYSTEM_USER.to_string(),
                destination_user: owner.to_string(),
                item_id: item_id.to_string(),
                item_name: item_name.to_string(),
            }),
        }
    }

    fn transfer(item_id: &str, item_name: &str, from: &str, to: &str) -> Transaction {
        Transaction {
            id: format!("transfer-{}-{}", item_id, to),
            time_transacted: chrono::Utc::now().timestamp(),
            kind: TransactionKind::Transfer(TransferTx {
                origin_user: from.to_string(),
                destination_user: to.to_string(),
                item_id: item_id.to_string(),
                item_name: item_name.to_string(),
            }),
        }
    }

    /// genesis -> mint gucci to shreya1 -> transfer to shreya2 -> mint scarf to shreya1
    fn sample_chain() -> Blockchain {
        let mut chain = Blockchain::with_genesis();
        chain.append_transaction(mint("gucci_test", "Gucci bag", "shreya1")).unwrap();
        chain
            .append_transaction(transfer("gucci_test", "Gucci bag", "shreya1", "shreya2"))
            .unwrap();
        chain.append_transaction(mint("scarf_test", "Scarf", "shreya1")).unwrap();
        chain
    }

    #[test]
    fn test_item_history() {
        let chain = sample_chain();
        assert_eq!(chain.len(), 4);

        let gucci = get_item_history("gucci_test", &chain.blocks);
        assert_eq!(gucci.len(), 2);
        assert_eq!(gucci[0].kind_name(), "mint");
        assert_eq!(gucci[1].kind_name(), "transfer");

        let scarf = get_item_history("scarf_test", &chain.blocks);
        assert_eq!(scarf.len(), 1);
        assert_eq!(scarf[0], chain.blocks[3].transaction);
    }

    #[test]
    fn test_items_of_owner() {
        let chain = sample_chain();
        let shreya1 = get_items_of_owner("shreya1", &chain.blocks);
        assert_eq!(shreya1.len(), 1);
        assert_eq!(shreya1[0].item_id, "scarf_test");

        let shreya2 = get_items_of_owner("shreya2", &chain.blocks);
        assert_eq!(shreya2.len(), 1);
        assert_eq!(shreya2[0].item_id, "gucci_test");
        assert_eq!(shreya2[0].item_name, "Gucci bag");
    }

    #[test]
    fn test_queries_on_empty_chain() {
        assert!(get_item_history("gucci_test", &[]).is_empty());
        assert!(get_items_of_owner("shreya1", &[]).is_empty());
    }

    #[test]
    fn test_genesis_sentinel_is_not_an_item() {
        let blocks = vec![genesis()];
        assert!(get_item_history(GENESIS_ID, &blocks).is_empty());
        assert!(get_items_of_owner(SYSTEM_USER, &blocks).is_empty());
    }

    #[test]
    fn test_consume_combine_split_replay() {
        let mut chain = Blockchain::with_genesis();
        chain.append_transaction(mint("eggs", "Eggs", "l337")).unwrap();
        chain.append_transaction(mint("milk", "Milk", "l337")).unwrap();
        chain.append_transaction(mint("salt", "Salt", "l337")).unwrap();

        let cake = build_combine(&["Eggs", "Milk"], &["eggs", "milk"], "Cake", "l337").unwrap();
        let cake_id = cake.created_item_ids()[0].to_string();
        chain.append_transaction(cake).unwrap();

        let split = build_split("Cake", &cake_id, &["Slice", "Slice"], "l337", &["l33a", "l33b"])
            .unwrap();
        let slice_ids: Vec<String> =
            split.created_item_ids().iter().map(|s| s.to_string()).collect();
        chain.append_transaction(split).unwrap();

        chain.append_transaction(build_consume("Salt", "l337", "salt").unwrap()).unwrap();

        assert!(get_items_of_owner("l337", &chain.blocks).is_empty());
        let a = get_items_of_owner("l33a", &chain.blocks);
        let b = get_items_of_owner("l33b", &chain.blocks);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(a[0].item_id, slice_ids[0]);
        assert_eq!(b[0].item_id, slice_ids[1]);

        // Combine input, combine output (as split source) and split outputs
        assert_eq!(get_item_history("eggs", &chain.blocks).len(), 2);
        assert_eq!(get_item_history(&cake_id, &chain.blocks).len(), 2);
        assert_eq!(get_item_history(&slice_ids[1], &chain.blocks).len(), 1);
        assert_eq!(get_item_history("salt", &chain.blocks).len(), 2);

        let state = OwnershipState::replay(&chain.blocks);
        assert_eq!(state.owner_of("eggs"), None);
        assert_eq!(state.owner_of(&slice_ids[0]), Some("l33a"));
    }

    #[test]
    fn test_transfer_cannot_revive_or_invent_items() {
        let mut chain = Blockchain::with_genesis();
        chain.append_transaction(mint("eggs", "Eggs", "alice")).unwrap();
        chain.append_transaction(build_consume("Eggs", "alice", "eggs").unwrap()).unwrap();
        chain.append_transaction(transfer("eggs", "Eggs", "alice", "bob")).unwrap();
        chain
            .append_transaction(transfer("never-minted", "Ghost", "mallory", "bob"))
            .unwrap();

        assert!(get_items_of_owner("alice", &chain.blocks).is_empty());
        assert!(get_items_of_owner("bob", &chain.blocks).is_empty());
        assert!(get_items_of_owner("mallory", &chain.blocks).is_empty());

        let state = OwnershipState::replay(&chain.blocks);
        assert_eq!(state.owner_of("eggs"), None);
        assert_eq!(state.owner_of("never-minted"), None);

        // Both transfers are still recorded in the item's history.
        assert_eq!(get_item_history("eggs", &chain.blocks).len(), 3);
    }

    #[test]
    fn test_find_owned_item_by_name() {
        let chain = sample_chain();
        let found = chain.find_owned_item_by_name("shreya2", "Gucci bag").unwrap();
        assert_eq!(found.item_id, "gucci_test");
        assert!(chain.find_owned_item_by_name("shreya1", "Gucci bag").is_none());
    }
}
