use crate::crypto::{digest, BlockHash};
use crate::error::ChainError;
use crate::transaction::{MintTx, Transaction, TransactionKind, SYSTEM_USER};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::state::{get_items_of_owner, OwnedItem};
use super::validation::{is_block_valid, validate_chain};

/// Sentinel id shared by the genesis transaction and its item.
pub const GENESIS_ID: &str = "genesis";
/// 2023-01-01T00:00:00Z, fixed so every first node builds the same genesis block.
pub const GENESIS_TIMESTAMP_SECS: i64 = 1_672_531_200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub hash: BlockHash,
    /// Empty for genesis.
    pub prev_hash: BlockHash,
    pub transaction: Transaction,
}

impl Block {
    /// Digest of this block's contents as they are now. Equal to `hash` for
    /// any block that has not been tampered with.
    pub fn compute_hash(&self) -> BlockHash {
        digest(self.index, &self.timestamp, &self.prev_hash, &self.transaction)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

/// The fixed index-0 block every chain starts from.
pub fn genesis() -> Block {
    let transaction = Transaction {
        id: GENESIS_ID.to_string(),
        time_transacted: GENESIS_TIMESTAMP_SECS,
        kind: TransactionKind::Mint(MintTx {
            origin_user: SYSTEM_USER.to_string(),
            destination_user: SYSTEM_USER.to_string(),
            item_id: GENESIS_ID.to_string(),
            item_name: GENESIS_ID.to_string(),
        }),
    };
    let timestamp = Utc
        .timestamp_opt(GENESIS_TIMESTAMP_SECS, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH);
    let prev_hash = BlockHash::new();
    let hash = digest(0, &timestamp, &prev_hash, &transaction);

    Block {
        index: 0,
        timestamp,
        hash,
        prev_hash,
        transaction,
    }
}

/// Build the successor of `predecessor` carrying `transaction`.
///
/// The timestamp is taken here, once; validation never recomputes it.
pub fn generate_block(predecessor: &Block, transaction: Transaction) -> Block {
    let index = predecessor.index + 1;
    let timestamp = Utc::now();
    let prev_hash = predecessor.hash.clone();
    let hash = digest(index, &timestamp, &prev_hash, &transaction);

    Block {
        index,
        timestamp,
        hash,
        prev_hash,
        transaction,
    }
}

/// A node's copy of the ledger: blocks ordered by index, append-only.
#[derive(Debug, Clone, Default)]
pub struct Blockchain {
    pub blocks: Vec<Block>,
}

impl Blockchain {
    /// An empty chain, as held by a node that has not bootstrapped yet.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genesis() -> Self {
        Blockchain {
            blocks: vec![genesis()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Index of the tip, `None` for an empty chain.
    pub fn height(&self) -> Option<u64> {
        self.tip().map(|b| b.index)
    }

    /// Build a block on top of the tip and append it.
    pub fn append_transaction(&mut self, transaction: Transaction) -> Result<Block, ChainError> {
        let tip = self.tip().ok_or(ChainError::NotInitialized)?;
        let block = generate_block(tip, transaction);
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Append `candidate` if it is a valid successor of the tip. Returns
    /// whether it was appended; a rejection is not an error.
    pub fn append_validated(&mut self, candidate: Block) -> bool {
        match self.tip() {
            Some(tip) if is_block_valid(&candidate, tip) => {
                self.blocks.push(candidate);
                true
            }
            _ => false,
        }
    }

    /// Swap in a chain received from a peer after checking every link.
    pub fn replace(&mut self, blocks: Vec<Block>) -> Result<(), ChainError> {
        validate_chain(&blocks)?;
        self.blocks = blocks;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        validate_chain(&self.blocks)
    }

    /// First item currently held by `owner` under the human-readable `item_name`.
    pub fn find_owned_item_by_name(&self, owner: &str, item_name: &str) -> Option<OwnedItem> {
        get_items_of_owner(owner, &self.blocks)
            .into_iter()
            .find(|item| item.item_name == item_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::build_mint;

    #[test]
    fn test_genesis_is_fixed() {
        let a = genesis();
        let b = genesis();
        assert_eq!(a.index, 0);
        assert!(a.prev_hash.is_empty());
        assert_eq!(a, b);
        assert_eq!(a.hash, a.compute_hash());
    }

    #[test]
    fn test_generate_block_links_to_predecessor() {
        let g = genesis();
        let tx = build_mint("Diamonds", "l33t").unwrap();
        let block = generate_block(&g, tx.clone());
        assert_eq!(block.index, 1);
        assert_eq!(block.prev_hash, g.hash);
        assert_eq!(block.transaction, tx);
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn test_append_on_empty_chain_fails() {
        let mut chain = Blockchain::new();
        let tx = build_mint("Diamonds", "l33t").unwrap();
        assert_eq!(chain.append_transaction(tx), Err(ChainError::NotInitialized));
        assert!(!chain.append_validated(genesis()));
        assert_eq!(chain.height(), None);
    }

    #[test]
    fn test_append_and_replace() {
        let mut chain = Blockchain::with_genesis();
        chain.append_transaction(build_mint("Diamonds", "l33t").unwrap()).unwrap();
        chain.append_transaction(build_mint("Rubies", "l33t").unwrap()).unwrap();
        assert_eq!(chain.height(), Some(2));
        assert!(chain.validate().is_ok());

        let mut other = Blockchain::new();
        other.replace(chain.blocks.clone()).unwrap();
        assert_eq!(other.blocks, chain.blocks);
    }

    #[test]
    fn test_replace_rejects_broken_chain() {
        let mut chain = Blockchain::with_genesis();
        chain.append_transaction(build_mint("Diamonds", "l33t").unwrap()).unwrap();
        let mut blocks = chain.blocks.clone();
        blocks[1].prev_hash = "forged".to_string();

        let mut other = Blockchain::new();
        assert!(other.replace(blocks).is_err());
        assert!(other.is_empty());
    }

    #[test]
    fn test_block_json_field_names() {
        let json = serde_json::to_value(genesis()).unwrap();
        for field in ["index", "timestamp", "hash", "prevHash", "transaction"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
