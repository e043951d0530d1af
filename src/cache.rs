//! Caching layer for ownership queries
//!
//! `get_items_of_owner` is a full replay of the chain. The cache keeps recent
//! answers keyed by the tip they were computed against, so an entry can only be
//! served while that block is still the tip; any append changes the key and the
//! next query replays again.
use crate::blockchain::{Block, OwnershipState, OwnedItem};
use crate::crypto::BlockHash;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

pub const DEFAULT_OWNERSHIP_CACHE_SIZE: usize = 256;

type CacheKey = (BlockHash, String);

pub struct OwnershipCache {
    entries: Mutex<LruCache<CacheKey, Vec<OwnedItem>>>,
}

impl OwnershipCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Items owned by `user` on `blocks`, replaying only on a miss.
    pub fn items_of_owner(&self, user: &str, blocks: &[Block]) -> Vec<OwnedItem> {
        let Some(tip) = blocks.last() else {
            return Vec::new();
        };
        let key = (tip.hash.clone(), user.to_string());

        if let Some(hit) = self.entries.lock().get(&key) {
            return hit.clone();
        }

        let items = OwnershipState::replay(blocks).items_of(user);
        self.entries.lock().put(key, items.clone());
        items
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OwnershipCache {
    fn default() -> Self {
        Self::new(DEFAULT_OWNERSHIP_CACHE_SIZE)
    }
}
