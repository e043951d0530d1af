use crate::error::ChainError;

use super::chain::{genesis, Block};

/// True iff `candidate` is the direct successor of `predecessor`: index one
/// higher, linked to the predecessor's hash, and carrying the hash of its own
/// contents. Any mismatch rejects; there is no partial credit.
pub fn is_block_valid(candidate: &Block, predecessor: &Block) -> bool {
    candidate.index == predecessor.index + 1
        && candidate.prev_hash == predecessor.hash
        && candidate.compute_hash() == candidate.hash
}

/// Audit a whole chain: it must start at the well-known genesis block and
/// every later block must be a valid successor of the one before it.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainError> {
    let first = blocks
        .first()
        .ok_or_else(|| ChainError::InvalidBlock("chain is empty".to_string()))?;

    if *first != genesis() {
        return Err(ChainError::InvalidBlock(format!(
            "block 0 is not the genesis block (hash {})",
            first.hash
        )));
    }

    for pair in blocks.windows(2) {
        if !is_block_valid(&pair[1], &pair[0]) {
            return Err(ChainError::InvalidBlock(format!(
                "block {} is not a valid successor of block {}",
                pair[1].index, pair[0].index
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::core::chain::generate_block;
    use crate::transaction::{build_mint, TransactionKind};
    use chrono::Duration;

    #[test]
    fn test_generated_block_is_valid() {
        let g = genesis();
        let block1 = generate_block(&g, build_mint("Diamonds", "l33t").unwrap());
        assert!(is_block_valid(&block1, &g));
        let block2 = generate_block(&block1, build_mint("Rubies", "l33t").unwrap());
        assert!(is_block_valid(&block2, &block1));
    }

    #[test]
    fn test_later_timestamp_same_hash_is_rejected() {
        let g = genesis();
        let tx = build_mint("Diamonds", "l33t").unwrap();
        let block1 = generate_block(&g, tx.clone());

        let faulty = Block {
            index: 1,
            timestamp: block1.timestamp + Duration::seconds(5),
            hash: block1.hash.clone(),
            prev_hash: g.hash.clone(),
            transaction: tx,
        };

        assert!(is_block_valid(&block1, &g));
        assert!(!is_block_valid(&faulty, &g));
    }

    #[test]
    fn test_tampering_any_field_is_detected() {
        let g = genesis();
        let block = generate_block(&g, build_mint("Diamonds", "l33t").unwrap());

        let mut forged_hash = block.clone();
        forged_hash.hash = "00".repeat(32);
        assert!(!is_block_valid(&forged_hash, &g));

        let mut shifted = block.clone();
        shifted.timestamp = shifted.timestamp + Duration::nanoseconds(1);
        assert!(!is_block_valid(&shifted, &g));

        let mut relinked = block.clone();
        relinked.prev_hash = "not-genesis".to_string();
        assert!(!is_block_valid(&relinked, &g));

        let mut rewritten = block.clone();
        if let TransactionKind::Mint(mint) = &mut rewritten.transaction.kind {
            mint.destination_user = "mallory".to_string();
        }
        assert!(!is_block_valid(&rewritten, &g));
    }

    #[test]
    fn test_index_must_step_by_one() {
        let g = genesis();
        let block = generate_block(&g, build_mint("Diamonds", "l33t").unwrap());

        for index in [0u64, 2, 7] {
            // Re-hash so only the index is wrong.
            let mut candidate = block.clone();
            candidate.index = index;
            candidate.hash = candidate.compute_hash();
            assert!(!is_block_valid(&candidate, &g), "index {} accepted", index);
        }
    }

    #[test]
    fn test_wrong_predecessor_is_rejected() {
        let g = genesis();
        let block1 = generate_block(&g, build_mint("Diamonds", "l33t").unwrap());
        let block2 = generate_block(&block1, build_mint("Rubies", "l33t").unwrap());
        assert!(!is_block_valid(&block2, &g));
        assert!(!is_block_valid(&block1, &block1));
    }

    #[test]
    fn test_validate_chain() {
        let g = genesis();
        let b1 = generate_block(&g, build_mint("Diamonds", "l33t").unwrap());
        let b2 = generate_block(&b1, build_mint("Rubies", "l33t").unwrap());
        assert!(validate_chain(&[g.clone(), b1.clone(), b2.clone()]).is_ok());
        assert!(validate_chain(&[]).is_err());
        assert!(validate_chain(&[g, b2]).is_err());
        assert!(validate_chain(&[b1]).is_err());
    }
}
