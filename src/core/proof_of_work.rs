use crate::core::Block;
use crate::utils::sha256_hex;
use log::info;

/// Leading '0' hex characters a block hash needs by default
pub const DEFAULT_DIFFICULTY: usize = 5;

pub struct ProofOfWork {
    difficulty: usize,
    target: String,
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> ProofOfWork {
        ProofOfWork {
            difficulty,
            target: "0".repeat(difficulty),
        }
    }

    pub fn get_difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn get_target(&self) -> &str {
        self.target.as_str()
    }

    pub fn meets_target(&self, hash: &str) -> bool {
        hash.starts_with(self.target.as_str())
    }

    /// Stored hash recomputes from the block's fields and meets the target
    pub fn validate(&self, block: &Block) -> bool {
        block.compute_hash() == block.get_hash() && self.meets_target(block.get_hash())
    }

    /// Bump the nonce until the hash meets the target. Unbounded and not
    /// cancellable; it runs to completion on the calling thread.
    pub fn run(&self, block: &mut Block) {
        info!(
            "Mining block {} (difficulty {})",
            block.get_index(),
            self.difficulty
        );
        let mut nonce = block.get_nonce();
        let mut hash = sha256_hex(&block.prepare_data(nonce));
        while !self.meets_target(&hash) {
            nonce += 1;
            hash = sha256_hex(&block.prepare_data(nonce));
        }
        block.set_proof(nonce, hash);
        info!(
            "Mined block {} : {} (nonce {nonce})",
            block.get_index(),
            block.get_hash()
        );
    }
}
