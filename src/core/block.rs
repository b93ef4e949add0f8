use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{current_timestamp, sha256_hex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    nonce: u64,
    prev_hash: String,
    hash: String,
}

impl Block {
    /// Unmined block on top of `prev_hash`, stamped with the current time.
    /// Its hash is self-consistent but will not meet the proof-of-work target yet.
    pub fn new_block(index: u64, prev_hash: String, transactions: Vec<Transaction>) -> Result<Block> {
        Ok(Self::with_timestamp(
            index,
            prev_hash,
            current_timestamp()?,
            transactions,
        ))
    }

    pub fn with_timestamp(
        index: u64,
        prev_hash: String,
        timestamp: i64,
        transactions: Vec<Transaction>,
    ) -> Block {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            nonce: 0,
            prev_hash,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Hash pre-image: index ‖ prev_hash ‖ timestamp ‖ txIds in order ‖ nonce
    pub fn prepare_data(&self, nonce: u64) -> Vec<u8> {
        let mut data_bytes = vec![];
        data_bytes.extend(self.index.to_be_bytes());
        data_bytes.extend(self.prev_hash.as_bytes());
        data_bytes.extend(self.timestamp.to_be_bytes());
        for tx in &self.transactions {
            data_bytes.extend(tx.get_id().as_bytes());
        }
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    pub fn compute_hash(&self) -> String {
        sha256_hex(&self.prepare_data(self.nonce))
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    // Only the local miner touches these, before the block is shared.
    pub(crate) fn set_proof(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    #[cfg(test)]
    pub(crate) fn set_hash(&mut self, hash: &str) {
        self.hash = hash.to_string();
    }

    #[cfg(test)]
    pub(crate) fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
        self.hash = self.compute_hash();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TXOutput, Transaction};

    fn coinbase() -> Transaction {
        Transaction::with_timestamp(
            &[4u8; 65],
            vec![],
            vec![TXOutput::with_id("o".to_string(), vec![4u8; 65], 1)],
            5,
        )
    }

    #[test]
    fn test_hash_is_recomputable() {
        let block = Block::with_timestamp(1, "prev".to_string(), 10, vec![coinbase()]);
        assert_eq!(block.get_hash(), block.compute_hash());
        assert_eq!(block.get_hash().len(), 64);
        assert_eq!(block.get_nonce(), 0);
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = Block::with_timestamp(1, "prev".to_string(), 10, vec![coinbase()]);

        let other_index = Block::with_timestamp(2, "prev".to_string(), 10, vec![coinbase()]);
        let other_prev = Block::with_timestamp(1, "prev2".to_string(), 10, vec![coinbase()]);
        let other_time = Block::with_timestamp(1, "prev".to_string(), 11, vec![coinbase()]);
        let no_txs = Block::with_timestamp(1, "prev".to_string(), 10, vec![]);

        for other in [other_index, other_prev, other_time, no_txs] {
            assert_ne!(base.get_hash(), other.get_hash());
        }

        let mut bumped = base.clone();
        bumped.set_proof(1, base.compute_hash());
        assert_ne!(bumped.compute_hash(), base.get_hash());
    }

    #[test]
    fn test_prepare_data_consistency() {
        let block = Block::with_timestamp(3, "prev".to_string(), 10, vec![coinbase()]);
        assert_eq!(block.prepare_data(12345), block.prepare_data(12345));
        assert_ne!(block.prepare_data(12345), block.prepare_data(54321));
    }
}
