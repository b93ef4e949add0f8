//! Core ledger functionality
//!
//! Blocks, transactions, the deterministic genesis block, proof-of-work and
//! the consensus engine that owns the chain and its UTXO set.

pub mod block;
pub mod blockchain;
pub mod genesis;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use blockchain::{BlockRejection, Blockchain};
pub use proof_of_work::{ProofOfWork, DEFAULT_DIFFICULTY};
pub use transaction::{TXInput, TXOutput, Transaction, BLOCK_REWARD};
