//! # Peerchain
//!
//! A minimal peer-to-peer cryptocurrency node. Every node keeps its own chain,
//! the UTXO set derived from it and a pool of unconfirmed transactions, and
//! gossips blocks and transactions to its peers. The longest valid chain wins.
//!
//! ## Layout
//! - `core/`: transactions, blocks, genesis, proof-of-work and the consensus engine
//! - `storage/`: UTXO index, memory pool, sled persistence
//! - `network/`: wire messages, peer registry and the gossip node
//! - `wallet/`: the node's key pair
//! - `config/`: environment-driven settings
//! - `utils/`: hashing, signing, hex and binary encoding
//! - `cli/`: process flags and console commands

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use cli::{Command, ConsoleLine, Opt};
pub use config::{Config, NodeOptions, GLOBAL_CONFIG};
pub use core::{
    Block, BlockRejection, Blockchain, ProofOfWork, TXInput, TXOutput, Transaction, BLOCK_REWARD,
    DEFAULT_DIFFICULTY,
};
pub use error::{BlockchainError, Result};
pub use network::{Message, Node, Peer, Peers};
pub use storage::{ChainStore, MemoryPool, UTXOSet};
pub use wallet::Wallet;
