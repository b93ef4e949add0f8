//! Ledger state beyond the chain itself
//!
//! The UTXO index derived from the chain, the pool of unconfirmed
//! transactions, and the sled store that persists chain and node key.

pub mod chain_store;
pub mod memory_pool;
pub mod utxo_set;

pub use chain_store::ChainStore;
pub use memory_pool::MemoryPool;
pub use utxo_set::UTXOSet;
