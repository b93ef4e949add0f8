use crate::core::{Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
struct PoolState {
    /// ( K -> txid, V => Transaction )
    pending: HashMap<String, Transaction>,
    /// Output ids claimed by some pending transaction
    reserved: HashSet<String>,
    /// Transaction ids already handled, so gossip does not loop
    seen: HashSet<String>,
}

/// Unconfirmed transactions plus the reservation index that keeps two of them
/// from ever spending the same output.
#[derive(Default)]
pub struct MemoryPool {
    inner: RwLock<PoolState>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool::default()
    }

    /// Validate against the committed ledger, then reserve every input and insert.
    ///
    /// The whole sequence runs under the pool's write lock, so two transactions
    /// with overlapping inputs can never both get in. The chain is only read-locked
    /// inside, which keeps the lock order pool -> chain.
    pub fn add_transaction(&self, tx: Transaction, blockchain: &Blockchain) -> Result<()> {
        let mut pool = match self.inner.write() {
            Ok(pool) => pool,
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                return Err(BlockchainError::Transaction(
                    "memory pool unavailable".to_string(),
                ));
            }
        };

        if tx.is_coinbase() {
            return Err(BlockchainError::Transaction(
                "coinbase transactions are only created by miners".to_string(),
            ));
        }
        if !blockchain.is_transaction_valid(&tx) {
            return Err(BlockchainError::Transaction(format!(
                "invalid transaction {}",
                tx.get_id()
            )));
        }
        if let Some(input) = tx
            .get_inputs()
            .iter()
            .find(|input| pool.reserved.contains(input.get_output_id()))
        {
            return Err(BlockchainError::DoubleSpend {
                output_id: input.get_output_id().to_string(),
            });
        }

        for input in tx.get_inputs() {
            pool.reserved.insert(input.get_output_id().to_string());
        }
        pool.seen.insert(tx.get_id().to_string());
        pool.pending.insert(tx.get_id().to_string(), tx);
        Ok(())
    }

    /// Drop transactions that made it into a block and release their inputs.
    /// Pending transactions spending an output the block consumed are evicted too.
    pub fn remove_confirmed(&self, transactions: &[Transaction]) {
        match self.inner.write() {
            Ok(mut pool) => {
                let spent: HashSet<&str> = transactions
                    .iter()
                    .flat_map(|tx| tx.get_inputs())
                    .map(|input| input.get_output_id())
                    .collect();
                let evicted: Vec<String> = pool
                    .pending
                    .values()
                    .filter(|tx| {
                        tx.get_inputs()
                            .iter()
                            .any(|input| spent.contains(input.get_output_id()))
                    })
                    .map(|tx| tx.get_id().to_string())
                    .collect();

                let confirmed = transactions.iter().map(|tx| tx.get_id().to_string());
                for txid in confirmed.chain(evicted) {
                    if let Some(tx) = pool.pending.remove(&txid) {
                        for input in tx.get_inputs() {
                            pool.reserved.remove(input.get_output_id());
                        }
                    }
                }
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    /// Wipe pending, reserved and seen; used after a reorg or a successful mine
    pub fn clear_all(&self) {
        match self.inner.write() {
            Ok(mut pool) => {
                pool.pending.clear();
                pool.reserved.clear();
                pool.seen.clear();
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    /// Returns false when the id had already been recorded
    pub fn mark_seen(&self, txid: &str) -> bool {
        match self.inner.write() {
            Ok(mut pool) => pool.seen.insert(txid.to_string()),
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                false
            }
        }
    }

    pub fn has_seen(&self, txid: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.seen.contains(txid),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn is_reserved(&self, output_id: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.reserved.contains(output_id),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                true // Treat as taken
            }
        }
    }

    pub fn contains(&self, txid: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.pending.contains_key(txid),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn get(&self, txid: &str) -> Option<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.pending.get(txid).cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                None
            }
        }
    }

    /// Snapshot of pending transactions; reading never removes anything
    pub fn get_all(&self) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(pool) => {
                let mut txs: Vec<Transaction> = pool.pending.values().cloned().collect();
                txs.sort_by_key(|tx| tx.get_timestamp());
                txs
            }
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.pending.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.pending.is_empty(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                true // Conservative default
            }
        }
    }
}
