// Per-node persistence on sled.
// The chain is rewritten as a whole on every save: reorgs replace arbitrary suffixes,
// so there is no append-only shortcut. Blocks are keyed by their big-endian index,
// which makes sled's key order the chain order.

use crate::core::{Block, Blockchain};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::{info, warn};
use sled::transaction::TransactionError;
use sled::{Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const WALLET_TREE: &str = "wallet";
const NODE_KEY: &str = "node_key";

pub struct ChainStore {
    db: Db,
}

impl ChainStore {
    pub fn open(path: impl AsRef<Path>) -> Result<ChainStore> {
        let db = sled::open(path.as_ref())
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        Ok(ChainStore { db })
    }

    /// In-memory store that disappears on drop
    pub fn temporary() -> Result<ChainStore> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        Ok(ChainStore { db })
    }

    fn blocks_tree(&self) -> Result<Tree> {
        self.db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))
    }

    fn wallet_tree(&self) -> Result<Tree> {
        self.db
            .open_tree(WALLET_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open wallet tree: {e}")))
    }

    /// Replace the stored chain with `blocks` in one sled transaction
    pub fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        let blocks_tree = self.blocks_tree()?;
        let encoded = blocks
            .iter()
            .map(serialize)
            .collect::<Result<Vec<Vec<u8>>>>()?;
        let stale = blocks_tree.len() as u64;
        let new_len = encoded.len() as u64;

        blocks_tree
            .transaction(|tx_db| {
                for (index, data) in encoded.iter().enumerate() {
                    tx_db.insert((index as u64).to_be_bytes().to_vec(), data.as_slice())?;
                }
                for index in new_len..stale {
                    tx_db.remove(index.to_be_bytes().to_vec())?;
                }
                Ok(())
            })
            .map_err(|e: TransactionError| {
                BlockchainError::Database(format!("Failed to update blocks tree: {e}"))
            })?;

        self.db
            .flush()
            .map_err(|e| BlockchainError::Database(format!("Failed to flush database: {e}")))?;
        Ok(())
    }

    /// Stored blocks in index order, or `None` when nothing was ever saved
    pub fn load_chain(&self) -> Result<Option<Vec<Block>>> {
        let blocks_tree = self.blocks_tree()?;
        if blocks_tree.is_empty() {
            return Ok(None);
        }

        let mut blocks = Vec::with_capacity(blocks_tree.len());
        for entry in blocks_tree.iter() {
            let (_, value) = entry
                .map_err(|e| BlockchainError::Database(format!("Failed to read block: {e}")))?;
            blocks.push(deserialize::<Block>(&value)?);
        }
        Ok(Some(blocks))
    }

    /// Persisted chain when it is readable and valid, otherwise a fresh genesis-only chain
    pub fn load_blockchain(&self, difficulty: usize) -> Blockchain {
        let blocks = match self.load_chain() {
            Ok(Some(blocks)) => blocks,
            Ok(None) => {
                info!("No stored chain, starting from genesis");
                return Blockchain::new(difficulty);
            }
            Err(e) => {
                warn!("Stored chain is unreadable ({e}), starting from genesis");
                return Blockchain::new(difficulty);
            }
        };

        match Blockchain::from_blocks(blocks, difficulty) {
            Ok(blockchain) => {
                info!("Loaded chain of {} blocks", blockchain.len());
                blockchain
            }
            Err(e) => {
                warn!("Stored chain rejected ({e}), starting from genesis");
                Blockchain::new(difficulty)
            }
        }
    }

    /// The node's key pair, generated and stored on first use
    pub fn load_or_create_wallet(&self) -> Result<Wallet> {
        let wallet_tree = self.wallet_tree()?;
        let stored = wallet_tree
            .get(NODE_KEY)
            .map_err(|e| BlockchainError::Database(format!("Failed to read node key: {e}")))?;

        if let Some(data) = stored {
            match deserialize::<Wallet>(&data) {
                Ok(wallet) => return Ok(wallet),
                Err(e) => warn!("Stored node key is unreadable ({e}), generating a new one"),
            }
        }

        let wallet = Wallet::new()?;
        wallet_tree
            .insert(NODE_KEY, serialize(&wallet)?)
            .map_err(|e| BlockchainError::Database(format!("Failed to store node key: {e}")))?;
        wallet_tree
            .flush()
            .map_err(|e| BlockchainError::Database(format!("Failed to flush database: {e}")))?;
        info!("Generated node key {}", wallet.get_fingerprint());
        Ok(wallet)
    }
}
