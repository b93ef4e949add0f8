// This is the consensus engine and the owner of the ledger state.
// The chain and the UTXO set derived from it sit behind a single RwLock: appending a block,
// applying its transactions and replacing the whole chain are one critical section,
// so no writer ever overlaps another writer or a reader that needs a consistent UTXO view.

use crate::core::{genesis, Block, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::UTXOSet;
use log::{error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Why a block was turned away. Checks run in declaration order and the first failure wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRejection {
    PrevHashMismatch,
    TimestampBeforeParent,
    HashMismatch,
    InsufficientWork,
    InvalidTransaction { index: usize },
    DuplicateInput { output_id: String },
}

impl fmt::Display for BlockRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRejection::PrevHashMismatch => write!(f, "prevHash mismatch"),
            BlockRejection::TimestampBeforeParent => write!(f, "timestamp before parent"),
            BlockRejection::HashMismatch => write!(f, "hash mismatch"),
            BlockRejection::InsufficientWork => write!(f, "proof-of-work target not met"),
            BlockRejection::InvalidTransaction { index } => {
                write!(f, "invalid transaction at position {index}")
            }
            BlockRejection::DuplicateInput { output_id } => {
                write!(f, "output {output_id} spent twice in one block")
            }
        }
    }
}

struct ChainState {
    blocks: Vec<Block>,
    utxo_set: UTXOSet,
}

#[derive(Clone)]
pub struct Blockchain {
    state: Arc<RwLock<ChainState>>,
    pow: Arc<ProofOfWork>,
    genesis_hash: String,
}

impl Blockchain {
    /// Fresh chain holding only the deterministic genesis block
    pub fn new(difficulty: usize) -> Blockchain {
        let genesis = genesis::genesis_block();
        let genesis_hash = genesis.get_hash().to_string();
        let blocks = vec![genesis];
        let utxo_set = UTXOSet::rebuild(&blocks);
        Blockchain {
            state: Arc::new(RwLock::new(ChainState { blocks, utxo_set })),
            pow: Arc::new(ProofOfWork::new(difficulty)),
            genesis_hash,
        }
    }

    /// Adopt previously persisted blocks; they must form a valid chain from our genesis
    pub fn from_blocks(blocks: Vec<Block>, difficulty: usize) -> Result<Blockchain> {
        let blockchain = Blockchain::new(difficulty);
        if !blockchain.is_valid_chain(&blocks) {
            return Err(BlockchainError::InvalidBlock(
                "Stored chain does not validate against the local genesis".to_string(),
            ));
        }
        let utxo_set = UTXOSet::rebuild(&blocks);
        {
            let mut state = blockchain.write_state();
            state.blocks = blocks;
            state.utxo_set = utxo_set;
        }
        Ok(blockchain)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(|poisoned| {
            error!("Chain lock was poisoned, continuing with the last committed state");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(|poisoned| {
            error!("Chain lock was poisoned, continuing with the last committed state");
            poisoned.into_inner()
        })
    }

    pub fn get_proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn get_difficulty(&self) -> usize {
        self.pow.get_difficulty()
    }

    pub fn genesis_hash(&self) -> &str {
        self.genesis_hash.as_str()
    }

    /// Coinbase (no inputs): exactly one output worth the block reward.
    /// Otherwise: signature verifies, every input is unspent in `utxo_set` and
    /// owned by the sender, and inputs cover outputs. Any surplus is simply lost.
    pub fn validate_transaction(tx: &Transaction, utxo_set: &UTXOSet) -> bool {
        if tx.is_coinbase() {
            let outputs = tx.get_outputs();
            return outputs.len() == 1
                && outputs[0].get_amount() == crate::core::BLOCK_REWARD;
        }

        if !tx.verify() {
            return false;
        }

        let mut input_sum = 0u64;
        let mut claimed = HashSet::new();
        for input in tx.get_inputs() {
            // An output listed twice would be counted twice
            if !claimed.insert(input.get_output_id()) {
                return false;
            }
            let utxo = match utxo_set.get(input.get_output_id()) {
                Some(utxo) => utxo,
                None => return false,
            };
            if !utxo.is_locked_with_key(tx.get_sender()) {
                return false;
            }
            input_sum = match input_sum.checked_add(utxo.get_amount()) {
                Some(sum) => sum,
                None => return false,
            };
        }

        match tx.get_output_value() {
            Ok(output_sum) => input_sum >= output_sum,
            Err(_) => false,
        }
    }

    /// [`Blockchain::validate_transaction`] against the committed UTXO set
    pub fn is_transaction_valid(&self, tx: &Transaction) -> bool {
        let state = self.read_state();
        Self::validate_transaction(tx, &state.utxo_set)
    }

    /// Header checks shared by single-block and whole-chain validation
    fn check_link(&self, parent: &Block, block: &Block) -> std::result::Result<(), BlockRejection> {
        if block.get_prev_hash() != parent.get_hash() {
            return Err(BlockRejection::PrevHashMismatch);
        }
        if block.get_timestamp() < parent.get_timestamp() {
            return Err(BlockRejection::TimestampBeforeParent);
        }
        if block.compute_hash() != block.get_hash() {
            return Err(BlockRejection::HashMismatch);
        }
        if !self.pow.meets_target(block.get_hash()) {
            return Err(BlockRejection::InsufficientWork);
        }
        Ok(())
    }

    // Every transaction sees the UTXO set as it was before this block,
    // so a transaction cannot spend an output created earlier in the same block.
    fn check_transactions(
        block: &Block,
        utxo_set: &UTXOSet,
    ) -> std::result::Result<(), BlockRejection> {
        for (index, tx) in block.get_transactions().iter().enumerate() {
            if !Self::validate_transaction(tx, utxo_set) {
                return Err(BlockRejection::InvalidTransaction { index });
            }
        }

        let mut spent = HashSet::new();
        for tx in block.get_transactions() {
            for input in tx.get_inputs() {
                if !spent.insert(input.get_output_id()) {
                    return Err(BlockRejection::DuplicateInput {
                        output_id: input.get_output_id().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate `block` against the tip and, on success, append it and apply its
    /// transactions in order. On failure the chain is left untouched.
    pub fn add_block(&self, block: &Block) -> std::result::Result<(), BlockRejection> {
        let mut state = self.write_state();
        let tip = match state.blocks.last() {
            Some(tip) => tip,
            None => return Err(BlockRejection::PrevHashMismatch),
        };
        self.check_link(tip, block)?;
        Self::check_transactions(block, &state.utxo_set)?;

        for tx in block.get_transactions() {
            state.utxo_set.apply_transaction(tx);
        }
        state.blocks.push(block.clone());
        Ok(())
    }

    pub fn try_add_block(&self, block: &Block) -> bool {
        match self.add_block(block) {
            Ok(()) => {
                info!("Accepted block {} ({})", block.get_index(), block.get_hash());
                true
            }
            Err(reason) => {
                warn!("[REJECT] block {}: {reason}", block.get_index());
                false
            }
        }
    }

    /// Non-empty, same genesis as ours, and every later block links to its parent,
    /// keeps time non-decreasing, hashes correctly and meets the target.
    pub fn is_valid_chain(&self, candidate: &[Block]) -> bool {
        let first = match candidate.first() {
            Some(first) => first,
            None => return false,
        };
        if first.get_hash() != self.genesis_hash {
            return false;
        }
        candidate
            .windows(2)
            .all(|pair| self.check_link(&pair[0], &pair[1]).is_ok())
    }

    /// Longest valid chain wins. The UTXO set is rebuilt from scratch on replacement;
    /// the caller owns resetting any mempool state.
    pub fn maybe_replace_chain(&self, candidate: &[Block]) -> bool {
        let mut state = self.write_state();
        if candidate.len() <= state.blocks.len() {
            return false;
        }
        if !self.is_valid_chain(candidate) {
            warn!(
                "Ignoring longer chain of {} blocks: it does not validate",
                candidate.len()
            );
            return false;
        }

        state.blocks = candidate.to_vec();
        state.utxo_set = UTXOSet::rebuild(&state.blocks);
        info!("Chain replaced, new length {}", state.blocks.len());
        true
    }

    /// Unmined block on top of the current tip. Its timestamp never goes below the tip's.
    pub fn new_block_template(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let tip = self.get_latest_block();
        let timestamp = crate::utils::current_timestamp()?.max(tip.get_timestamp());
        Ok(Block::with_timestamp(
            tip.get_index() + 1,
            tip.get_hash().to_string(),
            timestamp,
            transactions,
        ))
    }

    pub fn get_latest_block(&self) -> Block {
        let state = self.read_state();
        match state.blocks.last() {
            Some(block) => block.clone(),
            None => genesis::genesis_block(),
        }
    }

    pub fn len(&self) -> usize {
        self.read_state().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().blocks.is_empty()
    }

    pub fn contains_block(&self, hash: &str) -> bool {
        self.read_state()
            .blocks
            .iter()
            .any(|block| block.get_hash() == hash)
    }

    pub fn get_chain(&self) -> Vec<Block> {
        self.read_state().blocks.clone()
    }

    pub fn get_utxo(&self) -> UTXOSet {
        self.read_state().utxo_set.clone()
    }

    pub fn get_balance(&self, public_key: &[u8]) -> u64 {
        self.read_state().utxo_set.get_balance(public_key)
    }
}
