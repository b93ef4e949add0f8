use crate::core::{Block, TXOutput, Transaction};
use std::collections::HashMap;

/// ( K -> output id, V -> TXOutput )
///
/// Derived index over the chain. It is only ever changed by
/// [`UTXOSet::apply_transaction`] and can always be rebuilt from the blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UTXOSet {
    outputs: HashMap<String, TXOutput>,
}

impl UTXOSet {
    pub fn new() -> UTXOSet {
        UTXOSet::default()
    }

    /// Replay every transaction of `blocks` from an empty set
    pub fn rebuild(blocks: &[Block]) -> UTXOSet {
        let mut utxo_set = UTXOSet::new();
        for block in blocks {
            for tx in block.get_transactions() {
                utxo_set.apply_transaction(tx);
            }
        }
        utxo_set
    }

    /// Spend every input, then insert every output keyed by its id
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        for input in tx.get_inputs() {
            self.outputs.remove(input.get_output_id());
        }
        for output in tx.get_outputs() {
            self.outputs.insert(output.get_id().to_string(), output.clone());
        }
    }

    pub fn get(&self, output_id: &str) -> Option<&TXOutput> {
        self.outputs.get(output_id)
    }

    pub fn contains(&self, output_id: &str) -> bool {
        self.outputs.contains_key(output_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TXOutput> {
        self.outputs.values()
    }

    pub fn find_utxo(&self, public_key: &[u8]) -> Vec<TXOutput> {
        self.outputs
            .values()
            .filter(|out| out.is_locked_with_key(public_key))
            .cloned()
            .collect()
    }

    /// Sum of the outputs locked to `public_key`, capped at `u64::MAX`.
    /// Adopted chains are only header-checked, so their amounts are untrusted.
    pub fn get_balance(&self, public_key: &[u8]) -> u64 {
        self.outputs
            .values()
            .filter(|out| out.is_locked_with_key(public_key))
            .map(TXOutput::get_amount)
            .fold(0u64, u64::saturating_add)
    }
}
