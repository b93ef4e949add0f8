// Transactions move value by consuming unspent outputs (inputs) and creating new ones (outputs).
// Identity is the txId: SHA-256 over an explicit canonical encoding, never over a
// serializer's default layout, so every node derives the same id for the same content.

use crate::error::{BlockchainError, Result};
use crate::utils::{
    current_timestamp, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, sha256_hex,
};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Amount minted by every coinbase transaction
pub const BLOCK_REWARD: u64 = 1;

/// A claim on a previously created output, by output id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXInput {
    output_id: String,
}

impl TXInput {
    pub fn new(output_id: impl Into<String>) -> TXInput {
        TXInput {
            output_id: output_id.into(),
        }
    }

    pub fn get_output_id(&self) -> &str {
        self.output_id.as_str()
    }
}

/// A spendable amount locked to a recipient public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    id: String,
    recipient: Vec<u8>,
    amount: u64,
}

impl TXOutput {
    /// Ordinary output with a random (UUID v4) id
    pub fn new(recipient: &[u8], amount: u64) -> TXOutput {
        Self::with_id(Uuid::new_v4().to_string(), recipient.to_vec(), amount)
    }

    /// Output with a caller-chosen id; genesis uses this so every node agrees on it
    pub fn with_id(id: String, recipient: Vec<u8>, amount: u64) -> TXOutput {
        TXOutput {
            id,
            recipient,
            amount,
        }
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_recipient(&self) -> &[u8] {
        self.recipient.as_slice()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn is_locked_with_key(&self, public_key: &[u8]) -> bool {
        self.recipient.as_slice() == public_key
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    sender: Vec<u8>,
    inputs: Vec<TXInput>,
    outputs: Vec<TXOutput>,
    timestamp: i64,
    tx_id: String,
    signature: Vec<u8>,
}

impl Transaction {
    /// Unsigned transaction stamped with the current time
    pub fn new(sender: &[u8], inputs: Vec<TXInput>, outputs: Vec<TXOutput>) -> Result<Transaction> {
        Ok(Self::with_timestamp(
            sender,
            inputs,
            outputs,
            current_timestamp()?,
        ))
    }

    pub fn with_timestamp(
        sender: &[u8],
        inputs: Vec<TXInput>,
        outputs: Vec<TXOutput>,
        timestamp: i64,
    ) -> Transaction {
        let mut tx = Transaction {
            sender: sender.to_vec(),
            inputs,
            outputs,
            timestamp,
            tx_id: String::new(),
            signature: vec![],
        };
        tx.tx_id = tx.compute_hash();
        tx
    }

    /// Reward transaction paying [`BLOCK_REWARD`] to `to`. No inputs, no signature.
    pub fn new_coinbase_tx(to: &[u8]) -> Result<Transaction> {
        Self::new(to, vec![], vec![TXOutput::new(to, BLOCK_REWARD)])
    }

    /// Byte-stable encoding of sender, inputs, outputs and timestamp.
    /// Variable-length fields carry a u32 big-endian length prefix.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        fn put(buf: &mut Vec<u8>, bytes: &[u8]) {
            buf.extend((bytes.len() as u32).to_be_bytes());
            buf.extend(bytes);
        }

        let mut data = vec![];
        put(&mut data, &self.sender);
        data.extend((self.inputs.len() as u32).to_be_bytes());
        for input in &self.inputs {
            put(&mut data, input.output_id.as_bytes());
        }
        data.extend((self.outputs.len() as u32).to_be_bytes());
        for output in &self.outputs {
            put(&mut data, output.id.as_bytes());
            put(&mut data, &output.recipient);
            data.extend(output.amount.to_be_bytes());
        }
        data.extend(self.timestamp.to_be_bytes());
        data
    }

    pub fn compute_hash(&self) -> String {
        sha256_hex(&self.canonical_bytes())
    }

    pub fn sign(&mut self, pkcs8: &[u8]) -> Result<()> {
        self.signature = ecdsa_p256_sha256_sign_digest(pkcs8, &self.canonical_bytes())?;
        Ok(())
    }

    /// Coinbase transactions always verify; everything else needs a signature
    /// by `sender` over the canonical encoding. Malformed keys or signatures yield false.
    pub fn verify(&self) -> bool {
        if self.is_coinbase() {
            return true;
        }
        ecdsa_p256_sha256_sign_verify(&self.sender, &self.signature, &self.canonical_bytes())
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn get_id(&self) -> &str {
        self.tx_id.as_str()
    }

    pub fn get_sender(&self) -> &[u8] {
        self.sender.as_slice()
    }

    pub fn get_inputs(&self) -> &[TXInput] {
        self.inputs.as_slice()
    }

    pub fn get_outputs(&self) -> &[TXOutput] {
        self.outputs.as_slice()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_output_value(&self) -> Result<u64> {
        let mut total = 0u64;
        for output in &self.outputs {
            total = total
                .checked_add(output.amount)
                .ok_or_else(|| BlockchainError::Transaction("Output value overflow".to_string()))?;
        }
        Ok(total)
    }

    #[cfg(test)]
    pub(crate) fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    #[cfg(test)]
    pub(crate) fn set_id(&mut self, tx_id: &str) {
        self.tx_id = tx_id.to_string();
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.tx_id == other.tx_id
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tx_id.hash(state);
    }
}
