//! Baked-in genesis parameters
//!
//! Every node builds its genesis block from these constants alone, so two
//! nodes started independently hold byte-identical genesis blocks and the
//! same genesis UTXO entry.

use crate::core::{Block, TXOutput, Transaction};
use crate::utils::decode_hex;

/// 0x04 ‖ SHA-256("peerchain genesis x") ‖ SHA-256("peerchain genesis y").
/// Not a point on P-256, so no signature can ever verify against it.
pub const GENESIS_PUBLIC_KEY_HEX: &str = "0464364b94562930a4cfc29c60add8990da2fb572824ffd8527db4ef56514733eb6541d4f6d3daf6ace6f1eab1490619b860ad8d1d6dd4bdbbc5fb0ca91bd900c5";

pub const GENESIS_OUTPUT_ID: &str = "GENESIS_UTXO";
pub const GENESIS_PREV_HASH: &str = "0";
pub const GENESIS_TIMESTAMP: i64 = 0;
pub const GENESIS_AMOUNT: u64 = 0;

pub fn genesis_public_key() -> Vec<u8> {
    // The constant is valid hex; an empty key would still hash deterministically.
    decode_hex(GENESIS_PUBLIC_KEY_HEX).unwrap_or_default()
}

pub fn genesis_transaction() -> Transaction {
    let key = genesis_public_key();
    let output = TXOutput::with_id(GENESIS_OUTPUT_ID.to_string(), key.clone(), GENESIS_AMOUNT);
    Transaction::with_timestamp(&key, vec![], vec![output], GENESIS_TIMESTAMP)
}

/// Genesis is hashed but never mined; it is exempt from the proof-of-work target.
pub fn genesis_block() -> Block {
    Block::with_timestamp(
        0,
        GENESIS_PREV_HASH.to_string(),
        GENESIS_TIMESTAMP,
        vec![genesis_transaction()],
    )
}
