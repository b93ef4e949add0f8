//! Utility functions and helpers
//!
//! Hashing, signing, hex/base58 encoding, timestamps and the bincode layer
//! used for on-disk records.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_encode, current_timestamp, decode_hex, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, encode_hex, is_valid_public_key, key_fingerprint,
    new_key_pair, public_key_from_pkcs8, ripemd160_digest, sha256_digest, sha256_hex,
    PUBLIC_KEY_LEN,
};

pub use serialization::{deserialize, serialize};
