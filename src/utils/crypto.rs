use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING,
};
use ripemd::{Digest as RipemdDigest, Ripemd160};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Uncompressed SEC1 point: 0x04 tag followed by two 32-byte coordinates.
pub const PUBLIC_KEY_LEN: usize = 65;

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// SHA-256 rendered as 64 lowercase hex characters.
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(sha256_digest(data).as_slice())
}

pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn encode_hex(data: &[u8]) -> String {
    HEXLOWER.encode(data)
}

pub fn decode_hex(data: &str) -> Result<Vec<u8>> {
    HEXLOWER
        .decode(data.trim().to_ascii_lowercase().as_bytes())
        .map_err(|e| BlockchainError::InvalidKey(format!("Invalid hex encoding: {e}")))
}

/// Short human-readable name for a public key: base58(RIPEMD-160(SHA-256(key))).
pub fn key_fingerprint(public_key: &[u8]) -> String {
    let pub_key_sha256 = sha256_digest(public_key);
    base58_encode(ripemd160_digest(pub_key_sha256.as_slice()).as_slice())
}

pub fn is_valid_public_key(public_key: &[u8]) -> bool {
    public_key.len() == PUBLIC_KEY_LEN && public_key[0] == 0x04
}

pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

pub fn ecdsa_p256_sha256_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign message: {e}")))?
        .as_ref()
        .to_vec();
    Ok(signature)
}

pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key =
        ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    peer_public_key.verify(message, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_is_fixed_width() {
        let hash = sha256_hex(b"peerchain");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, sha256_hex(b"peerchain"));
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn test_sign_and_verify() {
        let pkcs8 = new_key_pair().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        assert!(is_valid_public_key(&public_key));

        let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, b"message").unwrap();
        assert!(ecdsa_p256_sha256_sign_verify(&public_key, &signature, b"message"));
        assert!(!ecdsa_p256_sha256_sign_verify(&public_key, &signature, b"other"));
    }

    #[test]
    fn test_verify_rejects_malformed_input() {
        let pkcs8 = new_key_pair().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();

        assert!(!ecdsa_p256_sha256_sign_verify(&public_key, &[1, 2, 3], b"message"));
        assert!(!ecdsa_p256_sha256_sign_verify(&[0u8; 3], &[0u8; 64], b"message"));
        assert!(!ecdsa_p256_sha256_sign_verify(&public_key, &[], b"message"));
    }

    #[test]
    fn test_hex_round_trip_accepts_uppercase() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        assert_eq!(decode_hex("DEADBEEF").unwrap(), bytes);
        assert_eq!(encode_hex(&bytes), "deadbeef");
        assert!(decode_hex("xyz").is_err());
    }

    #[test]
    fn test_key_fingerprint_is_stable() {
        let key = [4u8; PUBLIC_KEY_LEN];
        assert_eq!(key_fingerprint(&key), key_fingerprint(&key));
        assert_ne!(key_fingerprint(&key), key_fingerprint(&[5u8; PUBLIC_KEY_LEN]));
    }
}
