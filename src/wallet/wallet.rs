use crate::error::Result;
use crate::utils::{encode_hex, key_fingerprint, new_key_pair, public_key_from_pkcs8};
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

/// The node's identity: one ECDSA P-256 key pair. Coinbase rewards and
/// change outputs are locked to `public_key`, and outgoing spends are signed
/// with the PKCS#8 document.
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode, ZeroizeOnDrop)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    #[zeroize(skip)]
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(pkcs8)
    }

    /// Rebuild a wallet from a stored PKCS#8 document; the public key is re-derived
    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let public_key = public_key_from_pkcs8(&pkcs8)?;
        Ok(Wallet { pkcs8, public_key })
    }

    /// Uncompressed SEC1 point, 65 bytes starting with 0x04
    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }

    pub fn get_public_key_hex(&self) -> String {
        encode_hex(&self.public_key)
    }

    /// Short human-facing label for logs and the console
    pub fn get_fingerprint(&self) -> String {
        key_fingerprint(&self.public_key)
    }
}
