//! Node key management
//!
//! Each node owns exactly one key pair, persisted next to its chain.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::Wallet;
