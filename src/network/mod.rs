//! Peer-to-peer gossip
//!
//! Nodes talk over short-lived TCP connections carrying one JSON message
//! each way. Blocks and transactions are flooded to every known peer; the
//! containment and seen-id checks stop them from looping.

pub mod message;
pub mod peer;
pub mod server;

pub use message::{exchange, Message};
pub use peer::{Peer, Peers};
pub use server::Node;
