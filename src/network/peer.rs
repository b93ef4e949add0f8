use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::RwLock;

/// A remote node, identified only by where it listens
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    host: String,
    port: u16,
}

impl Peer {
    pub fn new(host: impl Into<String>, port: u16) -> Peer {
        Peer {
            host: host.into(),
            port,
        }
    }

    pub fn get_host(&self) -> &str {
        self.host.as_str()
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve to the first socket address; failure counts as unreachable
    pub fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| BlockchainError::PeerUnreachable(format!("{self}: {e}")))?
            .next()
            .ok_or_else(|| BlockchainError::PeerUnreachable(format!("{self}: no address")))
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Peer {
    type Err = BlockchainError;

    /// `host:port`
    fn from_str(s: &str) -> Result<Peer> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| BlockchainError::Config(format!("Expected HOST:PORT, got {s}")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| BlockchainError::Config(format!("Invalid port in {s}: {e}")))?;
        if host.is_empty() {
            return Err(BlockchainError::Config(format!("Missing host in {s}")));
        }
        Ok(Peer::new(host, port))
    }
}

/// Known peers, de-duplicated by (host, port)
#[derive(Default)]
pub struct Peers {
    inner: RwLock<Vec<Peer>>,
}

impl Peers {
    pub fn new() -> Peers {
        Peers::default()
    }

    /// Returns true when the peer was not known before
    pub fn add_peer(&self, peer: Peer) -> bool {
        match self.inner.write() {
            Ok(mut inner) => {
                if inner.contains(&peer) {
                    return false;
                }
                log::info!("Added peer {peer}");
                inner.push(peer);
                true
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on peers");
                false
            }
        }
    }

    pub fn remove_peer(&self, peer: &Peer) -> bool {
        match self.inner.write() {
            Ok(mut inner) => match inner.iter().position(|x| x == peer) {
                Some(idx) => {
                    inner.remove(idx);
                    log::info!("Removed peer {peer}");
                    true
                }
                None => false,
            },
            Err(_) => {
                log::error!("Failed to acquire write lock on peers");
                false
            }
        }
    }

    pub fn contains(&self, peer: &Peer) -> bool {
        match self.inner.read() {
            Ok(inner) => inner.contains(peer),
            Err(_) => {
                log::error!("Failed to acquire read lock on peers");
                false
            }
        }
    }

    /// Copy of the current set; broadcasts iterate this, never the live list
    pub fn get_peers(&self) -> Vec<Peer> {
        match self.inner.read() {
            Ok(inner) => inner.to_vec(),
            Err(_) => {
                log::error!("Failed to acquire read lock on peers");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(inner) => inner.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on peers");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
