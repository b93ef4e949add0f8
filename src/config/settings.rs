use crate::core::DEFAULT_DIFFICULTY;
use crate::error::{BlockchainError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::RwLock;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

pub const DEFAULT_NODE_PORT: u16 = 2001;
pub const DEFAULT_NODE_HOST: &str = "127.0.0.1";
pub const DEFAULT_DATA_DIR: &str = "data";

const NODE_PORT_KEY: &str = "NODE_PORT";
const NODE_HOST_KEY: &str = "NODE_HOST";
const DATA_DIR_KEY: &str = "DATA_DIR";
const POW_DIFFICULTY_KEY: &str = "POW_DIFFICULTY";

/// Everything a node needs to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOptions {
    pub host: String,
    pub port: u16,
    /// Root for per-node databases; `None` keeps the node in memory
    pub data_dir: Option<PathBuf>,
    pub difficulty: usize,
}

impl NodeOptions {
    /// In-memory node on an OS-assigned loopback port
    pub fn ephemeral(difficulty: usize) -> NodeOptions {
        NodeOptions {
            host: DEFAULT_NODE_HOST.to_string(),
            port: 0,
            data_dir: None,
            difficulty,
        }
    }

    /// `<data_dir>/node_<port>`, so several nodes can share one machine
    pub fn node_db_path(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|root| root.join(format!("node_{}", self.port)))
    }
}

/// String settings seeded from the environment. The CLI overrides them before the node starts.
pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut map = HashMap::new();
        for key in [NODE_PORT_KEY, NODE_HOST_KEY, DATA_DIR_KEY, POW_DIFFICULTY_KEY] {
            if let Ok(value) = env::var(key) {
                map.insert(String::from(key), value);
            }
        }
        Config {
            inner: RwLock::new(map),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.inner.read() {
            Ok(inner) => inner.get(key).cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on config");
                None
            }
        }
    }

    fn set(&self, key: &str, value: String) {
        match self.inner.write() {
            Ok(mut inner) => {
                inner.insert(String::from(key), value);
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on config");
            }
        }
    }

    pub fn set_node_port(&self, port: u16) {
        self.set(NODE_PORT_KEY, port.to_string());
    }

    pub fn set_node_host(&self, host: String) {
        self.set(NODE_HOST_KEY, host);
    }

    pub fn set_data_dir(&self, dir: String) {
        self.set(DATA_DIR_KEY, dir);
    }

    pub fn set_difficulty(&self, difficulty: usize) {
        self.set(POW_DIFFICULTY_KEY, difficulty.to_string());
    }

    pub fn get_node_port(&self) -> Result<u16> {
        match self.get(NODE_PORT_KEY) {
            Some(port) => port
                .parse()
                .map_err(|e| BlockchainError::Config(format!("Invalid {NODE_PORT_KEY} {port}: {e}"))),
            None => Ok(DEFAULT_NODE_PORT),
        }
    }

    pub fn get_node_host(&self) -> String {
        self.get(NODE_HOST_KEY)
            .unwrap_or_else(|| DEFAULT_NODE_HOST.to_string())
    }

    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(
            self.get(DATA_DIR_KEY)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        )
    }

    pub fn get_difficulty(&self) -> Result<usize> {
        match self.get(POW_DIFFICULTY_KEY) {
            Some(difficulty) => difficulty.parse().map_err(|e| {
                BlockchainError::Config(format!(
                    "Invalid {POW_DIFFICULTY_KEY} {difficulty}: {e}"
                ))
            }),
            None => Ok(DEFAULT_DIFFICULTY),
        }
    }

    pub fn node_options(&self) -> Result<NodeOptions> {
        Ok(NodeOptions {
            host: self.get_node_host(),
            port: self.get_node_port()?,
            data_dir: Some(self.get_data_dir()),
            difficulty: self.get_difficulty()?,
        })
    }
}
