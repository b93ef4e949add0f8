//! Configuration management
//!
//! Node settings come from the environment (`NODE_PORT`, `NODE_HOST`,
//! `DATA_DIR`, `POW_DIFFICULTY`) and can be overridden from the command line.

pub mod settings;

pub use settings::{Config, NodeOptions, GLOBAL_CONFIG};
