//! Command-line interface
//!
//! Process flags for starting a node and the commands accepted on its console.

pub mod commands;

pub use commands::{Command, ConsoleLine, Opt};
