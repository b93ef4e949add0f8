use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Process flags. Anything left unset falls back to the environment, then to defaults.
#[derive(Debug, Parser)]
#[command(name = "peerchain", about = "Run a peer-to-peer ledger node")]
pub struct Opt {
    #[arg(long, help = "Port to listen on (env NODE_PORT)")]
    pub port: Option<u16>,
    #[arg(long, help = "Host to bind (env NODE_HOST)")]
    pub host: Option<String>,
    #[arg(long = "data-dir", help = "Root directory for node databases (env DATA_DIR)")]
    pub data_dir: Option<PathBuf>,
    #[arg(long, help = "Leading zero hex digits required (env POW_DIFFICULTY)")]
    pub difficulty: Option<usize>,
    #[arg(
        long = "connect",
        value_name = "HOST:PORT",
        help = "Peer to sync with on startup, may be repeated"
    )]
    pub connect: Vec<String>,
}

/// One line typed at the node console
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    #[command(about = "Register a peer and sync with its chain")]
    Connect {
        host: String,
        port: u16,
    },
    #[command(about = "Pay AMOUNT to a hex-encoded public key")]
    Send {
        #[arg(help = "Recipient public key, hex")]
        recipient: String,
        amount: u64,
    },
    #[command(about = "Mine a block from the mempool")]
    Mine,
    #[command(about = "Print this node's balance")]
    Balance,
    #[command(about = "Print the chain")]
    Chain,
    #[command(about = "Print the unspent outputs")]
    Utxo,
    #[command(about = "Print pending transactions")]
    Mempool,
    #[command(about = "Print known peers")]
    Peers,
    #[command(about = "Say goodbye to peers and quit")]
    Exit,
}

impl ConsoleLine {
    /// Parse a console line; `Ok(None)` for blank input
    pub fn parse_line(line: &str) -> Result<Option<Command>, clap::Error> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }
        ConsoleLine::try_parse_from(words).map(|parsed| Some(parsed.command))
    }
}
