// Entry point: start one node, sync with any peers given on the command line,
// then drive it from console lines on stdin until `exit` or end of input.
use clap::Parser;
use log::{error, info, LevelFilter};
use peerchain::{Command, ConsoleLine, Node, Opt, Peer, GLOBAL_CONFIG};
use std::io::{self, BufRead, Write};
use std::process;

fn main() {
    // Info by default; RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    // Flags override whatever the environment provided
    if let Some(port) = opt.port {
        GLOBAL_CONFIG.set_node_port(port);
    }
    if let Some(host) = opt.host {
        GLOBAL_CONFIG.set_node_host(host);
    }
    if let Some(dir) = opt.data_dir {
        GLOBAL_CONFIG.set_data_dir(dir.to_string_lossy().to_string());
    }
    if let Some(difficulty) = opt.difficulty {
        GLOBAL_CONFIG.set_difficulty(difficulty);
    }

    let node = Node::new(GLOBAL_CONFIG.node_options()?)?;
    let addr = node.start()?;
    println!("Node listening on {addr}");
    println!("Public key: {}", node.public_key_hex());

    for target in &opt.connect {
        match target.parse::<Peer>() {
            Ok(peer) => connect(&node, peer.get_host(), peer.get_port()),
            Err(e) => error!("Skipping --connect {target}: {e}"),
        }
    }

    let stdin = io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let line = line?;
        match ConsoleLine::parse_line(&line) {
            Ok(Some(Command::Exit)) => break,
            Ok(Some(command)) => run_command(&node, command),
            Ok(None) => {}
            // clap renders usage and the reason
            Err(e) => println!("{e}"),
        }
        prompt();
    }

    node.disconnect();
    info!("Node on port {} stopped", node.get_port());
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn connect(node: &Node, host: &str, port: u16) {
    match node.sync_with_peer(host, port) {
        Ok(true) => println!("Connected to {host}:{port}, adopted its longer chain"),
        Ok(false) => println!("Connected to {host}:{port}"),
        Err(e) => println!("Could not connect to {host}:{port}: {e}"),
    }
}

// Each console command maps onto one node method
fn run_command(node: &Node, command: Command) {
    match command {
        Command::Connect { host, port } => connect(node, &host, port),
        Command::Send { recipient, amount } => match node.send(&recipient, amount) {
            Ok(txid) => println!("Transaction {txid} submitted"),
            Err(e) => println!("Send failed: {e}"),
        },
        Command::Mine => match node.mine_from_mempool() {
            Ok(Some(block)) => println!("Mined block {} : {}", block.get_index(), block.get_hash()),
            Ok(None) => println!("Mined block was rejected, the chain moved on"),
            Err(e) => println!("Mining failed: {e}"),
        },
        Command::Balance => println!("Balance: {}", node.balance()),
        Command::Chain => {
            for block in node.chain() {
                println!("======================================================");
                println!("Index: {}", block.get_index());
                println!("Hash: {}", block.get_hash());
                println!("Prev hash: {}", block.get_prev_hash());
                println!("Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                for tx in block.get_transactions() {
                    println!(
                        "- Transaction {} ({} in, {} out)",
                        tx.get_id(),
                        tx.get_inputs().len(),
                        tx.get_outputs().len()
                    );
                }
            }
        }
        Command::Utxo => {
            for output in node.utxo().iter() {
                println!(
                    "{} -> {} : {}",
                    output.get_id(),
                    peerchain::utils::key_fingerprint(output.get_recipient()),
                    output.get_amount()
                );
            }
        }
        Command::Mempool => {
            let pending = node.mempool();
            if pending.is_empty() {
                println!("Mempool is empty");
            }
            for tx in pending {
                println!("{} : {} out", tx.get_id(), tx.get_output_value().unwrap_or(0));
            }
        }
        Command::Peers => {
            for peer in node.peers() {
                println!("{peer}");
            }
        }
        Command::Exit => {}
    }
}
