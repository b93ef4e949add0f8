use crate::config::NodeOptions;
use crate::core::{Block, Blockchain, TXInput, TXOutput, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::message::{exchange, read_message, write_message, TCP_READ_TIMEOUT};
use crate::network::{Message, Peer, Peers};
use crate::storage::{ChainStore, MemoryPool, UTXOSet};
use crate::utils::{decode_hex, is_valid_public_key};
use crate::wallet::Wallet;
use log::{debug, error, info, warn};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

struct NodeInner {
    host: String,
    port: AtomicU16,
    blockchain: Blockchain,
    mempool: MemoryPool,
    peers: Peers,
    store: ChainStore,
    wallet: Wallet,
    /// Serializes chain snapshots written to the store
    persist_lock: Mutex<()>,
}

/// A gossip node: ledger, mempool and peer set, served over TCP.
///
/// Cloning is cheap and every clone drives the same node; connection handler
/// threads each hold one.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Load chain and node key from the store (or start fresh). Does not listen yet.
    pub fn new(options: NodeOptions) -> Result<Node> {
        let store = match options.node_db_path() {
            Some(path) => ChainStore::open(path)?,
            None => ChainStore::temporary()?,
        };
        let wallet = store.load_or_create_wallet()?;
        let blockchain = store.load_blockchain(options.difficulty);

        Ok(Node {
            inner: Arc::new(NodeInner {
                host: options.host,
                port: AtomicU16::new(options.port),
                blockchain,
                mempool: MemoryPool::new(),
                peers: Peers::new(),
                store,
                wallet,
                persist_lock: Mutex::new(()),
            }),
        })
    }

    /// Bind the listener and serve connections on a background thread.
    /// Returns the bound address; with port 0 the OS-assigned port becomes the node's port.
    pub fn start(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.inner.host, self.get_port());
        let listener = TcpListener::bind(&addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;
        self.inner.port.store(local_addr.port(), Ordering::SeqCst);
        info!(
            "Node {} listening on {local_addr}",
            self.inner.wallet.get_fingerprint()
        );

        let node = self.clone();
        thread::spawn(move || node.run(listener));
        Ok(local_addr)
    }

    fn run(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let node = self.clone();
                    thread::spawn(move || {
                        if let Err(e) = node.handle_connection(stream) {
                            error!("Error handling connection: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
    }

    /// Exactly one message in, at most one reply out, then close
    fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let peer_addr = stream.peer_addr()?;
        stream.set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))?;

        let message = match read_message(&stream)? {
            Some(message) => message,
            None => {
                debug!("{peer_addr} closed without sending a message");
                return Ok(());
            }
        };
        debug!("Received {} from {peer_addr}", message.tag());

        if let Some(reply) = self.process_message(message, peer_addr) {
            if let Err(e) = write_message(&stream, &reply) {
                debug!("Could not reply to {peer_addr}: {e}");
            }
        }
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    fn process_message(&self, message: Message, remote: SocketAddr) -> Option<Message> {
        match message {
            Message::Hello(port) => {
                self.inner
                    .peers
                    .add_peer(Peer::new(remote.ip().to_string(), port));
                Some(Message::Ack)
            }
            Message::RequestChain => Some(Message::SendChain(self.inner.blockchain.get_chain())),
            Message::NewBlock(block) => {
                self.handle_new_block(block);
                Some(Message::Ack)
            }
            Message::NewTx(tx) => {
                self.handle_new_tx(tx);
                Some(Message::Ack)
            }
            Message::Disconnect(port) => {
                self.inner
                    .peers
                    .remove_peer(&Peer::new(remote.ip().to_string(), port));
                None
            }
            Message::SendChain(_) | Message::Ack => {
                debug!("Ignoring unsolicited message from {remote}");
                Some(Message::Ack)
            }
        }
    }

    fn handle_new_block(&self, block: Block) {
        if self.inner.blockchain.contains_block(block.get_hash()) {
            return;
        }

        if self.inner.blockchain.try_add_block(&block) {
            self.inner.mempool.remove_confirmed(block.get_transactions());
            self.persist();
            self.broadcast_block(&block);
        } else {
            // Either we are behind or on a fork; let the longest chain sort it out
            for peer in self.inner.peers.get_peers() {
                if let Err(e) = self.request_chain_from_peer(&peer) {
                    warn!("Chain request to {peer} failed: {e}");
                }
            }
        }
    }

    fn handle_new_tx(&self, tx: Transaction) {
        if self.inner.mempool.has_seen(tx.get_id()) {
            return;
        }

        match self
            .inner
            .mempool
            .add_transaction(tx.clone(), &self.inner.blockchain)
        {
            Ok(()) => {
                info!("Accepted transaction {}", tx.get_id());
                self.broadcast_transaction(&tx);
            }
            Err(e) => debug!("Dropped transaction {}: {e}", tx.get_id()),
        }
    }

    /// Write the current chain to the store. Failures are logged; memory stays authoritative.
    fn persist(&self) {
        let _guard = match self.inner.persist_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = self.inner.store.save_chain(&self.inner.blockchain.get_chain()) {
            error!("Failed to persist chain: {e}");
        }
    }

    /// HELLO then REQUEST_CHAIN; adopts the peer's chain if it is longer and valid
    pub fn sync_with_peer(&self, host: &str, port: u16) -> Result<bool> {
        let peer = Peer::new(host, port);
        match exchange(&peer, &Message::Hello(self.get_port()))? {
            Some(Message::Ack) | None => {}
            Some(other) => {
                return Err(BlockchainError::Network(format!(
                    "Unexpected reply {} to HELLO from {peer}",
                    other.tag()
                )))
            }
        }
        self.inner.peers.add_peer(peer.clone());
        self.request_chain_from_peer(&peer)
    }

    /// Ask `peer` for its chain and adopt it if longer and valid.
    /// On adoption every mempool assumption is void, so the pool is cleared.
    pub fn request_chain_from_peer(&self, peer: &Peer) -> Result<bool> {
        let reply = match exchange(peer, &Message::RequestChain) {
            Ok(reply) => reply,
            Err(e @ BlockchainError::PeerUnreachable(_)) => {
                self.inner.peers.remove_peer(peer);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let blocks = match reply {
            Some(Message::SendChain(blocks)) => blocks,
            Some(other) => {
                return Err(BlockchainError::Network(format!(
                    "Unexpected reply {} to REQUEST_CHAIN from {peer}",
                    other.tag()
                )))
            }
            None => return Ok(false),
        };

        if self.inner.blockchain.maybe_replace_chain(&blocks) {
            info!("Adopted chain of {} blocks from {peer}", blocks.len());
            self.inner.mempool.clear_all();
            self.persist();
            return Ok(true);
        }
        Ok(false)
    }

    /// Send `message` to every known peer. Unreachable peers are dropped.
    fn broadcast(&self, message: &Message) {
        for peer in self.inner.peers.get_peers() {
            match exchange(&peer, message) {
                Ok(_) => {}
                Err(BlockchainError::PeerUnreachable(reason)) => {
                    warn!("Peer {peer} unreachable ({reason}), removing it");
                    self.inner.peers.remove_peer(&peer);
                }
                Err(e) => warn!("Failed to send {} to {peer}: {e}", message.tag()),
            }
        }
    }

    pub fn broadcast_block(&self, block: &Block) {
        self.broadcast(&Message::NewBlock(block.clone()));
    }

    pub fn broadcast_transaction(&self, tx: &Transaction) {
        self.broadcast(&Message::NewTx(tx.clone()));
    }

    /// Mine a coinbase to self plus every pending transaction still valid against the
    /// committed ledger. Runs proof-of-work on the calling thread without holding the
    /// chain lock. `Ok(None)` when the chain moved underneath and the block was rejected.
    pub fn mine_from_mempool(&self) -> Result<Option<Block>> {
        let blockchain = &self.inner.blockchain;
        let mut transactions = vec![Transaction::new_coinbase_tx(
            self.inner.wallet.get_public_key(),
        )?];
        for tx in self.inner.mempool.get_all() {
            if blockchain.is_transaction_valid(&tx) {
                transactions.push(tx);
            } else {
                warn!("Leaving stale transaction {} out of the block", tx.get_id());
            }
        }

        let mut block = blockchain.new_block_template(transactions)?;
        blockchain.get_proof_of_work().run(&mut block);

        if !blockchain.try_add_block(&block) {
            warn!("Mined block {} was rejected", block.get_index());
            return Ok(None);
        }

        self.persist();
        self.inner.mempool.clear_all();
        self.broadcast_block(&block);
        Ok(Some(block))
    }

    /// Pay `amount` to `recipient` from this node's unreserved outputs, with change back to self
    pub fn create_transaction(&self, recipient: &[u8], amount: u64) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::InvalidAmount(amount));
        }
        if !is_valid_public_key(recipient) {
            return Err(BlockchainError::InvalidKey(
                "recipient must be a 65-byte uncompressed P-256 key".to_string(),
            ));
        }

        let own_key = self.inner.wallet.get_public_key();
        let mut spendable: Vec<TXOutput> = self
            .inner
            .blockchain
            .get_utxo()
            .find_utxo(own_key)
            .into_iter()
            .filter(|out| !self.inner.mempool.is_reserved(out.get_id()))
            .collect();
        // Largest outputs first
        spendable.sort_by(|a, b| {
            b.get_amount()
                .cmp(&a.get_amount())
                .then_with(|| a.get_id().cmp(b.get_id()))
        });

        let mut inputs = vec![];
        let mut gathered = 0u64;
        for out in spendable {
            if gathered >= amount {
                break;
            }
            gathered = gathered.saturating_add(out.get_amount());
            inputs.push(TXInput::new(out.get_id()));
        }
        if gathered < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: gathered,
            });
        }

        let mut outputs = vec![TXOutput::new(recipient, amount)];
        if gathered > amount {
            outputs.push(TXOutput::new(own_key, gathered - amount));
        }

        let mut tx = Transaction::new(own_key, inputs, outputs)?;
        tx.sign(self.inner.wallet.get_pkcs8())?;
        Ok(tx)
    }

    /// Create, admit locally and gossip a payment. Returns its txId.
    pub fn send(&self, recipient_hex: &str, amount: u64) -> Result<String> {
        let recipient = decode_hex(recipient_hex)?;
        let tx = self.create_transaction(&recipient, amount)?;
        self.inner
            .mempool
            .add_transaction(tx.clone(), &self.inner.blockchain)?;
        info!("Sending {amount} to {recipient_hex} in {}", tx.get_id());
        self.broadcast_transaction(&tx);
        Ok(tx.get_id().to_string())
    }

    /// Tell every peer we are leaving; failures do not matter at this point
    pub fn disconnect(&self) {
        let message = Message::Disconnect(self.get_port());
        for peer in self.inner.peers.get_peers() {
            if let Err(e) = exchange(&peer, &message) {
                debug!("DISCONNECT to {peer} failed: {e}");
            }
        }
    }

    pub fn get_port(&self) -> u16 {
        self.inner.port.load(Ordering::SeqCst)
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.inner.blockchain
    }

    pub fn get_memory_pool(&self) -> &MemoryPool {
        &self.inner.mempool
    }

    pub fn get_peer_set(&self) -> &Peers {
        &self.inner.peers
    }

    pub fn public_key(&self) -> &[u8] {
        self.inner.wallet.get_public_key()
    }

    pub fn public_key_hex(&self) -> String {
        self.inner.wallet.get_public_key_hex()
    }

    pub fn balance(&self) -> u64 {
        self.inner.blockchain.get_balance(self.public_key())
    }

    pub fn chain(&self) -> Vec<Block> {
        self.inner.blockchain.get_chain()
    }

    pub fn utxo(&self) -> UTXOSet {
        self.inner.blockchain.get_utxo()
    }

    pub fn mempool(&self) -> Vec<Transaction> {
        self.inner.mempool.get_all()
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.inner.peers.get_peers()
    }
}
