//! Gossip integration tests
//!
//! Several nodes on loopback, each on an OS-assigned port, talking the real
//! wire protocol. Handlers finish their work before replying, so once an
//! outbound call returns its effects are visible on the remote node.

use peerchain::network::exchange;
use peerchain::{BlockchainError, Message, Node, NodeOptions, Peer, Wallet, BLOCK_REWARD};
use std::io::Read;
use std::net::TcpListener;
use std::thread;
use tempfile::tempdir;

fn spawn_node() -> Node {
    let node = Node::new(NodeOptions::ephemeral(1)).unwrap();
    node.start().unwrap();
    node
}

fn connect(from: &Node, to: &Node) -> bool {
    from.sync_with_peer("127.0.0.1", to.get_port()).unwrap()
}

fn local_peer(node: &Node) -> Peer {
    Peer::new("127.0.0.1", node.get_port())
}

#[test]
fn test_hello_registers_both_sides() {
    let a = spawn_node();
    let b = spawn_node();

    // Both at genesis: nothing to adopt
    assert!(!connect(&b, &a));
    assert_eq!(a.chain(), b.chain());
    assert_eq!(b.chain().len(), 1);

    assert_eq!(a.peers(), vec![local_peer(&b)]);
    assert_eq!(b.peers(), vec![local_peer(&a)]);
}

#[test]
fn test_new_block_reaches_peer() {
    let a = spawn_node();
    let b = spawn_node();
    connect(&b, &a);

    let block = a.mine_from_mempool().unwrap().unwrap();

    assert_eq!(b.chain().len(), 2);
    assert_eq!(b.get_blockchain().get_latest_block(), block);
    assert_eq!(b.utxo(), a.utxo());
}

#[test]
fn test_block_and_transaction_relay_across_a_line() {
    let a = spawn_node();
    let b = spawn_node();
    let c = spawn_node();
    // A - B - C: A and C never meet
    connect(&b, &a);
    connect(&c, &b);
    assert!(!a.peers().contains(&local_peer(&c)));
    assert!(!c.peers().contains(&local_peer(&a)));

    let block = a.mine_from_mempool().unwrap().unwrap();
    assert_eq!(c.chain().len(), 2);
    assert_eq!(c.get_blockchain().get_latest_block(), block);

    let txid = a.send(&c.public_key_hex(), 1).unwrap();
    let pending = c.mempool();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].get_id(), txid);
}

#[test]
fn test_longer_chain_wins_after_divergence() {
    let a = spawn_node();
    let b = spawn_node();

    let discarded = a.mine_from_mempool().unwrap().unwrap();
    b.mine_from_mempool().unwrap().unwrap();
    b.mine_from_mempool().unwrap().unwrap();
    assert_eq!(a.balance(), BLOCK_REWARD);

    assert!(connect(&a, &b));
    assert_eq!(a.chain(), b.chain());
    assert_eq!(a.utxo(), b.utxo());
    assert_eq!(a.balance(), 0);
    assert!(!a.get_blockchain().contains_block(discarded.get_hash()));
}

#[test]
fn test_rejected_block_triggers_chain_request() {
    let a = spawn_node();
    let b = spawn_node();

    // B pulls ahead while the two do not know each other
    b.mine_from_mempool().unwrap().unwrap();
    b.mine_from_mempool().unwrap().unwrap();

    // A's chain is shorter, so B keeps its own; A now knows B through HELLO
    assert!(!connect(&b, &a));
    assert_eq!(a.chain().len(), 1);

    // A cannot attach B's next block and asks its peers for their chains instead
    b.mine_from_mempool().unwrap().unwrap();
    assert_eq!(a.chain().len(), 4);
    assert_eq!(a.chain(), b.chain());
}

#[test]
fn test_transaction_gossip_and_confirmation() {
    let a = spawn_node();
    let b = spawn_node();
    connect(&b, &a);

    a.mine_from_mempool().unwrap().unwrap();
    let txid = a.send(&b.public_key_hex(), 1).unwrap();

    let pending = b.mempool();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].get_id(), txid);

    b.mine_from_mempool().unwrap().unwrap();

    assert!(a.mempool().is_empty());
    assert!(b.mempool().is_empty());
    assert_eq!(a.chain(), b.chain());
    assert_eq!(
        a.get_blockchain().get_balance(b.public_key()),
        1 + BLOCK_REWARD
    );
    assert_eq!(a.balance(), 0);
}

#[test]
fn test_duplicate_transaction_is_a_no_op() {
    let a = spawn_node();
    a.mine_from_mempool().unwrap().unwrap();
    let recipient = Wallet::new().unwrap();
    let tx = a.create_transaction(recipient.get_public_key(), 1).unwrap();

    let message = Message::NewTx(tx.clone());
    assert_eq!(exchange(&local_peer(&a), &message).unwrap(), Some(Message::Ack));
    assert_eq!(exchange(&local_peer(&a), &message).unwrap(), Some(Message::Ack));

    let pending = a.mempool();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0], tx);
}

#[test]
fn test_conflicting_transactions_never_both_pending() {
    let a = spawn_node();
    a.mine_from_mempool().unwrap().unwrap();
    let first = a
        .create_transaction(Wallet::new().unwrap().get_public_key(), 1)
        .unwrap();
    let second = a
        .create_transaction(Wallet::new().unwrap().get_public_key(), 1)
        .unwrap();
    assert_ne!(first.get_id(), second.get_id());

    exchange(&local_peer(&a), &Message::NewTx(first.clone())).unwrap();
    exchange(&local_peer(&a), &Message::NewTx(second)).unwrap();

    assert_eq!(a.mempool(), vec![first]);
}

#[test]
fn test_request_chain_reply() {
    let a = spawn_node();
    a.mine_from_mempool().unwrap().unwrap();

    let reply = exchange(&local_peer(&a), &Message::RequestChain).unwrap();
    assert_eq!(reply, Some(Message::SendChain(a.chain())));
}

#[test]
fn test_disconnect_removes_peer() {
    let a = spawn_node();
    let b = spawn_node();
    connect(&b, &a);
    assert_eq!(a.peers().len(), 1);

    b.disconnect();
    assert!(a.peers().is_empty());
}

#[test]
fn test_unreachable_peer_is_pruned() {
    let a = spawn_node();
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dead = Peer::new("127.0.0.1", dead_port);
    a.get_peer_set().add_peer(dead.clone());

    a.mine_from_mempool().unwrap().unwrap();
    assert!(!a.peers().contains(&dead));

    assert!(matches!(
        a.sync_with_peer("127.0.0.1", dead_port),
        Err(BlockchainError::PeerUnreachable(_))
    ));
    assert!(a.peers().is_empty());
}

#[test]
fn test_peer_closing_without_reply_stays_registered() {
    let a = spawn_node();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let silent = Peer::new("127.0.0.1", listener.local_addr().unwrap().port());
    a.get_peer_set().add_peer(silent.clone());

    // Reads the whole message, then hangs up without answering
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        stream.read_to_end(&mut request).unwrap();
        request
    });

    let block = a.mine_from_mempool().unwrap().unwrap();
    let request = handle.join().unwrap();

    let received: Message = serde_json::from_slice(&request).unwrap();
    assert_eq!(received, Message::NewBlock(block));
    assert_eq!(a.peers(), vec![silent]);
}

#[test]
fn test_node_restart_keeps_chain_and_key() {
    let temp_dir = tempdir().unwrap();
    let options = NodeOptions {
        data_dir: Some(temp_dir.path().to_path_buf()),
        ..NodeOptions::ephemeral(1)
    };

    let (key, chain) = {
        let node = Node::new(options.clone()).unwrap();
        node.mine_from_mempool().unwrap().unwrap();
        (node.public_key_hex(), node.chain())
    };

    let node = Node::new(options).unwrap();
    assert_eq!(node.public_key_hex(), key);
    assert_eq!(node.chain(), chain);
    assert_eq!(node.balance(), BLOCK_REWARD);
}
