//! Ledger integration tests
//!
//! Drives the consensus engine, UTXO set and persistence through the public API only.

use peerchain::core::genesis::{self, GENESIS_OUTPUT_ID};
use peerchain::{
    Block, BlockRejection, Blockchain, ChainStore, TXInput, TXOutput, Transaction, UTXOSet,
    Wallet, BLOCK_REWARD,
};
use tempfile::tempdir;

const DIFFICULTY: usize = 2;

fn mine_on(blockchain: &Blockchain, transactions: Vec<Transaction>) -> Block {
    let mut block = blockchain.new_block_template(transactions).unwrap();
    blockchain.get_proof_of_work().run(&mut block);
    block
}

fn mine_reward(blockchain: &Blockchain, wallet: &Wallet) -> Block {
    let coinbase = Transaction::new_coinbase_tx(wallet.get_public_key()).unwrap();
    let block = mine_on(blockchain, vec![coinbase]);
    assert!(blockchain.try_add_block(&block));
    block
}

#[test]
fn test_mining_one_block_from_genesis() {
    let miner = Wallet::new().unwrap();
    let blockchain = Blockchain::new(DIFFICULTY);

    let block = mine_reward(&blockchain, &miner);
    let reward_id = block.get_transactions()[0].get_outputs()[0].get_id();

    assert_eq!(blockchain.len(), 2);
    assert_eq!(block.compute_hash(), block.get_hash());
    assert!(block.get_hash().starts_with("00"));

    let utxo = blockchain.get_utxo();
    assert_eq!(utxo.len(), 2);
    assert!(utxo.contains(GENESIS_OUTPUT_ID));
    assert!(utxo.contains(reward_id));
}

#[test]
fn test_independent_nodes_share_genesis() {
    let a = Blockchain::new(DIFFICULTY);
    let b = Blockchain::new(DIFFICULTY);
    assert_eq!(a.get_chain(), b.get_chain());
    assert_eq!(a.genesis_hash(), genesis::genesis_block().get_hash());
    assert_eq!(a.get_utxo(), b.get_utxo());
}

#[test]
fn test_payment_flow() {
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();
    let blockchain = Blockchain::new(DIFFICULTY);
    let funding = mine_reward(&blockchain, &alice);
    let output_id = funding.get_transactions()[0].get_outputs()[0].get_id();

    let mut payment = Transaction::new(
        alice.get_public_key(),
        vec![TXInput::new(output_id)],
        vec![TXOutput::new(bob.get_public_key(), 1)],
    )
    .unwrap();
    payment.sign(alice.get_pkcs8()).unwrap();
    assert!(blockchain.is_transaction_valid(&payment));

    let coinbase = Transaction::new_coinbase_tx(alice.get_public_key()).unwrap();
    let block = mine_on(&blockchain, vec![coinbase, payment.clone()]);
    assert!(blockchain.try_add_block(&block));

    assert_eq!(blockchain.get_balance(bob.get_public_key()), 1);
    assert_eq!(blockchain.get_balance(alice.get_public_key()), BLOCK_REWARD);
    // Spent once, never again
    assert!(!blockchain.is_transaction_valid(&payment));
}

#[test]
fn test_unsigned_spend_is_rejected() {
    let alice = Wallet::new().unwrap();
    let blockchain = Blockchain::new(DIFFICULTY);
    let funding = mine_reward(&blockchain, &alice);
    let output_id = funding.get_transactions()[0].get_outputs()[0].get_id();

    let unsigned = Transaction::new(
        alice.get_public_key(),
        vec![TXInput::new(output_id)],
        vec![TXOutput::new(alice.get_public_key(), 1)],
    )
    .unwrap();
    assert!(!blockchain.is_transaction_valid(&unsigned));

    let block = mine_on(&blockchain, vec![unsigned]);
    assert_eq!(
        blockchain.add_block(&block),
        Err(BlockRejection::InvalidTransaction { index: 0 })
    );
}

#[test]
fn test_stale_block_is_rejected() {
    let miner = Wallet::new().unwrap();
    let blockchain = Blockchain::new(DIFFICULTY);
    let coinbase = Transaction::new_coinbase_tx(miner.get_public_key()).unwrap();
    let stale = mine_on(&blockchain, vec![coinbase]);

    mine_reward(&blockchain, &miner);
    assert_eq!(
        blockchain.add_block(&stale),
        Err(BlockRejection::PrevHashMismatch)
    );
    assert_eq!(blockchain.len(), 2);
}

#[test]
fn test_fork_resolution_rebuilds_utxo() {
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();
    let a = Blockchain::new(DIFFICULTY);
    let b = Blockchain::new(DIFFICULTY);

    let discarded = mine_reward(&a, &alice);
    mine_reward(&b, &bob);
    mine_reward(&b, &bob);

    // Equal length never replaces
    assert!(!b.maybe_replace_chain(&a.get_chain()[..]));

    assert!(a.maybe_replace_chain(&b.get_chain()));
    assert_eq!(a.get_chain(), b.get_chain());
    assert_eq!(a.get_utxo(), b.get_utxo());
    assert_eq!(a.get_balance(alice.get_public_key()), 0);
    assert!(!a.contains_block(discarded.get_hash()));

    // And never shortens
    assert!(!a.maybe_replace_chain(&b.get_chain()[..2]));
    assert_eq!(a.len(), 3);
}

#[test]
fn test_rebuild_is_idempotent() {
    let miner = Wallet::new().unwrap();
    let blockchain = Blockchain::new(DIFFICULTY);
    for _ in 0..3 {
        mine_reward(&blockchain, &miner);
    }

    let chain = blockchain.get_chain();
    let first = UTXOSet::rebuild(&chain);
    let second = UTXOSet::rebuild(&chain);
    assert_eq!(first, second);
    assert_eq!(first, blockchain.get_utxo());
    assert_eq!(first.get_balance(miner.get_public_key()), 3);
}

#[test]
fn test_blockchain_persistence() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("node_test");
    let miner = Wallet::new().unwrap();
    let blockchain = Blockchain::new(DIFFICULTY);
    mine_reward(&blockchain, &miner);
    mine_reward(&blockchain, &miner);

    {
        let store = ChainStore::open(&db_path).unwrap();
        store.save_chain(&blockchain.get_chain()).unwrap();
    }

    let store = ChainStore::open(&db_path).unwrap();
    let restored = store.load_blockchain(DIFFICULTY);
    assert_eq!(restored.len(), 3);
    assert_eq!(restored.get_utxo(), blockchain.get_utxo());

    // The restored chain keeps growing
    mine_reward(&restored, &miner);
    assert_eq!(restored.get_balance(miner.get_public_key()), 3);
}
