//! Ledger integration tests
//!
//! Exercises the store, mining and UTXO derivation together through the
//! public API, against real sled databases in temporary directories.

use pow_ledger::{
    Block, Blockchain, Ledger, LedgerConfig, LedgerError, PlaintextUnlock, ProofOfWork,
    Transaction, UtxoView, SUBSIDY,
};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn test_config(dir: &tempfile::TempDir) -> LedgerConfig {
    LedgerConfig::with_path(dir.path().join("test_ledger"))
}

#[test]
fn test_genesis_invariant_after_reopen() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    drop(Ledger::create_chain(&config, "A").unwrap());

    let ledger = Ledger::open(&config).unwrap();
    let blocks: Vec<Block> = ledger
        .blockchain()
        .iterator()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].get_pre_block_hash().is_empty());
    let txs = blocks[0].get_transactions();
    assert_eq!(txs.len(), 1);
    assert!(txs[0].is_coinbase());
    assert_eq!(txs[0].get_vout()[0].get_lock(), "A");
    assert_eq!(txs[0].get_vout()[0].get_value(), SUBSIDY);
}

#[test]
fn test_create_over_existing_chain_fails() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    drop(Ledger::create_chain(&config, "A").unwrap());

    assert!(matches!(
        Ledger::create_chain(&config, "B"),
        Err(LedgerError::AlreadyExists(_))
    ));
    // the original chain is untouched
    let ledger = Ledger::open(&config).unwrap();
    assert_eq!(ledger.balance_of("A").unwrap(), SUBSIDY);
    assert_eq!(ledger.balance_of("B").unwrap(), 0);
}

#[test]
fn test_open_without_chain_fails() {
    let temp_dir = tempdir().unwrap();
    assert!(matches!(
        Ledger::open(&test_config(&temp_dir)),
        Err(LedgerError::NotFound(_))
    ));
}

#[test]
fn test_every_stored_block_has_valid_proof_of_work() {
    let temp_dir = tempdir().unwrap();
    let ledger = Ledger::create_chain(&test_config(&temp_dir), "A").unwrap();
    ledger.append_transfer("A", "B", 3).unwrap();
    ledger.mine_reward("C").unwrap();

    for block in ledger.blockchain().iterator().unwrap() {
        let block = block.unwrap();
        assert!(ProofOfWork::validate(&block));
        assert_eq!(block.get_hash().len(), 32);
    }
}

#[test]
fn test_block_round_trip_with_nested_transactions() {
    let temp_dir = tempdir().unwrap();
    let ledger = Ledger::create_chain(&test_config(&temp_dir), "A").unwrap();
    let block = ledger.append_transfer("A", "B", 3).unwrap();

    let restored = Block::deserialize(&block.serialize().unwrap()).unwrap();
    assert_eq!(restored, block);
    assert_eq!(restored.get_transactions()[0].get_vin().len(), 1);
    assert_eq!(restored.get_transactions()[0].get_vout().len(), 2);
}

#[test]
fn test_append_monotonicity() {
    let temp_dir = tempdir().unwrap();
    let ledger = Ledger::create_chain(&test_config(&temp_dir), "A").unwrap();
    let blockchain = ledger.blockchain();

    for _ in 0..3 {
        let old_tip = blockchain.get_tip_hash().unwrap();
        let tx = Transaction::new_coinbase_tx("miner", "").unwrap();
        let block = blockchain.mine_block(&[tx]).unwrap();

        let newest = blockchain.iterator().unwrap().next().unwrap().unwrap();
        assert_eq!(newest, block);
        assert_eq!(newest.get_pre_block_hash(), old_tip.as_slice());
        assert_eq!(blockchain.get_tip_hash().unwrap(), block.get_hash());
    }
    assert_eq!(ledger.chain_length().unwrap(), 4);
}

#[test]
fn test_utxo_conservation() {
    let temp_dir = tempdir().unwrap();
    let ledger = Ledger::create_chain(&test_config(&temp_dir), "A").unwrap();
    let addresses = ["A", "B", "C", "D"];

    ledger.append_transfer("A", "B", 4).unwrap();
    ledger.mine_reward("C").unwrap();
    ledger.append_transfer("C", "D", 9).unwrap();
    ledger.append_transfer("B", "A", 4).unwrap();
    ledger.mine_reward("B").unwrap();
    ledger.append_transfer("A", "C", 10).unwrap();
    ledger.append_transfer("D", "D", 5).unwrap();
    assert!(matches!(
        ledger.append_transfer("B", "A", 11),
        Err(LedgerError::InsufficientFunds { .. })
    ));

    let coinbase_count = ledger
        .blockchain()
        .iterator()
        .unwrap()
        .map(|block| {
            block
                .unwrap()
                .get_transactions()
                .iter()
                .filter(|tx| tx.is_coinbase())
                .count() as u64
        })
        .sum::<u64>();
    assert_eq!(coinbase_count, 3);

    let total: u64 = addresses
        .iter()
        .map(|addr| ledger.balance_of(addr).unwrap())
        .sum();
    assert_eq!(total, SUBSIDY * coinbase_count);

    for addr in addresses {
        assert_eq!(
            ledger.indexed_balance_of(addr).unwrap(),
            ledger.balance_of(addr).unwrap()
        );
    }
}

#[test]
fn test_spend_selection_sums_to_accumulated() {
    let temp_dir = tempdir().unwrap();
    let ledger = Ledger::create_chain(&test_config(&temp_dir), "A").unwrap();
    ledger.mine_reward("A").unwrap();
    ledger.append_transfer("A", "B", 3).unwrap();
    ledger.mine_reward("A").unwrap();

    let blockchain = ledger.blockchain();
    let view = UtxoView::new(blockchain, &PlaintextUnlock);
    for amount in [1, 7, 10, 17, 25] {
        let (accumulated, selection) = view.find_spendable_outputs("A", amount).unwrap();
        assert!(accumulated >= amount);

        let mut selected_sum = 0;
        for selected in &selection {
            let tx = blockchain.find_transaction(&selected.txid).unwrap().unwrap();
            for &idx in &selected.indices {
                selected_sum += tx.get_vout()[idx].get_value();
            }
        }
        assert_eq!(selected_sum, accumulated);
    }
}

#[test]
fn test_concrete_transfer_scenario_survives_reopen() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    {
        let ledger = Ledger::create_chain(&config, "A").unwrap();
        assert_eq!(ledger.balance_of("A").unwrap(), 10);
        ledger.append_transfer("A", "B", 4).unwrap();
    }

    let ledger = Ledger::open(&config).unwrap();
    assert_eq!(ledger.balance_of("A").unwrap(), 6);
    assert_eq!(ledger.balance_of("B").unwrap(), 4);
    assert_eq!(ledger.chain_length().unwrap(), 2);

    let result = ledger.append_transfer("A", "B", 100);
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds {
            required: 100,
            available: 6
        })
    ));
    assert_eq!(ledger.balance_of("A").unwrap(), 6);
    assert_eq!(ledger.balance_of("B").unwrap(), 4);
    assert_eq!(ledger.chain_length().unwrap(), 2);
}

#[test]
fn test_concurrent_transfers_never_double_spend() {
    let temp_dir = tempdir().unwrap();
    let ledger = Arc::new(Ledger::create_chain(&test_config(&temp_dir), "A").unwrap());

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.append_transfer("A", &format!("B{i}"), 4))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 2);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. }))));
    assert_eq!(ledger.balance_of("A").unwrap(), 2);
    assert_eq!(ledger.chain_length().unwrap(), 3);
}

#[test]
fn test_concurrent_appends_form_single_chain() {
    let temp_dir = tempdir().unwrap();
    let ledger = Arc::new(Ledger::create_chain(&test_config(&temp_dir), "A").unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.mine_reward("miner").unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let dump = ledger.dump_chain().unwrap();
    assert_eq!(dump.len(), 5);
    for pair in dump.windows(2) {
        assert_eq!(pair[0].prev_hash, pair[1].hash);
    }
    assert_eq!(ledger.balance_of("miner").unwrap(), 4 * SUBSIDY);
}

#[test]
fn test_corrupt_block_is_reported_not_skipped() {
    let temp_dir = tempdir().unwrap();
    let ledger = Ledger::create_chain(&test_config(&temp_dir), "A").unwrap();
    let genesis_hash = ledger.blockchain().get_tip_hash().unwrap();
    ledger.append_transfer("A", "B", 4).unwrap();

    let blocks = ledger.blockchain().get_db().open_tree("blocks").unwrap();
    let mut bytes = blocks.get(genesis_hash.as_slice()).unwrap().unwrap().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    blocks.insert(genesis_hash.as_slice(), bytes).unwrap();

    assert!(matches!(
        ledger.balance_of("A"),
        Err(LedgerError::CorruptBlock(_))
    ));
    assert!(matches!(
        ledger.dump_chain(),
        Err(LedgerError::CorruptBlock(_))
    ));
}

#[test]
fn test_blockchain_handle_reopens_at_same_tip() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);

    let tip = {
        let blockchain = Blockchain::create_blockchain(&config, "A").unwrap();
        for _ in 0..3 {
            let tx = Transaction::new_coinbase_tx("A", "").unwrap();
            blockchain.mine_block(&[tx]).unwrap();
        }
        assert_eq!(blockchain.get_best_height().unwrap(), 3);
        blockchain.get_tip_hash().unwrap()
    };

    let blockchain = Blockchain::open_blockchain(&config).unwrap();
    assert_eq!(blockchain.get_tip_hash().unwrap(), tip);
    assert_eq!(blockchain.get_best_height().unwrap(), 3);
}
