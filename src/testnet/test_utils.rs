//! Test utilities for ledger testing

use crate::config::LedgerConfig;
use crate::core::{Block, Blockchain, PlaintextUnlock, Transaction, UtxoView};
use crate::error::{LedgerError, Result};
use tempfile::TempDir;

/// Reward address of every test chain's genesis block
pub const TEST_ADDRESS: &str = "alice";

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| LedgerError::Io(e.to_string()))
}

/// Config pointing into a fresh temporary directory
pub fn create_test_config() -> Result<(LedgerConfig, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let config = LedgerConfig::with_path(temp_dir.path().join("test_ledger"));
    Ok((config, temp_dir))
}

/// Create a test blockchain with temporary storage
pub fn create_test_blockchain() -> Result<(Blockchain, TempDir)> {
    let (config, temp_dir) = create_test_config()?;
    let blockchain = Blockchain::create_blockchain(&config, TEST_ADDRESS)?;
    Ok((blockchain, temp_dir))
}

/// Mine a transfer straight onto `blockchain` using the replay path for selection
pub fn transfer(blockchain: &Blockchain, from: &str, to: &str, amount: u64) -> Result<Block> {
    blockchain.append_with(|chain| {
        let view = UtxoView::new(chain, &PlaintextUnlock);
        let (accumulated, selection) = view.find_spendable_outputs(from, amount)?;
        Ok(vec![Transaction::new_spend(
            from,
            to,
            amount,
            accumulated,
            &selection,
        )?])
    })
}
