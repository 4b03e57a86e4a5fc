//! Command surface over the ledger store
//!
//! [`Ledger`] bundles the chain, the replay-based UTXO view and the maintained
//! UTXO index behind the operations a front end needs: create a chain, move
//! value, read balances and dump the chain for display.

use crate::config::LedgerConfig;
use crate::core::{
    AuthorizationCheck, Block, Blockchain, PlaintextUnlock, ProofOfWork, Transaction, UtxoView,
};
use crate::error::{LedgerError, Result};
use crate::storage::UTXOSet;
use data_encoding::HEXLOWER;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Display row for one block, newest first in [`Ledger::dump_chain`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub prev_hash: String,
    pub tx_digest: String,
    pub hash: String,
    pub pow_valid: bool,
    pub timestamp: i64,
    pub nonce: i64,
    pub transactions: usize,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        BlockSummary {
            prev_hash: HEXLOWER.encode(block.get_pre_block_hash()),
            tx_digest: HEXLOWER.encode(&block.hash_transactions()),
            hash: block.get_hash_hex(),
            pow_valid: ProofOfWork::validate(block),
            timestamp: block.get_timestamp(),
            nonce: block.get_nonce(),
            transactions: block.get_transactions().len(),
        }
    }
}

pub struct Ledger {
    blockchain: Blockchain,
    utxo_set: UTXOSet,
    auth: Arc<dyn AuthorizationCheck>,
    // orders index updates the same way blocks were appended
    index_lock: Mutex<()>,
}

impl Ledger {
    fn from_blockchain(blockchain: Blockchain, auth: Arc<dyn AuthorizationCheck>) -> Ledger {
        let utxo_set = UTXOSet::new(blockchain.clone(), Arc::clone(&auth));
        Ledger {
            blockchain,
            utxo_set,
            auth,
            index_lock: Mutex::new(()),
        }
    }

    /// Creates a chain whose genesis reward goes to `address`.
    pub fn create_chain(config: &LedgerConfig, address: &str) -> Result<Ledger> {
        Self::create_chain_with_auth(config, address, Arc::new(PlaintextUnlock))
    }

    pub fn create_chain_with_auth(
        config: &LedgerConfig,
        address: &str,
        auth: Arc<dyn AuthorizationCheck>,
    ) -> Result<Ledger> {
        let blockchain = Blockchain::create_blockchain(config, address)?;
        let ledger = Self::from_blockchain(blockchain, auth);
        ledger.utxo_set.reindex()?;
        Ok(ledger)
    }

    /// Opens an existing chain, rebuilding the UTXO index if it lags the tip.
    pub fn open(config: &LedgerConfig) -> Result<Ledger> {
        Self::open_with_auth(config, Arc::new(PlaintextUnlock))
    }

    pub fn open_with_auth(
        config: &LedgerConfig,
        auth: Arc<dyn AuthorizationCheck>,
    ) -> Result<Ledger> {
        let blockchain = Blockchain::open_blockchain(config)?;
        let ledger = Self::from_blockchain(blockchain, auth);
        if !ledger.utxo_set.is_current()? {
            warn!("UTXO index is behind the chain tip, reindexing");
            ledger.utxo_set.reindex()?;
        }
        Ok(ledger)
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn utxo_set(&self) -> &UTXOSet {
        &self.utxo_set
    }

    fn view(&self) -> UtxoView<'_> {
        UtxoView::new(&self.blockchain, self.auth.as_ref())
    }

    /// Moves `amount` from `from` to `to` in a newly mined block.
    ///
    /// Spend selection runs under the chain's writer lock against the tip the
    /// new block will extend.
    pub fn append_transfer(&self, from: &str, to: &str, amount: u64) -> Result<Block> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let auth = self.auth.as_ref();
        self.append_indexed(|chain| {
            let view = UtxoView::new(chain, auth);
            let (accumulated, selection) = view.find_spendable_outputs(from, amount)?;
            if accumulated < amount {
                return Err(LedgerError::InsufficientFunds {
                    required: amount,
                    available: accumulated,
                });
            }
            let tx = Transaction::new_spend(from, to, amount, accumulated, &selection)?;
            info!("Transfer of {amount} from {from} to {to} spends {} inputs", tx.get_vin().len());
            Ok(vec![tx])
        })
    }

    /// Mines a block holding only a fresh coinbase that pays `address`.
    pub fn mine_reward(&self, address: &str) -> Result<Block> {
        let coinbase_tx = Transaction::new_coinbase_tx(address, "")?;
        self.append_indexed(|_| Ok(vec![coinbase_tx]))
    }

    fn append_indexed<F>(&self, build: F) -> Result<Block>
    where
        F: FnOnce(&Blockchain) -> Result<Vec<Transaction>>,
    {
        let _index = self
            .index_lock
            .lock()
            .map_err(|_| LedgerError::StoreIo("Index lock poisoned".to_string()))?;
        let block = self.blockchain.append_with(build)?;
        // the block is committed from here on; index trouble must not fail the append
        if let Err(e) = self.utxo_set.update(&block) {
            warn!("UTXO index update failed ({e}), reindexing");
            if let Err(e) = self.utxo_set.reindex() {
                error!("UTXO reindex failed, index left stale: {e}");
            }
        }
        Ok(block)
    }

    /// Spendable balance derived by replaying the chain
    pub fn balance_of(&self, address: &str) -> Result<u64> {
        self.view().get_balance(address)
    }

    /// Spendable balance answered from the maintained UTXO index
    pub fn indexed_balance_of(&self, address: &str) -> Result<u64> {
        self.utxo_set.get_balance(address)
    }

    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        self.view().find_unspent_transactions(address)
    }

    /// Rebuilds the UTXO index and returns how many transactions it holds.
    pub fn reindex(&self) -> Result<u64> {
        let _index = self
            .index_lock
            .lock()
            .map_err(|_| LedgerError::StoreIo("Index lock poisoned".to_string()))?;
        self.utxo_set.reindex()?;
        self.utxo_set.count_transactions()
    }

    pub fn chain_length(&self) -> Result<usize> {
        Ok(self.blockchain.get_best_height()? + 1)
    }

    pub fn dump_chain(&self) -> Result<Vec<BlockSummary>> {
        self.blockchain
            .iterator()?
            .map(|block| block.map(|b| BlockSummary::from(&b)))
            .collect()
    }
}
