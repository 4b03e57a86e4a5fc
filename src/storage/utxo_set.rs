use crate::core::{AuthorizationCheck, Block, Blockchain, TXOutput};
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use data_encoding::HEXLOWER;
use log::{debug, info};
use sled::transaction::ConflictableTransactionError;
use sled::Tree;
use std::collections::HashMap;
use std::sync::Arc;

const UTXO_TREE: &str = "chainstate";
const UTXO_META_TREE: &str = "chainstate_meta";
const INDEXED_TIP_KEY: &str = "indexed_tip";

/// An unspent output together with its position in the owning transaction
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct IndexedOutput {
    pub index: u64,
    pub output: TXOutput,
}

/// Maintained UTXO index: ( K -> txid, V -> `Vec<IndexedOutput>` still unspent ).
///
/// Kept in step with the chain by [`UTXOSet::update`] after each append, and
/// rebuilt from a full replay by [`UTXOSet::reindex`].
pub struct UTXOSet {
    blockchain: Blockchain,
    auth: Arc<dyn AuthorizationCheck>,
}

impl UTXOSet {
    pub fn new(blockchain: Blockchain, auth: Arc<dyn AuthorizationCheck>) -> UTXOSet {
        UTXOSet { blockchain, auth }
    }

    fn utxo_tree(&self) -> Result<Tree> {
        self.blockchain
            .get_db()
            .open_tree(UTXO_TREE)
            .map_err(|e| LedgerError::StoreIo(format!("Failed to open UTXO tree: {e}")))
    }

    fn meta_tree(&self) -> Result<Tree> {
        self.blockchain
            .get_db()
            .open_tree(UTXO_META_TREE)
            .map_err(|e| LedgerError::StoreIo(format!("Failed to open UTXO meta tree: {e}")))
    }

    fn for_each_entry<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], Vec<IndexedOutput>) -> bool,
    {
        for item in self.utxo_tree()?.iter() {
            let (k, v) = item?;
            let outs: Vec<IndexedOutput> = deserialize(v.as_ref())?;
            if !visit(k.as_ref(), outs) {
                break;
            }
        }
        Ok(())
    }

    pub fn find_utxo(&self, address: &str) -> Result<Vec<TXOutput>> {
        let mut utxos = vec![];
        self.for_each_entry(|_, outs| {
            utxos.extend(
                outs.into_iter()
                    .map(|out| out.output)
                    .filter(|out| self.auth.output_claimable_by(out, address)),
            );
            true
        })?;
        Ok(utxos)
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        Ok(self.find_utxo(address)?.iter().map(TXOutput::get_value).sum())
    }

    /// Number of transactions with at least one unspent output
    pub fn count_transactions(&self) -> Result<u64> {
        let mut counter = 0;
        for item in self.utxo_tree()?.iter() {
            item?;
            counter += 1;
        }
        Ok(counter)
    }

    /// Whether the index reflects the current chain tip
    pub fn is_current(&self) -> Result<bool> {
        let indexed_tip = self.meta_tree()?.get(INDEXED_TIP_KEY)?;
        Ok(indexed_tip.as_deref() == Some(self.blockchain.get_tip_hash()?.as_slice()))
    }

    /// Drops the freshness marker, then empties the index.
    ///
    /// The marker goes first so an index left empty by an interrupted rebuild
    /// is never reported current.
    pub(crate) fn invalidate(&self) -> Result<Tree> {
        self.meta_tree()?.remove(INDEXED_TIP_KEY)?;
        self.blockchain.get_db().flush()?;
        let utxo_tree = self.utxo_tree()?;
        utxo_tree.clear()?;
        Ok(utxo_tree)
    }

    /// Rebuilds the index from a full replay of the chain.
    pub fn reindex(&self) -> Result<()> {
        let tip = self.blockchain.get_tip_hash()?;
        let utxo_tree = self.invalidate()?;

        let mut utxo: Vec<(Vec<u8>, Vec<IndexedOutput>)> = vec![];
        let mut spent_txos: HashMap<Vec<u8>, Vec<i64>> = HashMap::new();

        for block in self.blockchain.iterator()? {
            let block = block?;
            for tx in block.get_transactions() {
                let spent = spent_txos.get(tx.get_id());
                let outs: Vec<IndexedOutput> = tx
                    .get_vout()
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| {
                        !spent.is_some_and(|s| s.contains(&(*idx as i64)))
                    })
                    .map(|(idx, out)| IndexedOutput {
                        index: idx as u64,
                        output: out.clone(),
                    })
                    .collect();
                if !outs.is_empty() {
                    utxo.push((tx.get_id().to_vec(), outs));
                }

                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    spent_txos
                        .entry(txin.get_txid().to_vec())
                        .or_default()
                        .push(txin.get_vout());
                }
            }
        }

        let mut batch = sled::Batch::default();
        for (txid, outs) in &utxo {
            batch.insert(txid.as_slice(), serialize(outs)?);
        }
        utxo_tree.apply_batch(batch)?;
        self.meta_tree()?.insert(INDEXED_TIP_KEY, tip.as_slice())?;
        self.blockchain.get_db().flush()?;

        info!("Reindexed UTXO set: {} transactions", utxo.len());
        Ok(())
    }

    /// Applies one newly appended block: removes the outputs its inputs spend
    /// and adds its own outputs.
    pub fn update(&self, block: &Block) -> Result<()> {
        self.utxo_tree()?.transaction(|tx_db| {
            for tx in block.get_transactions() {
                if !tx.is_coinbase() {
                    for vin in tx.get_vin() {
                        let outs_bytes = tx_db.get(vin.get_txid())?.ok_or_else(|| {
                            ConflictableTransactionError::Abort(LedgerError::NotFound(format!(
                                "UTXO {}:{} not in index",
                                HEXLOWER.encode(vin.get_txid()),
                                vin.get_vout()
                            )))
                        })?;
                        let outs: Vec<IndexedOutput> = deserialize(outs_bytes.as_ref())
                            .map_err(ConflictableTransactionError::Abort)?;

                        let spent_index = u64::try_from(vin.get_vout()).ok();
                        let updated_outs: Vec<IndexedOutput> = outs
                            .into_iter()
                            .filter(|out| Some(out.index) != spent_index)
                            .collect();

                        if updated_outs.is_empty() {
                            tx_db.remove(vin.get_txid())?;
                        } else {
                            let bytes = serialize(&updated_outs)
                                .map_err(ConflictableTransactionError::Abort)?;
                            tx_db.insert(vin.get_txid(), bytes)?;
                        }
                    }
                }

                let new_outputs: Vec<IndexedOutput> = tx
                    .get_vout()
                    .iter()
                    .enumerate()
                    .map(|(idx, out)| IndexedOutput {
                        index: idx as u64,
                        output: out.clone(),
                    })
                    .collect();
                let bytes = serialize(&new_outputs).map_err(ConflictableTransactionError::Abort)?;
                tx_db.insert(tx.get_id(), bytes)?;
            }
            Ok(())
        })?;
        self.meta_tree()?.insert(INDEXED_TIP_KEY, block.get_hash())?;
        self.blockchain.get_db().flush()?;

        debug!("UTXO index advanced to {}", block.get_hash_hex());
        Ok(())
    }
}
