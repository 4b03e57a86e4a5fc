// Balances are never stored: every query replays the chain from tip to genesis.
// Spends seen in newer transactions are recorded before older outputs are
// evaluated, so the traversal order is what makes the result correct.

use crate::core::{AuthorizationCheck, Blockchain, SelectedOutputs, TXOutput, Transaction};
use crate::error::Result;
use log::debug;
use std::collections::HashMap;

pub struct UtxoView<'a> {
    blockchain: &'a Blockchain,
    auth: &'a dyn AuthorizationCheck,
}

impl<'a> UtxoView<'a> {
    pub fn new(blockchain: &'a Blockchain, auth: &'a dyn AuthorizationCheck) -> UtxoView<'a> {
        UtxoView { blockchain, auth }
    }

    /// Transactions holding at least one unspent output claimable by `address`,
    /// newest first, each listed once.
    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .find_unspent_outputs(address)?
            .into_iter()
            .map(|(tx, _)| tx)
            .collect())
    }

    /// Each unspent transaction paired with its unspent output indices (ascending)
    fn find_unspent_outputs(&self, address: &str) -> Result<Vec<(Transaction, Vec<usize>)>> {
        let mut unspent = vec![];
        // ( K -> txid, V -> output indices spent by `address` )
        let mut spent_txos: HashMap<Vec<u8>, Vec<i64>> = HashMap::new();

        for block in self.blockchain.iterator()? {
            let block = block?;
            for tx in block.get_transactions() {
                let spent = spent_txos.get(tx.get_id());
                let indices: Vec<usize> = tx
                    .get_vout()
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| {
                        !spent.is_some_and(|outs| {
                            i64::try_from(*idx).is_ok_and(|idx| outs.contains(&idx))
                        })
                    })
                    .filter(|(_, out)| self.auth.output_claimable_by(out, address))
                    .map(|(idx, _)| idx)
                    .collect();
                if !indices.is_empty() {
                    unspent.push((tx.clone(), indices));
                }

                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    if self.auth.input_claims(txin, address) {
                        spent_txos
                            .entry(txin.get_txid().to_vec())
                            .or_default()
                            .push(txin.get_vout());
                    }
                }
            }
        }
        Ok(unspent)
    }

    /// Every unspent output claimable by `address`
    pub fn find_utxo(&self, address: &str) -> Result<Vec<TXOutput>> {
        let mut utxos = vec![];
        for (tx, indices) in self.find_unspent_outputs(address)? {
            for idx in indices {
                utxos.push(tx.get_vout()[idx].clone());
            }
        }
        Ok(utxos)
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        Ok(self.find_utxo(address)?.iter().map(TXOutput::get_value).sum())
    }

    /// Greedily gathers unspent outputs of `address` until `amount` is covered.
    ///
    /// Returns whatever was gathered even when it falls short; the caller
    /// decides whether that is enough.
    pub fn find_spendable_outputs(
        &self,
        address: &str,
        amount: u64,
    ) -> Result<(u64, Vec<SelectedOutputs>)> {
        let mut selection: Vec<SelectedOutputs> = vec![];
        let mut accumulated = 0u64;

        'work: for (tx, indices) in self.find_unspent_outputs(address)? {
            for idx in indices {
                if accumulated >= amount {
                    break 'work;
                }
                accumulated += tx.get_vout()[idx].get_value();
                match selection.last_mut() {
                    Some(last) if last.txid == tx.get_id() => last.indices.push(idx),
                    _ => selection.push(SelectedOutputs {
                        txid: tx.get_id().to_vec(),
                        indices: vec![idx],
                    }),
                }
            }
        }

        debug!(
            "Selected {} outputs worth {accumulated} for {address} (wanted {amount})",
            selection.iter().map(|s| s.indices.len()).sum::<usize>()
        );
        Ok((accumulated, selection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlaintextUnlock, SUBSIDY};
    use crate::testnet::{create_test_blockchain, transfer, TEST_ADDRESS};

    #[test]
    fn test_genesis_balance() {
        let (blockchain, _temp_dir) = create_test_blockchain().unwrap();
        let view = UtxoView::new(&blockchain, &PlaintextUnlock);

        assert_eq!(view.get_balance(TEST_ADDRESS).unwrap(), SUBSIDY);
        assert_eq!(view.get_balance("nobody").unwrap(), 0);
        assert_eq!(view.find_unspent_transactions(TEST_ADDRESS).unwrap().len(), 1);
    }

    #[test]
    fn test_spent_output_is_excluded() {
        let (blockchain, _temp_dir) = create_test_blockchain().unwrap();
        transfer(&blockchain, TEST_ADDRESS, "bob", 4).unwrap();
        let view = UtxoView::new(&blockchain, &PlaintextUnlock);

        let alice = view.find_utxo(TEST_ADDRESS).unwrap();
        assert_eq!(alice, vec![TXOutput::new(6, TEST_ADDRESS)]);
        assert_eq!(view.find_utxo("bob").unwrap(), vec![TXOutput::new(4, "bob")]);

        // genesis coinbase is fully spent, only the transfer remains for alice
        let unspent = view.find_unspent_transactions(TEST_ADDRESS).unwrap();
        assert_eq!(unspent.len(), 1);
        assert!(!unspent[0].is_coinbase());
    }

    #[test]
    fn test_transaction_with_two_claimable_outputs_listed_once() {
        let (blockchain, _temp_dir) = create_test_blockchain().unwrap();
        // self-transfer: both the payment and the change go back to the payer
        transfer(&blockchain, TEST_ADDRESS, TEST_ADDRESS, 3).unwrap();
        let view = UtxoView::new(&blockchain, &PlaintextUnlock);

        assert_eq!(view.find_unspent_transactions(TEST_ADDRESS).unwrap().len(), 1);
        assert_eq!(view.find_utxo(TEST_ADDRESS).unwrap().len(), 2);
        assert_eq!(view.get_balance(TEST_ADDRESS).unwrap(), SUBSIDY);

        // spending one of the two leaves the other
        transfer(&blockchain, TEST_ADDRESS, "bob", 3).unwrap();
        assert_eq!(view.get_balance(TEST_ADDRESS).unwrap(), SUBSIDY - 3);
        assert_eq!(view.get_balance("bob").unwrap(), 3);
    }

    #[test]
    fn test_spendable_selection_is_ordered_and_short_circuits() {
        let (blockchain, _temp_dir) = create_test_blockchain().unwrap();
        let newer = blockchain
            .mine_block(&[Transaction::new_coinbase_tx(TEST_ADDRESS, "").unwrap()])
            .unwrap();
        let view = UtxoView::new(&blockchain, &PlaintextUnlock);

        let (accumulated, selection) = view.find_spendable_outputs(TEST_ADDRESS, 5).unwrap();
        assert_eq!(accumulated, SUBSIDY);
        assert_eq!(
            selection,
            vec![SelectedOutputs {
                txid: newer.get_transactions()[0].get_id().to_vec(),
                indices: vec![0],
            }]
        );

        let (accumulated, selection) = view.find_spendable_outputs(TEST_ADDRESS, 15).unwrap();
        assert_eq!(accumulated, 2 * SUBSIDY);
        assert_eq!(selection.len(), 2);
        assert_eq!(selection[0].txid, newer.get_transactions()[0].get_id());
    }

    #[test]
    fn test_spendable_returns_shortfall() {
        let (blockchain, _temp_dir) = create_test_blockchain().unwrap();
        let view = UtxoView::new(&blockchain, &PlaintextUnlock);

        let (accumulated, selection) = view.find_spendable_outputs(TEST_ADDRESS, 100).unwrap();
        assert_eq!(accumulated, SUBSIDY);
        assert_eq!(selection.len(), 1);

        let (accumulated, selection) = view.find_spendable_outputs("nobody", 1).unwrap();
        assert_eq!(accumulated, 0);
        assert!(selection.is_empty());
    }

    struct DenyAll;

    impl AuthorizationCheck for DenyAll {
        fn output_claimable_by(&self, _output: &TXOutput, _address: &str) -> bool {
            false
        }

        fn input_claims(&self, _input: &crate::core::TXInput, _address: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_authorization_is_pluggable() {
        let (blockchain, _temp_dir) = create_test_blockchain().unwrap();
        let view = UtxoView::new(&blockchain, &DenyAll);
        assert_eq!(view.get_balance(TEST_ADDRESS).unwrap(), 0);
    }
}
