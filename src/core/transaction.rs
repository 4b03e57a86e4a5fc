// Transactions move value by consuming earlier outputs and creating new ones.
// A transaction's id is the SHA-256 of its own encoding with the id left empty.

use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize, sha256_digest};
use uuid::Uuid;

/// Reward paid by every coinbase transaction
pub const SUBSIDY: u64 = 10;

/// Output index carried by the placeholder input of a coinbase transaction
pub const COINBASE_VOUT: i64 = -1;

/// References output `vout` of transaction `txid`, claimed by `unlock`
#[derive(Debug, Clone, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: i64,
    unlock: String,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: i64, unlock: &str) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            unlock: unlock.to_string(),
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_unlock(&self) -> &str {
        self.unlock.as_str()
    }

    /// Placeholder authorization: any unlock string equal to `unlocking_data` claims the output.
    pub fn can_unlock_output_with(&self, unlocking_data: &str) -> bool {
        self.unlock == unlocking_data
    }
}

/// `value` paid to whoever presents `lock`
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    lock: String,
}

impl TXOutput {
    pub fn new(value: u64, address: &str) -> TXOutput {
        TXOutput {
            value,
            lock: address.to_string(),
        }
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_lock(&self) -> &str {
        self.lock.as_str()
    }

    pub fn is_locked_with(&self, unlocking_data: &str) -> bool {
        self.lock == unlocking_data
    }
}

/// Output indices chosen from one earlier transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedOutputs {
    pub txid: Vec<u8>,
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Builds the reward transaction paying [`SUBSIDY`] to `to`.
    ///
    /// An empty `memo` is replaced by a generated one naming the recipient; the
    /// generated memo carries a random UUID so repeated rewards get distinct ids.
    pub fn new_coinbase_tx(to: &str, memo: &str) -> Result<Transaction> {
        let memo = if memo.is_empty() {
            format!("Reward to '{to}' ({})", Uuid::new_v4())
        } else {
            memo.to_string()
        };

        let txin = TXInput::new(&[], COINBASE_VOUT, &memo);
        let txout = TXOutput::new(SUBSIDY, to);
        Self::with_id(vec![txin], vec![txout])
    }

    /// Builds a transfer of `amount` from `payer` to `payee` spending `selection`,
    /// whose outputs sum to `accumulated`. Any surplus is returned to `payer`.
    pub fn new_spend(
        payer: &str,
        payee: &str,
        amount: u64,
        accumulated: u64,
        selection: &[SelectedOutputs],
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for selected in selection {
            for &idx in &selected.indices {
                let vout = i64::try_from(idx).map_err(|_| {
                    LedgerError::Serialization(format!("Output index {idx} out of range"))
                })?;
                inputs.push(TXInput::new(&selected.txid, vout, payer));
            }
        }

        let mut outputs = vec![TXOutput::new(amount, payee)];
        if accumulated > amount {
            outputs.push(TXOutput::new(accumulated - amount, payer));
        }

        Self::with_id(inputs, outputs)
    }

    fn with_id(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == COINBASE_VOUT
    }

    /// Content hash with the id field emptied
    pub fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    /// Whether the stored id still matches the transaction's content
    pub fn verify_id(&self) -> Result<bool> {
        Ok(self.hash()? == self.id)
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn output_value(&self) -> u64 {
        self.vout.iter().map(TXOutput::get_value).sum()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}
