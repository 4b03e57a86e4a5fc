use crate::core::{ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use log::info;

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    transactions: Vec<Transaction>,
    pre_block_hash: Vec<u8>, // empty only for genesis
    hash: Vec<u8>,
    nonce: i64,
}

impl Block {
    /// Stamps, mines and returns a block on top of `pre_block_hash`.
    ///
    /// Blocks the calling thread until proof-of-work succeeds.
    pub fn new_block(transactions: &[Transaction], pre_block_hash: &[u8]) -> Result<Block> {
        let mut block = Block {
            timestamp: current_timestamp()?,
            transactions: transactions.to_vec(),
            pre_block_hash: pre_block_hash.to_vec(),
            hash: vec![],
            nonce: 0,
        };

        let (nonce, hash) = ProofOfWork::new_proof_of_work(&block)
            .run()
            .ok_or_else(|| LedgerError::Mining("Nonce space exhausted".to_string()))?;
        block.nonce = nonce;
        block.hash = hash;
        info!(
            "Mined block {} with {} transactions",
            block.get_hash_hex(),
            block.transactions.len()
        );

        Ok(block)
    }

    pub fn generate_genesis_block(transaction: &Transaction) -> Result<Block> {
        Block::new_block(std::slice::from_ref(transaction), &[])
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(self.hash.as_slice())
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    /// SHA-256 over the concatenated transaction ids, in block order
    pub fn hash_transactions(&self) -> Vec<u8> {
        let mut txhashs = vec![];
        for transaction in &self.transactions {
            txhashs.extend(transaction.get_id());
        }

        sha256_digest(txhashs.as_slice())
    }

    #[cfg(test)]
    pub(crate) fn tamper_hash_byte(&mut self, idx: usize) {
        self.hash[idx] ^= 0x01;
    }

    #[cfg(test)]
    pub(crate) fn tamper_nonce(&mut self, nonce: i64) {
        self.nonce = nonce;
    }
}
