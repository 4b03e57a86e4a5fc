// The ledger store: blocks live in a sled tree keyed by their hash, and one
// sentinel key points at the tip. Following pre_block_hash from the tip always
// ends at the genesis block.

use crate::config::LedgerConfig;
use crate::core::{Block, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use data_encoding::HEXLOWER;
use log::{error, info};
use sled::transaction::ConflictableTransactionError;
use sled::{Db, Tree};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

const TIP_BLOCK_HASH_KEY: &str = "tip_block_hash";
const BLOCKS_TREE: &str = "blocks";

/// Memo carried by the genesis coinbase input
pub const GENESIS_COINBASE_DATA: &str = "Genesis reward";

#[derive(Clone)]
pub struct Blockchain {
    tip_hash: Arc<RwLock<Vec<u8>>>,
    // held across read-tip/mine/persist/advance-tip
    write_lock: Arc<Mutex<()>>,
    db: Db,
    blocks: Tree,
    db_path: PathBuf,
}

impl Blockchain {
    /// Initializes a new chain whose genesis coinbase pays `genesis_address`.
    pub fn create_blockchain(config: &LedgerConfig, genesis_address: &str) -> Result<Blockchain> {
        let path = config.db_path.clone();
        let db = sled::open(&path)
            .map_err(|e| LedgerError::StoreIo(format!("Failed to open database: {e}")))?;
        let blocks = Self::open_blocks_tree(&db)?;

        if blocks.get(TIP_BLOCK_HASH_KEY)?.is_some() {
            return Err(Self::already_exists(&path));
        }

        info!("Creating genesis block for address: {genesis_address}");
        let coinbase_tx = Transaction::new_coinbase_tx(genesis_address, GENESIS_COINBASE_DATA)?;
        let genesis = Block::generate_genesis_block(&coinbase_tx)?;
        let block_data = genesis.serialize()?;

        blocks.transaction(|tx_db| {
            if tx_db.get(TIP_BLOCK_HASH_KEY)?.is_some() {
                return Err(ConflictableTransactionError::Abort(Self::already_exists(
                    &path,
                )));
            }
            tx_db.insert(genesis.get_hash(), block_data.as_slice())?;
            tx_db.insert(TIP_BLOCK_HASH_KEY, genesis.get_hash())?;
            Ok(())
        })?;
        db.flush()?;

        Ok(Blockchain {
            tip_hash: Arc::new(RwLock::new(genesis.get_hash().to_vec())),
            write_lock: Arc::new(Mutex::new(())),
            db,
            blocks,
            db_path: path,
        })
    }

    /// Opens an existing chain and loads its tip.
    pub fn open_blockchain(config: &LedgerConfig) -> Result<Blockchain> {
        let path = config.db_path.clone();
        if !path.exists() {
            return Err(Self::not_found(&path));
        }
        let db = sled::open(&path)
            .map_err(|e| LedgerError::StoreIo(format!("Failed to open database: {e}")))?;
        let blocks = Self::open_blocks_tree(&db)?;

        let tip_hash = blocks
            .get(TIP_BLOCK_HASH_KEY)?
            .ok_or_else(|| Self::not_found(&path))?
            .to_vec();

        Ok(Blockchain {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            write_lock: Arc::new(Mutex::new(())),
            db,
            blocks,
            db_path: path,
        })
    }

    fn open_blocks_tree(db: &Db) -> Result<Tree> {
        db.open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::StoreIo(format!("Failed to open blocks tree: {e}")))
    }

    fn already_exists(path: &Path) -> LedgerError {
        LedgerError::AlreadyExists(format!("Blockchain already exists at {}", path.display()))
    }

    fn not_found(path: &Path) -> LedgerError {
        LedgerError::NotFound(format!(
            "No existing blockchain found at {}. Create one first.",
            path.display()
        ))
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn get_tip_hash(&self) -> Result<Vec<u8>> {
        self.tip_hash
            .read()
            .map(|tip| tip.clone())
            .map_err(|_| LedgerError::StoreIo("Tip lock poisoned".to_string()))
    }

    fn set_tip_hash(&self, new_tip_hash: &[u8]) -> Result<()> {
        let mut tip_hash = self
            .tip_hash
            .write()
            .map_err(|_| LedgerError::StoreIo("Tip lock poisoned".to_string()))?;
        *tip_hash = new_tip_hash.to_vec();
        Ok(())
    }

    /// Mines `transactions` into a new block on top of the tip and advances the tip.
    pub fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        self.append_with(|_| Ok(transactions.to_vec()))
    }

    /// Like [`Blockchain::mine_block`], but the transactions are produced by
    /// `build` while the writer lock is held, so anything `build` derives from
    /// the chain (such as spend selection) cannot be invalidated by a
    /// concurrent append.
    pub fn append_with<F>(&self, build: F) -> Result<Block>
    where
        F: FnOnce(&Blockchain) -> Result<Vec<Transaction>>,
    {
        let _writer = self
            .write_lock
            .lock()
            .map_err(|_| LedgerError::StoreIo("Writer lock poisoned".to_string()))?;

        let transactions = build(self)?;
        let tip = self
            .blocks
            .get(TIP_BLOCK_HASH_KEY)?
            .ok_or_else(|| Self::not_found(&self.db_path))?
            .to_vec();

        let block = Block::new_block(&transactions, &tip)?;
        let block_data = block.serialize()?;

        self.blocks.transaction(|tx_db| {
            let current = tx_db.get(TIP_BLOCK_HASH_KEY)?;
            if current.as_deref() != Some(tip.as_slice()) {
                return Err(ConflictableTransactionError::Abort(LedgerError::StoreIo(
                    "Tip moved during append".to_string(),
                )));
            }
            tx_db.insert(block.get_hash(), block_data.as_slice())?;
            tx_db.insert(TIP_BLOCK_HASH_KEY, block.get_hash())?;
            Ok(())
        })?;
        self.db.flush()?;
        self.set_tip_hash(block.get_hash())?;

        info!(
            "Appended block {} on top of {}",
            block.get_hash_hex(),
            HEXLOWER.encode(&tip)
        );
        Ok(block)
    }

    /// Fresh tip-to-genesis cursor starting at the current tip.
    pub fn iterator(&self) -> Result<BlockchainIterator> {
        Ok(BlockchainIterator::new(
            self.get_tip_hash()?,
            self.blocks.clone(),
        ))
    }

    /// Loads and verifies the block stored under `block_hash`.
    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        match self.blocks.get(block_hash)? {
            Some(bytes) => load_verified(block_hash, bytes.as_ref()).map(Some),
            None => Ok(None),
        }
    }

    /// Height of the tip, genesis being 0
    pub fn get_best_height(&self) -> Result<usize> {
        let mut height: usize = 0;
        for block in self.iterator()? {
            block?;
            height += 1;
        }
        Ok(height.saturating_sub(1))
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        for block in self.iterator()? {
            if let Some(tx) = block?
                .get_transactions()
                .iter()
                .find(|tx| tx.get_id() == txid)
            {
                return Ok(Some(tx.clone()));
            }
        }
        Ok(None)
    }
}

fn load_verified(key: &[u8], bytes: &[u8]) -> Result<Block> {
    let key_hex = HEXLOWER.encode(key);
    let block = Block::deserialize(bytes)
        .map_err(|e| LedgerError::CorruptBlock(format!("Block {key_hex}: {e}")))?;

    if block.get_hash() != key {
        return Err(LedgerError::CorruptBlock(format!(
            "Block stored under {key_hex} has hash {}",
            block.get_hash_hex()
        )));
    }
    if !ProofOfWork::validate(&block) {
        return Err(LedgerError::CorruptBlock(format!(
            "Block {key_hex} fails proof-of-work"
        )));
    }
    for tx in block.get_transactions() {
        if !tx.verify_id()? {
            return Err(LedgerError::CorruptBlock(format!(
                "Block {key_hex} holds transaction {} whose id does not match its content",
                HEXLOWER.encode(tx.get_id())
            )));
        }
    }
    Ok(block)
}

/// Walks from a captured tip back to genesis, one stored block per step.
///
/// Yields an error and then stops if a block is missing, undecodable or fails
/// verification.
pub struct BlockchainIterator {
    blocks: Tree,
    current_hash: Option<Vec<u8>>,
}

impl BlockchainIterator {
    fn new(tip_hash: Vec<u8>, blocks: Tree) -> BlockchainIterator {
        BlockchainIterator {
            blocks,
            current_hash: Some(tip_hash),
        }
    }

    fn load(&self, hash: &[u8]) -> Result<Block> {
        let data = self.blocks.get(hash)?.ok_or_else(|| {
            LedgerError::CorruptBlock(format!("Missing block {}", HEXLOWER.encode(hash)))
        })?;
        load_verified(hash, data.as_ref())
    }
}

impl Iterator for BlockchainIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current_hash.take()?;
        match self.load(&current) {
            Ok(block) => {
                if !block.is_genesis() {
                    self.current_hash = Some(block.get_pre_block_hash().to_vec());
                }
                Some(Ok(block))
            }
            Err(e) => {
                error!("Chain traversal stopped: {e}");
                Some(Err(e))
            }
        }
    }
}
