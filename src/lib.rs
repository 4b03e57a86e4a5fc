//! # Pow Ledger
//!
//! An append-only, hash-linked ledger secured by proof-of-work, with balances
//! derived from unspent transaction outputs rather than stored.
//!
//! ## How the code is organized
//! - `core/`: transactions, blocks, mining, the sled-backed chain, UTXO replay
//!   and the [`Ledger`] command surface
//! - `storage/`: the maintained UTXO index
//! - `config/`: where the store lives and how loudly to log
//! - `utils/`: SHA-256, timestamps and binary encoding
//! - `cli/`: command-line definitions for the `pow-ledger` binary
//!
//! ## Flow of a transfer
//! 1. [`UtxoView::find_spendable_outputs`] picks inputs covering the amount
//! 2. [`Transaction::new_spend`] builds the transfer with its change output
//! 3. [`Block::new_block`] packages and mines it
//! 4. [`Blockchain::append_with`] persists the block and advances the tip
//!
//! Spend authorization is a placeholder string comparison
//! ([`PlaintextUnlock`]) and is not secure.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::LedgerConfig;
pub use core::{
    AuthorizationCheck, Block, BlockSummary, Blockchain, BlockchainIterator, Ledger,
    PlaintextUnlock, ProofOfWork, SelectedOutputs, TXInput, TXOutput, Transaction, UtxoView,
    SUBSIDY, TARGET_BITS,
};
pub use error::{LedgerError, Result};
pub use storage::{IndexedOutput, UTXOSet};
pub use utils::{current_timestamp, sha256_digest};
