//! Core ledger functionality
//!
//! Transactions, blocks, proof-of-work, the persistent chain and the
//! UTXO derivation that turns the chain into balances.

pub mod auth;
pub mod block;
pub mod blockchain;
pub mod ledger;
pub mod proof_of_work;
pub mod transaction;
pub mod utxo;

pub use auth::{AuthorizationCheck, PlaintextUnlock};
pub use block::Block;
pub use blockchain::{Blockchain, BlockchainIterator, GENESIS_COINBASE_DATA};
pub use ledger::{BlockSummary, Ledger};
pub use proof_of_work::{ProofOfWork, TARGET_BITS};
pub use transaction::{SelectedOutputs, TXInput, TXOutput, Transaction, COINBASE_VOUT, SUBSIDY};
pub use utxo::UtxoView;
