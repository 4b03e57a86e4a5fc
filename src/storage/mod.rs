//! Derived state kept alongside the chain
//!
//! The chain itself is the source of truth; the UTXO index here can always be
//! rebuilt from it.

pub mod utxo_set;

pub use utxo_set::{IndexedOutput, UTXOSet};
