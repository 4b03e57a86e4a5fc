//! Command-line interface
//!
//! Argument definitions for the `pow-ledger` binary.

pub mod commands;

pub use commands::{Command, Opt};
