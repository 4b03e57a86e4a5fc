//! Configuration management
//!
//! The store location and log level are carried in an explicit
//! [`LedgerConfig`] value handed to every store constructor.

pub mod settings;

pub use settings::LedgerConfig;
