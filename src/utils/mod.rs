//! Utility functions and helpers
//!
//! Hashing, timestamps and the binary encoding shared by every persisted record.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest};

pub use serialization::{deserialize, serialize};
