//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`Result`], whose error side
//! is [`LedgerError`].

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error kinds surfaced by the ledger engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A chain is already initialized in the backing store
    AlreadyExists(String),
    /// No chain (or no requested record) exists in the backing store
    NotFound(String),
    /// Spend amount exceeds the derivable balance
    InsufficientFunds { required: u64, available: u64 },
    /// A stored block failed to decode or failed hash/proof-of-work checks
    CorruptBlock(String),
    /// The underlying storage transaction failed
    StoreIo(String),
    /// Encoding a record failed
    Serialization(String),
    /// A transfer amount that cannot be spent
    InvalidAmount(u64),
    /// Proof-of-work could not find a nonce
    Mining(String),
    /// Configuration could not be loaded
    Config(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::AlreadyExists(msg) => write!(f, "Already exists: {msg}"),
            LedgerError::NotFound(msg) => write!(f, "Not found: {msg}"),
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::CorruptBlock(msg) => write!(f, "Corrupt block: {msg}"),
            LedgerError::StoreIo(msg) => write!(f, "Store error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::InvalidAmount(amount) => write!(f, "Invalid amount: {amount}"),
            LedgerError::Mining(msg) => write!(f, "Mining error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::StoreIo(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<LedgerError>> for LedgerError {
    fn from(err: sled::transaction::TransactionError<LedgerError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => e.into(),
        }
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::CorruptBlock(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
