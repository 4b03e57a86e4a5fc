// Every persisted record goes through bincode 2.0 with the standard configuration
use crate::error::{LedgerError, Result};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration.
///
/// Input must be consumed exactly; trailing bytes are treated as corruption.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, consumed) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::CorruptBlock(format!("Deserialization failed: {e}")))?;
    if consumed != bytes.len() {
        return Err(LedgerError::CorruptBlock(format!(
            "{} trailing bytes after record",
            bytes.len() - consumed
        )));
    }
    Ok(data)
}
