//! Error types for readthru

use thiserror::Error;

/// Boxed error returned by record producers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for readthru
#[derive(Error, Debug)]
pub enum ReadThruError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Producer failed: {0}")]
    Producer(#[source] BoxError),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReadThruError {
    /// Returns true if the store could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Errors reported by a store that was reached
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rust_rocksdb::Error),

    #[error("Value decoding error: {0}")]
    Decoding(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Memcached reply parsing and key validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key too long (max 250 bytes)")]
    KeyTooLong,

    #[error("Invalid reply: {0}")]
    InvalidReply(String),

    #[error("Invalid bytes length")]
    InvalidBytesLength,

    #[error("Unexpected data")]
    UnexpectedData,

    #[error("Value of {size} bytes exceeds the {max} byte limit")]
    ValueTooLarge { size: usize, max: usize },

    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },
}

pub type Result<T> = std::result::Result<T, ReadThruError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(ReadThruError::StoreUnavailable("refused".into()).is_unavailable());
        assert!(!ReadThruError::Storage(StorageError::Server("busy".into())).is_unavailable());
    }

    #[test]
    fn test_producer_error_keeps_source() {
        let inner: BoxError = "catalog offline".into();
        let err = ReadThruError::Producer(inner);
        assert_eq!(err.to_string(), "Producer failed: catalog offline");
        assert!(std::error::Error::source(&err).is_some());
    }
}
