//! Value encoding/decoding for stores that enforce expiry themselves
//!
//! Binary format: [8 bytes: expire_at][N bytes: data]
//!
//! `expire_at` is an absolute Unix timestamp in milliseconds, 0 = never expire.
//! TTLs keep whole-second granularity; only the start point is millisecond
//! precise, so an entry lives for its full TTL.

use crate::StorageError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size of the expire_at header
const HEADER_LEN: usize = 8;

/// Stored value with expiry metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    /// Expiration timestamp in milliseconds (0 = never expire)
    pub expire_at: u64,
    /// Serialized record
    pub data: Vec<u8>,
}

impl StoredValue {
    /// Create a value that expires `ttl` after `now_ms`
    pub fn new(data: Vec<u8>, ttl: Option<Duration>, now_ms: u64) -> Self {
        Self {
            expire_at: calculate_expire_at(ttl, now_ms),
            data,
        }
    }

    /// Create a stored value with a pre-calculated expire_at timestamp
    pub fn with_expire_at(expire_at: u64, data: Vec<u8>) -> Self {
        Self { expire_at, data }
    }

    /// Encode the value to bytes for storage
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.data.len());
        buf.extend_from_slice(&self.expire_at.to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Decode a stored value from bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < HEADER_LEN {
            return Err(StorageError::Decoding(
                "Value too short to decode".to_string(),
            ));
        }

        let expire_at = u64::from_le_bytes(
            bytes[..HEADER_LEN]
                .try_into()
                .map_err(|_| StorageError::Decoding("Invalid expire_at".to_string()))?,
        );

        Ok(Self {
            expire_at,
            data: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Check if the value has expired at the given time (milliseconds)
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expire_at != 0 && now_ms >= self.expire_at
    }
}

/// Whole seconds for a TTL, rounding sub-second remainders up
///
/// `None` maps to 0 (never expire). A non-zero TTL never rounds down to 0.
pub fn ttl_secs(ttl: Option<Duration>) -> u64 {
    match ttl {
        None => 0,
        Some(d) => {
            let secs = d.as_secs();
            if d.subsec_nanos() > 0 || secs == 0 {
                secs + 1
            } else {
                secs
            }
        }
    }
}

/// Absolute expiration timestamp (milliseconds) for a TTL starting at `now_ms`
pub fn calculate_expire_at(ttl: Option<Duration>, now_ms: u64) -> u64 {
    match ttl_secs(ttl) {
        0 => 0,
        secs => now_ms.saturating_add(secs.saturating_mul(1000)),
    }
}

/// Get the current Unix timestamp in seconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Get the current Unix timestamp in milliseconds
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let value = StoredValue::with_expire_at(1_234_567_890, b"hello".to_vec());
        let decoded = StoredValue::decode(&value.encode()).unwrap();

        assert_eq!(decoded.expire_at, 1_234_567_890);
        assert_eq!(decoded.data, b"hello");
    }

    #[test]
    fn test_never_expire() {
        let value = StoredValue::new(b"data".to_vec(), None, 100);
        assert_eq!(value.expire_at, 0);
        assert!(!value.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_relative_ttl() {
        let value = StoredValue::new(b"data".to_vec(), Some(Duration::from_secs(3)), 1_000_000);
        assert_eq!(value.expire_at, 1_003_000);
        assert!(!value.is_expired_at(1_002_999));
        assert!(value.is_expired_at(1_003_000));
    }

    #[test]
    fn test_ttl_counts_from_within_the_second() {
        // Written 900ms into a second: still live 2.1s later
        let value = StoredValue::new(b"data".to_vec(), Some(Duration::from_secs(3)), 1_000_900);
        assert!(!value.is_expired_at(1_003_000));
        assert!(!value.is_expired_at(1_003_899));
        assert!(value.is_expired_at(1_003_900));
    }

    #[test]
    fn test_subsecond_ttl_rounds_up() {
        assert_eq!(ttl_secs(Some(Duration::from_millis(1))), 1);
        assert_eq!(ttl_secs(Some(Duration::from_millis(1500))), 2);
        assert_eq!(ttl_secs(Some(Duration::ZERO)), 1);
        assert_eq!(ttl_secs(Some(Duration::from_secs(3))), 3);
    }

    #[test]
    fn test_decode_too_short() {
        assert!(StoredValue::decode(&[0, 1, 2]).is_err());
    }
}
