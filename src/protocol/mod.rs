//! Memcached ASCII protocol, client side

pub mod reply;
pub mod request;

pub use reply::{ParseResult, Reply, parse_reply};
pub use request::RequestWriter;

use crate::ProtocolError;

/// Maximum key length (memcached spec)
pub const MAX_KEY_LENGTH: usize = 250;

/// Check if a key is valid
pub fn is_valid_key(key: &[u8]) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    // Keys cannot contain control characters or whitespace
    key.iter().all(|&b| b > 32 && b < 127)
}

/// Validate a key before it is put on the wire
pub fn check_key(key: &str) -> Result<(), ProtocolError> {
    if is_valid_key(key.as_bytes()) {
        Ok(())
    } else if key.len() > MAX_KEY_LENGTH {
        Err(ProtocolError::KeyTooLong)
    } else {
        Err(ProtocolError::InvalidKey(key.to_string()))
    }
}
