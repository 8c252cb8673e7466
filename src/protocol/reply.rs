//! Hand-written memcached ASCII reply parser
//!
//! Every reply is a single line, except VALUE which is followed by a data
//! block of the announced length.

use crate::ProtocolError;

/// Case-insensitive keyword comparison (avoids allocation from to_ascii_lowercase)
#[inline]
fn word_eq(word: &[u8], expected: &[u8]) -> bool {
    word.len() == expected.len()
        && word
            .iter()
            .zip(expected.iter())
            .all(|(a, b)| a.to_ascii_uppercase() == *b)
}

/// Parsed server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// VALUE <key> <flags> <bytes> [<cas>]\r\n<data>\r\n
    Value {
        key: Vec<u8>,
        flags: u32,
        data: Vec<u8>,
    },
    End,
    Stored,
    NotStored,
    Deleted,
    NotFound,
    /// Server did not recognize the command
    Error,
    ClientError(String),
    ServerError(String),
}

impl Reply {
    /// Returns true if no more replies follow for the current request
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Reply::Value { .. })
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Reply::Value { key, .. } => format!("VALUE {}", String::from_utf8_lossy(key)),
            Reply::End => "END".to_string(),
            Reply::Stored => "STORED".to_string(),
            Reply::NotStored => "NOT_STORED".to_string(),
            Reply::Deleted => "DELETED".to_string(),
            Reply::NotFound => "NOT_FOUND".to_string(),
            Reply::Error => "ERROR".to_string(),
            Reply::ClientError(msg) => format!("CLIENT_ERROR {msg}"),
            Reply::ServerError(msg) => format!("SERVER_ERROR {msg}"),
        }
    }
}

/// Result of parsing
#[derive(Debug)]
pub enum ParseResult {
    /// Reply fully parsed, with the number of bytes consumed
    Complete(Reply, usize),
    /// Need more data to complete parsing
    NeedMoreData,
    /// Parse error
    Error(ProtocolError),
}

/// Parse one reply from the front of a buffer
///
/// VALUE blocks announcing more than `max_value_size` bytes are rejected
/// before any of the data is buffered.
pub fn parse_reply(buf: &[u8], max_value_size: usize) -> ParseResult {
    let Some(line_end) = find_crlf(buf) else {
        return ParseResult::NeedMoreData;
    };

    let line = &buf[..line_end];
    let consumed = line_end + 2;

    let (word, rest) = match memchr::memchr(b' ', line) {
        Some(pos) => (&line[..pos], &line[pos + 1..]),
        None => (line, &[][..]),
    };

    let reply = if word_eq(word, b"VALUE") {
        return parse_value(rest, buf, line_end, max_value_size);
    } else if word_eq(word, b"END") {
        Reply::End
    } else if word_eq(word, b"STORED") {
        Reply::Stored
    } else if word_eq(word, b"NOT_STORED") {
        Reply::NotStored
    } else if word_eq(word, b"DELETED") {
        Reply::Deleted
    } else if word_eq(word, b"NOT_FOUND") {
        Reply::NotFound
    } else if word_eq(word, b"ERROR") {
        Reply::Error
    } else if word_eq(word, b"CLIENT_ERROR") {
        Reply::ClientError(String::from_utf8_lossy(rest).to_string())
    } else if word_eq(word, b"SERVER_ERROR") {
        Reply::ServerError(String::from_utf8_lossy(rest).to_string())
    } else {
        return ParseResult::Error(ProtocolError::InvalidReply(
            String::from_utf8_lossy(line).to_string(),
        ));
    };

    ParseResult::Complete(reply, consumed)
}

/// Parse the remainder of a VALUE line and its data block
fn parse_value(header: &[u8], buf: &[u8], line_end: usize, max_value_size: usize) -> ParseResult {
    let mut parts = header.split(|&b| b == b' ').filter(|p| !p.is_empty());

    let key = match parts.next() {
        Some(k) => k,
        None => {
            return ParseResult::Error(ProtocolError::InvalidReply(
                "VALUE without key".to_string(),
            ));
        }
    };

    let Some(flags) = parts.next().and_then(parse_u32) else {
        return ParseResult::Error(ProtocolError::InvalidReply(
            "VALUE with invalid flags".to_string(),
        ));
    };

    let Some(bytes) = parts.next().and_then(parse_usize) else {
        return ParseResult::Error(ProtocolError::InvalidBytesLength);
    };

    if bytes > max_value_size {
        return ParseResult::Error(ProtocolError::ValueTooLarge {
            size: bytes,
            max: max_value_size,
        });
    }

    let data_start = line_end + 2;
    let Some(data_end) = data_start.checked_add(bytes) else {
        return ParseResult::Error(ProtocolError::InvalidBytesLength);
    };
    let Some(total_needed) = data_end.checked_add(2) else {
        return ParseResult::Error(ProtocolError::InvalidBytesLength);
    };

    if buf.len() < total_needed {
        return ParseResult::NeedMoreData;
    }

    if buf[data_end] != b'\r' || buf[data_end + 1] != b'\n' {
        return ParseResult::Error(ProtocolError::UnexpectedData);
    }

    let reply = Reply::Value {
        key: key.to_vec(),
        flags,
        data: buf[data_start..data_end].to_vec(),
    };

    ParseResult::Complete(reply, total_needed)
}

/// Find \r\n in buffer
#[inline]
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    memchr::memmem::find(buf, b"\r\n")
}

#[inline]
fn parse_u32(s: &[u8]) -> Option<u32> {
    std::str::from_utf8(s).ok()?.parse().ok()
}

#[inline]
fn parse_usize(s: &[u8]) -> Option<usize> {
    std::str::from_utf8(s).ok()?.parse().ok()
}
