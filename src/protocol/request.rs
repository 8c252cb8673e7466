//! Memcached ASCII protocol request builder

use bytes::BytesMut;
use itoa::Buffer;

/// Request writer for the memcached commands the store client sends
pub struct RequestWriter {
    buf: BytesMut,
}

impl RequestWriter {
    /// Create a new request writer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the internal buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Take the buffer, leaving an empty buffer in its place
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    /// Returns true if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Format: get <key>\r\n
    pub fn get(&mut self, key: &[u8]) {
        self.buf.extend_from_slice(b"get ");
        self.buf.extend_from_slice(key);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Format: set <key> <flags> <exptime> <bytes>\r\n<data>\r\n
    pub fn set(&mut self, key: &[u8], exptime: u64, data: &[u8]) {
        let mut itoa_buf = Buffer::new();
        self.buf.extend_from_slice(b"set ");
        self.buf.extend_from_slice(key);
        self.buf.extend_from_slice(b" 0 ");
        self.buf
            .extend_from_slice(itoa_buf.format(exptime).as_bytes());
        self.buf.extend_from_slice(b" ");
        self.buf
            .extend_from_slice(itoa_buf.format(data.len()).as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Format: delete <key>\r\n
    pub fn delete(&mut self, key: &[u8]) {
        self.buf.extend_from_slice(b"delete ");
        self.buf.extend_from_slice(key);
        self.buf.extend_from_slice(b"\r\n");
    }
}

impl Default for RequestWriter {
    fn default() -> Self {
        Self::new(1024)
    }
}
