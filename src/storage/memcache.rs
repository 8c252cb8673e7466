//! Client store for an external memcached-compatible server
//!
//! TTL travels as the memcached exptime and is enforced by the server.

use crate::config::MemcacheConfig;
use crate::protocol::{ParseResult, Reply, RequestWriter, check_key, parse_reply};
use crate::storage::value::{current_timestamp, ttl_secs};
use crate::storage::{KeyValueStore, compose_key};
use crate::{ProtocolError, ReadThruError, Result, StorageError};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Exptimes above this are read by memcached as absolute Unix timestamps
const MAX_RELATIVE_EXPTIME: u64 = 2_592_000;

/// Single-connection memcached client
///
/// The connection is opened on first use and taken out of the slot for the
/// length of each exchange, so a call that fails, hits an unexpected reply or
/// is cancelled mid-flight leaves no half-read stream behind. The next call
/// connects afresh; the failed call itself is not retried.
pub struct MemcacheStore {
    config: MemcacheConfig,
    conn: Mutex<Option<Connection>>,
}

impl MemcacheStore {
    pub fn new(config: MemcacheConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Address of the server this client talks to
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Send one request and interpret the replies up to the terminal one
    ///
    /// `interpret` hands back the offending reply when it is not what the
    /// command expects.
    async fn round_trip<T>(
        &self,
        command: &'static str,
        request: BytesMut,
        interpret: impl FnOnce(Vec<Reply>) -> std::result::Result<T, Reply>,
    ) -> Result<T> {
        let mut guard = self.conn.lock().await;

        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => {
                self.bounded(Connection::open(&self.config.addr, self.config.read_buffer_size))
                    .await?
            }
        };

        let replies = self
            .bounded(conn.exchange(&request, self.config.max_value_size))
            .await
            .inspect_err(|e| {
                warn!(addr = %self.config.addr, error = %e, "Dropping memcached connection");
            })?;

        match interpret(replies) {
            Ok(value) => {
                *guard = Some(conn);
                Ok(value)
            }
            // A well-formed error reply leaves the stream in sync
            Err(reply @ (Reply::ServerError(_) | Reply::ClientError(_))) => {
                *guard = Some(conn);
                Err(reply_error(command, reply))
            }
            Err(reply) => {
                warn!(
                    addr = %self.config.addr,
                    command,
                    reply = %reply.describe(),
                    "Unexpected reply, dropping memcached connection"
                );
                Err(reply_error(command, reply))
            }
        }
    }

    /// Apply the configured timeout and classify I/O failures
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = std::result::Result<T, ExchangeError>>,
    ) -> Result<T> {
        let outcome = match self.config.timeout() {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(ReadThruError::StoreUnavailable(format!(
                        "{}: timed out after {:?}",
                        self.config.addr, limit
                    )));
                }
            },
            None => fut.await,
        };

        outcome.map_err(|e| match e {
            ExchangeError::Io(e) => {
                ReadThruError::StoreUnavailable(format!("{}: {e}", self.config.addr))
            }
            ExchangeError::Protocol(e) => StorageError::Protocol(e).into(),
        })
    }
}

#[async_trait]
impl KeyValueStore for MemcacheStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = wire_key(namespace, key)?;

        let mut request = RequestWriter::default();
        request.get(full_key.as_bytes());

        let found = self
            .round_trip("get", request.take(), |replies| {
                let mut found = None;
                for reply in replies {
                    match reply {
                        Reply::Value { key, data, .. } if key == full_key.as_bytes() => {
                            found = Some(data);
                        }
                        Reply::End => {}
                        other => return Err(other),
                    }
                }
                Ok(found)
            })
            .await?;
        debug!(key = %full_key, hit = found.is_some(), "memcached get");
        Ok(found)
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let full_key = wire_key(namespace, key)?;
        if value.len() > self.config.max_value_size {
            return Err(StorageError::Protocol(ProtocolError::ValueTooLarge {
                size: value.len(),
                max: self.config.max_value_size,
            })
            .into());
        }

        let mut request = RequestWriter::new(full_key.len() + value.len() + 64);
        request.set(full_key.as_bytes(), exptime(ttl), &value);

        self.round_trip("set", request.take(), |mut replies| match replies.pop() {
            Some(Reply::Stored) => Ok(()),
            Some(other) => Err(other),
            None => Err(Reply::Error),
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let full_key = wire_key(namespace, key)?;

        let mut request = RequestWriter::default();
        request.delete(full_key.as_bytes());

        self.round_trip("delete", request.take(), |mut replies| match replies.pop() {
            Some(Reply::Deleted) => Ok(true),
            Some(Reply::NotFound) => Ok(false),
            Some(other) => Err(other),
            None => Err(Reply::Error),
        })
        .await
    }
}

/// Key as sent on the wire
///
/// The caller's key is percent-encoded so any id the other stores accept is
/// also a legal memcached key. Only the 250-byte limit can still reject it.
fn wire_key(namespace: &str, key: &str) -> Result<String> {
    let full_key = compose_key(namespace, &urlencoding::encode(key));
    check_key(&full_key).map_err(StorageError::from)?;
    Ok(full_key)
}

/// memcached exptime for a TTL (0 = never expire)
fn exptime(ttl: Option<Duration>) -> u64 {
    match ttl_secs(ttl) {
        secs if secs > MAX_RELATIVE_EXPTIME => current_timestamp() + secs,
        secs => secs,
    }
}

fn reply_error(command: &'static str, reply: Reply) -> ReadThruError {
    match reply {
        Reply::ServerError(msg) | Reply::ClientError(msg) => StorageError::Server(msg).into(),
        other => StorageError::Protocol(ProtocolError::UnexpectedReply {
            command,
            reply: other.describe(),
        })
        .into(),
    }
}

enum ExchangeError {
    Io(std::io::Error),
    Protocol(ProtocolError),
}

impl From<std::io::Error> for ExchangeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// An open connection with its read buffer
struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
}

impl Connection {
    async fn open(addr: &str, read_buffer_size: usize) -> std::result::Result<Self, ExchangeError> {
        let stream = TcpStream::connect(addr).await?;
        // Disable Nagle's algorithm for lower latency
        stream.set_nodelay(true)?;
        debug!("Connected to memcached at {}", addr);

        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(read_buffer_size),
        })
    }

    async fn exchange(
        &mut self,
        request: &[u8],
        max_value_size: usize,
    ) -> std::result::Result<Vec<Reply>, ExchangeError> {
        self.stream.write_all(request).await?;

        let mut replies = Vec::new();
        loop {
            match parse_reply(&self.read_buf, max_value_size) {
                ParseResult::Complete(reply, consumed) => {
                    self.read_buf.advance(consumed);
                    let terminal = reply.is_terminal();
                    replies.push(reply);
                    if terminal {
                        return Ok(replies);
                    }
                }
                ParseResult::NeedMoreData => {
                    if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                        return Err(ExchangeError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed by server",
                        )));
                    }
                }
                ParseResult::Error(e) => return Err(ExchangeError::Protocol(e)),
            }
        }
    }
}
