//! Connection wrapper handed to route handlers.
//!
//! # Responsibilities
//! - Single-shot reads capped at a caller-supplied size
//! - Raw writes back to the peer
//! - Explicit close, after which every operation fails
//!
//! # Design Decisions
//! - One read per call: a line split across reads is not reassembled, and
//!   bytes beyond `max_bytes` are lost rather than buffered for the next call
//! - A zero-byte read is reported as `UnexpectedEof`; a peer that hangs up
//!   without sending a line never reaches a handler
//! - Dropping a connection closes the socket

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use super::tracker::ConnectionId;

/// Errors surfaced by [`Connection`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("failed to read line: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write to connection: {0}")]
    Write(#[source] io::Error),
    #[error("failed to close connection: {0}")]
    Close(#[source] io::Error),
    #[error("connection is closed")]
    Closed,
}

/// One accepted Unix stream, owned by the worker (and then the handler)
/// serving it.
#[derive(Debug)]
pub struct Connection {
    stream: Option<UnixStream>,
    id: ConnectionId,
}

impl Connection {
    /// Wrap an accepted stream with a fresh connection id.
    pub fn new(stream: UnixStream) -> Self {
        Self::with_id(stream, ConnectionId::new())
    }

    pub(crate) fn with_id(stream: UnixStream, id: ConnectionId) -> Self {
        Self {
            stream: Some(stream),
            id,
        }
    }

    /// Identifier used in log events for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Write all of `data` to the peer and return the number of bytes written.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, ConnectionError> {
        let stream = self.stream_mut()?;
        stream.write_all(data).await.map_err(ConnectionError::Write)?;
        Ok(data.len())
    }

    /// Perform exactly one read of at most `max_bytes` and return the bytes
    /// actually received.
    pub async fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, ConnectionError> {
        let stream = self.stream_mut()?;
        read_once(stream, max_bytes).await
    }

    /// Read one line with a single underlying read.
    ///
    /// Exactly one trailing `\n` is stripped. If the peer's line is longer
    /// than `max_bytes`, or the terminator has not arrived when the read
    /// returns, the partial text is returned as-is.
    pub async fn read_line(&mut self, max_bytes: usize) -> Result<String, ConnectionError> {
        let buf = self.read(max_bytes).await?;
        Ok(line_from_bytes(&buf))
    }

    /// Shut down and release the stream.
    ///
    /// Every later call, including a second `close`, returns
    /// [`ConnectionError::Closed`].
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        let mut stream = self.stream.take().ok_or(ConnectionError::Closed)?;
        stream.shutdown().await.map_err(ConnectionError::Close)
    }

    fn stream_mut(&mut self) -> Result<&mut UnixStream, ConnectionError> {
        self.stream.as_mut().ok_or(ConnectionError::Closed)
    }
}

async fn read_once(
    stream: &mut UnixStream,
    max_bytes: usize,
) -> Result<Vec<u8>, ConnectionError> {
    let mut buf = vec![0_u8; max_bytes];
    let read = stream.read(&mut buf).await.map_err(ConnectionError::Read)?;
    if read == 0 && max_bytes > 0 {
        return Err(ConnectionError::Read(io::Error::from(
            io::ErrorKind::UnexpectedEof,
        )));
    }
    buf.truncate(read);
    Ok(buf)
}

fn line_from_bytes(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    String::from_utf8_lossy(line).into_owned()
}
