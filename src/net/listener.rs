//! Unix domain socket listener.
//!
//! # Responsibilities
//! - Bind to the configured socket path
//! - Accept incoming Unix stream connections
//! - Hand every accepted stream out together with its tracking guard
//!
//! # Design Decisions
//! - Binding never touches existing files; stale socket cleanup belongs to
//!   `lifecycle::startup`
//! - Accept errors are returned, not retried; the serve loop decides

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use super::tracker::{ConnectionGuard, ConnectionTracker};
use crate::observability::metrics;

/// Errors that end a serve call.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind the socket path.
    #[error("failed to open socket {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to accept a connection.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// A bound Unix listener that tracks every connection it accepts.
#[derive(Debug)]
pub struct Listener {
    inner: UnixListener,
    path: PathBuf,
    tracker: ConnectionTracker,
}

impl Listener {
    /// Bind to `path`, counting accepted connections on `tracker`.
    pub fn bind(path: &Path, tracker: ConnectionTracker) -> Result<Self, ListenerError> {
        let inner = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %path.display(), "Listener bound");

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            tracker,
        })
    }

    /// Accept a new connection.
    ///
    /// Returns the stream and a guard that must be held until the connection's
    /// worker finishes.
    pub async fn accept(&self) -> Result<(UnixStream, ConnectionGuard), ListenerError> {
        let (stream, _addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        let guard = self.tracker.track();
        metrics::record_accept();

        tracing::debug!(
            connection_id = %guard.id(),
            active = self.tracker.active_count(),
            "Connection accepted"
        );

        Ok((stream, guard))
    }

    /// The socket path this listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
