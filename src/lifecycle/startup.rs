//! Socket path preparation.
//!
//! # Responsibilities
//! - Refuse paths whose parent directory is missing
//! - Refuse paths that exist but are not sockets
//! - Refuse sockets another process is still serving
//! - Remove stale socket files left behind by a crashed process
//!
//! # Design Decisions
//! - Kept outside the serve loop, which binds exactly the path it is given
//! - A live listener is detected by connecting to it

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Errors raised while preparing a socket path.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("parent directory of socket {} does not exist", .path.display())]
    MissingParent { path: PathBuf },
    #[error("socket path {} exists and is not a socket", .path.display())]
    NotSocket { path: PathBuf },
    #[error("socket {} is already in use", .path.display())]
    InUse { path: PathBuf },
    #[error("stale socket {} exists and removal is disabled", .path.display())]
    Stale { path: PathBuf },
    #[error("failed to inspect socket {}: {source}", .path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale socket {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Make `path` ready for binding.
///
/// A leftover socket file nobody answers on is removed when `remove_stale` is
/// set, and reported as [`StartupError::Stale`] otherwise.
pub fn prepare_socket_path(path: &Path, remove_stale: bool) -> Result<(), StartupError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(StartupError::MissingParent {
                path: path.to_path_buf(),
            });
        }
    }

    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(StartupError::Inspect {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(StartupError::NotSocket {
            path: path.to_path_buf(),
        });
    }

    match UnixStream::connect(path) {
        Ok(_stream) => Err(StartupError::InUse {
            path: path.to_path_buf(),
        }),
        Err(e)
            if e.kind() == io::ErrorKind::ConnectionRefused
                || e.kind() == io::ErrorKind::NotFound =>
        {
            if !remove_stale {
                return Err(StartupError::Stale {
                    path: path.to_path_buf(),
                });
            }
            fs::remove_file(path).map_err(|source| StartupError::Cleanup {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(path = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Err(source) => Err(StartupError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Remove the socket file after the listener has closed.
pub fn cleanup_socket_path(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Socket file removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove socket file"
        ),
    }
}
