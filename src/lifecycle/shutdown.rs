//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

/// Shared cancellation signal for the serve loop and its workers.
///
/// Clones observe the same signal. The accept loop watches it while waiting
/// for connections; each worker checks it once before reading its line.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new, untriggered shutdown signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal. Triggering twice is a no-op.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// A signal that fires with this one but can also be triggered on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// The underlying token, for `select!` with other tokio-util users.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
