//! Per-operation context handed to every traversal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::trace;
use vaultops_core::{OpsConfig, SessionId};

use crate::progress::ProgressSink;

/// Cancellation flag, progress channel, and configuration of one session.
///
/// Traversals poll [`is_cancelled`](Self::is_cancelled) once per item and
/// call [`report`](Self::report) after each completed item.
pub struct OperationContext {
    session: SessionId,
    token: CancellationToken,
    sink: Arc<dyn ProgressSink>,
    config: Arc<OpsConfig>,
    last_done: AtomicUsize,
}

impl OperationContext {
    pub fn new(
        session: SessionId,
        token: CancellationToken,
        sink: Arc<dyn ProgressSink>,
        config: Arc<OpsConfig>,
    ) -> Self {
        Self {
            session,
            token,
            sink,
            config,
            last_done: AtomicUsize::new(0),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn config(&self) -> &OpsConfig {
        &self.config
    }

    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A clone of the session's cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Report `done` of `total` units finished.
    ///
    /// Updates that would move progress backwards are dropped.
    pub fn report(&self, done: usize, total: usize) {
        let previous = self.last_done.fetch_max(done, Ordering::AcqRel);
        if done < previous {
            trace!(session = %self.session, done, previous, "dropping stale progress");
            return;
        }
        self.sink.update(self.session, done, total);
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("session", &self.session)
            .field("cancelled", &self.token.is_cancelled())
            .field("config", &self.config)
            .finish()
    }
}
