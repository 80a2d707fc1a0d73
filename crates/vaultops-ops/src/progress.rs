//! Progress reporting protocol for file operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use vaultops_core::{OperationKind, SessionId};

/// Receives the lifecycle of every operation session.
///
/// `open` is called once before the unit of work starts and `close` once
/// after it ends, whatever the outcome. `update` calls in between are
/// monotonically non-decreasing in `done`.
pub trait ProgressSink: Send + Sync {
    /// A session starts. `total` is `None` while the work is still being
    /// discovered.
    fn open(&self, session: SessionId, kind: OperationKind, total: Option<usize>);

    /// `done` of `total` units finished.
    fn update(&self, session: SessionId, done: usize, total: usize);

    /// The session ended (success, failure, or cancellation).
    fn close(&self, session: SessionId);
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn open(&self, session: SessionId, kind: OperationKind, total: Option<usize>) {
        (**self).open(session, kind, total)
    }

    fn update(&self, session: SessionId, done: usize, total: usize) {
        (**self).update(session, done, total)
    }

    fn close(&self, session: SessionId) {
        (**self).close(session)
    }
}

/// Progress event delivered by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// A session started.
    Started {
        session: SessionId,
        kind: OperationKind,
        total: Option<usize>,
    },
    /// Progress update.
    Progress {
        session: SessionId,
        done: usize,
        total: usize,
    },
    /// The session ended.
    Finished { session: SessionId },
}

impl ProgressEvent {
    /// The session this event belongs to.
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started { session, .. }
            | Self::Progress { session, .. }
            | Self::Finished { session } => *session,
        }
    }
}

/// Forwards progress to a channel, for UIs that render it elsewhere.
///
/// The channel is unbounded: updates come from blocking worker threads and
/// must never stall the copy loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching anymore.
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelSink {
    fn open(&self, session: SessionId, kind: OperationKind, total: Option<usize>) {
        self.send(ProgressEvent::Started {
            session,
            kind,
            total,
        });
    }

    fn update(&self, session: SessionId, done: usize, total: usize) {
        self.send(ProgressEvent::Progress {
            session,
            done,
            total,
        });
    }

    fn close(&self, session: SessionId) {
        self.send(ProgressEvent::Finished { session });
    }
}

/// Reports progress as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn open(&self, session: SessionId, kind: OperationKind, total: Option<usize>) {
        match total {
            Some(total) => info!(%session, %kind, total, "{}", kind.title()),
            None => info!(%session, %kind, "{}: discovering files", kind.title()),
        }
    }

    fn update(&self, session: SessionId, done: usize, total: usize) {
        debug!(%session, done, total, "{done}/{total}");
    }

    fn close(&self, session: SessionId) {
        debug!(%session, "session closed");
    }
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn open(&self, _session: SessionId, _kind: OperationKind, _total: Option<usize>) {}

    fn update(&self, _session: SessionId, _done: usize, _total: usize) {}

    fn close(&self, _session: SessionId) {}
}
