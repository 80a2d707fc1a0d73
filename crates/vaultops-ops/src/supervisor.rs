//! Session lifecycle: start, run, cancel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vaultops_core::{OperationKind, OpsConfig, SessionId};

use crate::context::OperationContext;
use crate::error::{OpsError, OpsResult};
use crate::outcome::Outcome;
use crate::progress::ProgressSink;

/// A started session that has not run yet.
///
/// Pass it to [`TaskSupervisor::run`]; the session stays registered (and
/// cancellable) until then.
#[must_use = "a started session must be run to release it"]
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    kind: OperationKind,
    token: CancellationToken,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

/// Owns the mapping from session id to running unit of work.
pub struct TaskSupervisor {
    sink: Arc<dyn ProgressSink>,
    config: Arc<OpsConfig>,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<SessionId, CancellationToken>>,
}

impl TaskSupervisor {
    /// Create a supervisor reporting to `sink`.
    pub fn new(sink: impl ProgressSink + 'static, config: OpsConfig) -> Self {
        Self::with_shared_sink(Arc::new(sink), config)
    }

    /// Create a supervisor from an already shared sink.
    pub fn with_shared_sink(sink: Arc<dyn ProgressSink>, config: OpsConfig) -> Self {
        Self {
            sink,
            config: Arc::new(config),
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OpsConfig {
        &self.config
    }

    /// Open a progress session and register it for cancellation.
    ///
    /// The id is live as soon as this returns, before any work begins.
    pub fn start(&self, kind: OperationKind, total: Option<usize>) -> Session {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let token = CancellationToken::new();

        self.tasks().insert(id, token.clone());
        self.sink.open(id, kind, total);
        debug!(session = %id, %kind, ?total, "session started");

        Session { id, kind, token }
    }

    /// Run `work` for `session` on the blocking pool and wait for it.
    ///
    /// A cancelled session yields a cancelled outcome, never an error. The
    /// sink session is closed and the id unregistered on every exit path,
    /// including a panicking unit of work or this future being dropped.
    pub async fn run<R, F>(&self, session: Session, work: F) -> OpsResult<R>
    where
        R: Outcome,
        F: FnOnce(&OperationContext) -> R + Send + 'static,
    {
        let Session { id, kind, token } = session;
        let _guard = SessionGuard {
            supervisor: self,
            id,
            token: token.clone(),
        };

        let ctx = OperationContext::new(
            id,
            token.clone(),
            Arc::clone(&self.sink),
            Arc::clone(&self.config),
        );

        let joined = tokio::task::spawn_blocking(move || work(&ctx)).await;

        match joined {
            Ok(mut outcome) => {
                if token.is_cancelled() {
                    debug!(session = %id, %kind, "session cancelled");
                    outcome.mark_cancelled();
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(session = %id, %kind, error = %e, "unit of work did not complete");
                Err(OpsError::TaskFailed {
                    session: id,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Request cooperative cancellation of a live session.
    ///
    /// Returns whether the session was live. Stale ids are ignored.
    pub fn cancel(&self, id: SessionId) -> bool {
        match self.tasks().get(&id) {
            Some(token) => {
                debug!(session = %id, "cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every live session.
    pub fn cancel_all(&self) {
        for token in self.tasks().values() {
            token.cancel();
        }
    }

    pub fn is_active(&self, id: SessionId) -> bool {
        self.tasks().contains_key(&id)
    }

    /// Ids of all live sessions, in ascending order.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.tasks().keys().copied().collect();
        ids.sort();
        ids
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<SessionId, CancellationToken>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, id: SessionId) {
        self.tasks().remove(&id);
        self.sink.close(id);
        debug!(session = %id, "session closed");
    }
}

impl std::fmt::Debug for TaskSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSupervisor")
            .field("config", &self.config)
            .field("active", &self.active_sessions())
            .finish()
    }
}

/// Unregisters a session when `run` exits.
struct SessionGuard<'a> {
    supervisor: &'a TaskSupervisor,
    id: SessionId,
    token: CancellationToken,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Stops a detached unit of work if the awaiting future was dropped.
        self.token.cancel();
        self.supervisor.finish(self.id);
    }
}
