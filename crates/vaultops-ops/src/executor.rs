//! High-level operation executor running each operation in the background.

use std::sync::Arc;

use tokio::task::JoinHandle;
use vaultops_core::{
    HostTree, OperationItem, OperationKind, SecureWiper, SessionId, TaskResult, Volume,
};

use crate::context::OperationContext;
use crate::copy::copy_items;
use crate::copy_volume::{copy_volume, CopyVolumeOutcome};
use crate::error::{OpsError, OpsResult};
use crate::export::export_items;
use crate::import::{import_directory, import_files, ImportDirectoryOutcome};
use crate::move_op::move_items;
use crate::outcome::Outcome;
use crate::supervisor::TaskSupervisor;
use crate::wipe::{wipe_nodes, WipeOutcome};

/// An operation running in the background.
///
/// The session id is available immediately for cancellation.
#[derive(Debug)]
pub struct RunningOperation<R> {
    id: SessionId,
    handle: JoinHandle<OpsResult<R>>,
}

impl<R> RunningOperation<R> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the operation to end.
    pub async fn wait(self) -> OpsResult<R> {
        let session = self.id;
        self.handle.await.map_err(|e| OpsError::TaskFailed {
            session,
            message: e.to_string(),
        })?
    }
}

/// Executor for operations against one local volume.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct OperationExecutor {
    supervisor: Arc<TaskSupervisor>,
    volume: Arc<dyn Volume>,
}

impl std::fmt::Debug for OperationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationExecutor")
            .field("supervisor", &self.supervisor)
            .field("volume_closed", &self.volume.is_closed())
            .finish()
    }
}

impl OperationExecutor {
    pub fn new(supervisor: Arc<TaskSupervisor>, volume: Arc<dyn Volume>) -> Self {
        Self { supervisor, volume }
    }

    pub fn supervisor(&self) -> &Arc<TaskSupervisor> {
        &self.supervisor
    }

    pub fn volume(&self) -> &Arc<dyn Volume> {
        &self.volume
    }

    /// Request cancellation of a running operation. Stale ids are ignored.
    pub fn cancel(&self, id: SessionId) -> bool {
        self.supervisor.cancel(id)
    }

    fn spawn<R, F>(&self, kind: OperationKind, total: Option<usize>, work: F) -> RunningOperation<R>
    where
        R: Outcome,
        F: FnOnce(&OperationContext) -> R + Send + 'static,
    {
        let session = self.supervisor.start(kind, total);
        let id = session.id();
        let supervisor = Arc::clone(&self.supervisor);
        let handle = tokio::spawn(async move { supervisor.run(session, work).await });
        RunningOperation { id, handle }
    }

    /// Copy items into the local volume, from `remote` if given.
    pub fn copy(
        &self,
        items: Vec<OperationItem>,
        remote: Option<Arc<dyn Volume>>,
    ) -> RunningOperation<TaskResult<String>> {
        let dst = Arc::clone(&self.volume);
        let src = remote.unwrap_or_else(|| Arc::clone(&self.volume));
        self.spawn(OperationKind::Copy, Some(items.len()), move |ctx| {
            copy_items(ctx, &items, src.as_ref(), dst.as_ref())
        })
    }

    /// Move items within the local volume.
    pub fn move_items(&self, items: Vec<OperationItem>) -> RunningOperation<TaskResult<String>> {
        let volume = Arc::clone(&self.volume);
        self.spawn(OperationKind::Move, Some(items.len()), move |ctx| {
            move_items(ctx, &items, volume.as_ref())
        })
    }

    /// Import host files to the given volume paths.
    pub fn import_files<H>(
        &self,
        host: Arc<H>,
        files: Vec<(String, H::Node)>,
    ) -> RunningOperation<TaskResult<String>>
    where
        H: HostTree + 'static,
        H::Node: 'static,
    {
        let volume = Arc::clone(&self.volume);
        self.spawn(OperationKind::Import, Some(files.len()), move |ctx| {
            import_files(ctx, host.as_ref(), &files, volume.as_ref())
        })
    }

    /// Import a host directory tree as `dst_root`.
    pub fn import_directory<H>(
        &self,
        host: Arc<H>,
        src_dir: H::Node,
        dst_root: String,
    ) -> RunningOperation<ImportDirectoryOutcome<H::Node>>
    where
        H: HostTree + 'static,
        H::Node: 'static,
    {
        let volume = Arc::clone(&self.volume);
        self.spawn(OperationKind::Import, None, move |ctx| {
            import_directory(ctx, host.as_ref(), &src_dir, &dst_root, volume.as_ref())
        })
    }

    /// Export items into the host directory `dest_tree`.
    pub fn export<H>(
        &self,
        host: Arc<H>,
        dest_tree: H::Node,
        items: Vec<OperationItem>,
    ) -> RunningOperation<TaskResult<String>>
    where
        H: HostTree + 'static,
        H::Node: 'static,
    {
        let volume = Arc::clone(&self.volume);
        self.spawn(OperationKind::Export, Some(items.len()), move |ctx| {
            export_items(ctx, volume.as_ref(), host.as_ref(), &dest_tree, &items)
        })
    }

    /// Securely wipe host artifacts, then delete `root` if given.
    pub fn wipe<H, W>(
        &self,
        host: Arc<H>,
        wiper: Arc<W>,
        nodes: Vec<H::Node>,
        root: Option<H::Node>,
    ) -> RunningOperation<WipeOutcome>
    where
        H: HostTree + 'static,
        H::Node: 'static,
        W: SecureWiper<H> + 'static,
    {
        self.spawn(OperationKind::Wipe, Some(nodes.len()), move |ctx| {
            wipe_nodes(ctx, host.as_ref(), wiper.as_ref(), &nodes, root.as_ref())
        })
    }

    /// Duplicate the volume container `src` into the host directory `dst`.
    pub fn copy_volume<H>(
        &self,
        host: Arc<H>,
        src: H::Node,
        dst: H::Node,
    ) -> RunningOperation<CopyVolumeOutcome<H::Node>>
    where
        H: HostTree + 'static,
        H::Node: 'static,
    {
        self.spawn(OperationKind::CopyVolume, None, move |ctx| {
            copy_volume(ctx, host.as_ref(), &src, &dst)
        })
    }
}
