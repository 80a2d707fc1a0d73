//! Import plain host files and directory trees into a volume.

use tracing::{debug, warn};
use vaultops_core::{path_join, HostTree, TaskResult, Volume};

use crate::context::OperationContext;
use crate::outcome::{Outcome, Walk};
use crate::transfer::import_stream;

/// Import each `(destination path, host source)` pair in order.
///
/// A failure is reported as the host reference of the source, since that is
/// the input the user has to look at.
pub fn import_files<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    host: &H,
    files: &[(String, H::Node)],
    volume: &dyn Volume,
) -> TaskResult<String> {
    let total = files.len();

    for (i, (destination, source)) in files.iter().enumerate() {
        if ctx.is_cancelled() {
            return TaskResult::cancelled();
        }

        let success = match host.open_read(source) {
            Ok(mut reader) => import_stream(volume, &mut *reader, destination, ctx.chunk_size()),
            Err(e) => {
                debug!(source = %host.reference(source), error = %e, "cannot open host file");
                false
            }
        };

        if !success {
            let reference = host.reference(source);
            warn!(source = %reference, destination = %destination, "import failed");
            return TaskResult::failed(reference);
        }

        ctx.report(i + 1, total);
    }

    TaskResult::completed()
}

/// Everything a directory import has to create, discovered up front.
#[derive(Debug, Clone)]
pub struct ImportPlan<N> {
    /// Volume directories to create, parents before children.
    pub directories: Vec<String>,
    /// Volume destination and host source of every file.
    pub files: Vec<(String, N)>,
}

impl<N> Default for ImportPlan<N> {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// Walk `src_dir` depth-first and plan its import under `dst_root`.
///
/// The error is the cancelled or failed result that stopped the walk.
///
/// Cancellation is polled once per host entry. Entries without a name are
/// skipped. A directory that cannot be listed, or that lies deeper than the
/// configured cap, fails with its host reference.
pub fn map_directory_for_import<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    host: &H,
    src_dir: &H::Node,
    dst_root: &str,
) -> Result<ImportPlan<H::Node>, TaskResult<String>> {
    let mut plan = ImportPlan::default();
    match map_recursive(ctx, host, src_dir, dst_root, 0, &mut plan) {
        Walk::Done => Ok(plan),
        other => Err(other.into_result()),
    }
}

fn map_recursive<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    host: &H,
    dir: &H::Node,
    dst_path: &str,
    depth: usize,
    plan: &mut ImportPlan<H::Node>,
) -> Walk<String> {
    if depth > ctx.config().max_depth {
        warn!(source = %host.reference(dir), depth, "import tree too deep");
        return Walk::Failed(host.reference(dir));
    }

    plan.directories.push(dst_path.to_string());

    let children = match host.children(dir) {
        Ok(children) => children,
        Err(e) => {
            warn!(source = %host.reference(dir), error = %e, "cannot list host directory");
            return Walk::Failed(host.reference(dir));
        }
    };

    for child in children {
        if ctx.is_cancelled() {
            return Walk::Cancelled;
        }
        let Some(name) = host.name(&child) else {
            continue;
        };
        let sub_path = path_join(dst_path, &name);
        if host.is_dir(&child) {
            match map_recursive(ctx, host, &child, &sub_path, depth + 1, plan) {
                Walk::Done => {}
                other => return other,
            }
        } else if host.is_file(&child) {
            plan.files.push((sub_path, child));
        }
    }

    Walk::Done
}

/// Result of a directory import.
#[derive(Debug, Clone)]
pub struct ImportDirectoryOutcome<N> {
    pub result: TaskResult<String>,
    /// Every host file the walk collected, so callers can wipe the
    /// originals after a successful import.
    pub sources: Vec<N>,
}

impl<N: Send + 'static> Outcome for ImportDirectoryOutcome<N> {
    fn mark_cancelled(&mut self) {
        self.result.mark_cancelled();
    }
}

/// Import the host directory `src_dir` as `dst_root` in `volume`.
///
/// Phase one maps the whole host tree; cancelling during it changes
/// nothing in the volume. Phase two creates every directory, stopping at
/// the first failing one, then imports the files with [`import_files`].
pub fn import_directory<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    host: &H,
    src_dir: &H::Node,
    dst_root: &str,
    volume: &dyn Volume,
) -> ImportDirectoryOutcome<H::Node> {
    let plan = match map_directory_for_import(ctx, host, src_dir, dst_root) {
        Ok(plan) => plan,
        Err(result) => {
            return ImportDirectoryOutcome {
                result,
                sources: Vec::new(),
            };
        }
    };

    debug!(
        directories = plan.directories.len(),
        files = plan.files.len(),
        "import plan ready"
    );
    ctx.report(0, plan.files.len());
    let sources: Vec<H::Node> = plan.files.iter().map(|(_, node)| node.clone()).collect();

    for dir in &plan.directories {
        if ctx.is_cancelled() {
            return ImportDirectoryOutcome {
                result: TaskResult::cancelled(),
                sources,
            };
        }
        if !volume.mkdir(dir) {
            warn!(path = %dir, "cannot create directory");
            return ImportDirectoryOutcome {
                result: TaskResult::failed(dir.clone()),
                sources,
            };
        }
    }

    let result = import_files(ctx, host, &plan.files, volume);
    ImportDirectoryOutcome { result, sources }
}
