//! Duplicate a volume's backing container between host locations.
//!
//! This copies the encrypted container byte for byte; nothing is
//! decrypted.

use tracing::{debug, warn};
use vaultops_core::{HostTree, TaskResult};

use crate::context::OperationContext;
use crate::outcome::{Outcome, Walk};
use crate::transfer::pipe;

/// Result of a volume duplication.
#[derive(Debug, Clone)]
pub struct CopyVolumeOutcome<N> {
    /// The failed item is the source node that could not be copied.
    pub result: TaskResult<N>,
    /// The destination root actually created, even after a partial failure,
    /// so the caller can clean it up or reuse it.
    pub destination_root: Option<N>,
}

impl<N: Send + 'static> Outcome for CopyVolumeOutcome<N> {
    fn mark_cancelled(&mut self) {
        self.result.mark_cancelled();
    }
}

/// Count every descendant of `dir`. `None` if cancelled meanwhile.
pub fn count_descendants<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    host: &H,
    dir: &H::Node,
) -> Option<usize> {
    count_recursive(ctx, host, dir, 0)
}

fn count_recursive<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    host: &H,
    dir: &H::Node,
    depth: usize,
) -> Option<usize> {
    if ctx.is_cancelled() {
        return None;
    }
    // Too deep or unreadable trees count as empty here; the copy pass
    // reports them.
    if depth > ctx.config().max_depth {
        return Some(0);
    }
    let children = host.children(dir).unwrap_or_default();
    let mut count = children.len();
    for child in children.iter().filter(|c| host.is_dir(c)) {
        count += count_recursive(ctx, host, child, depth + 1)?;
    }
    Some(count)
}

/// Copy the directory `src` into `dst` as a new directory of the same name.
///
/// Phase one counts every entry for a determinate total; phase two mirrors
/// directories and duplicates files, checking each copied length against
/// the source. The failure marker is the child being processed at the
/// level where the error surfaced.
pub fn copy_volume<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    host: &H,
    src: &H::Node,
    dst: &H::Node,
) -> CopyVolumeOutcome<H::Node> {
    let Some(total) = count_descendants(ctx, host, src) else {
        return CopyVolumeOutcome {
            result: TaskResult::cancelled(),
            destination_root: None,
        };
    };
    debug!(total, "volume entries counted");
    ctx.report(0, total);

    let mut copier = VolumeCopier {
        ctx,
        host,
        total,
        progress: 0,
        destination_root: None,
    };
    let walk = copier.copy_dir(src, dst, 0);

    CopyVolumeOutcome {
        result: walk.into_result(),
        destination_root: copier.destination_root,
    }
}

struct VolumeCopier<'a, H: HostTree + ?Sized> {
    ctx: &'a OperationContext,
    host: &'a H,
    total: usize,
    progress: usize,
    destination_root: Option<H::Node>,
}

impl<H: HostTree + ?Sized> VolumeCopier<'_, H> {
    fn copy_dir(&mut self, src: &H::Node, dst: &H::Node, depth: usize) -> Walk<H::Node> {
        if depth > self.ctx.config().max_depth {
            warn!(source = %self.host.reference(src), "volume tree too deep");
            return Walk::Failed(src.clone());
        }
        let Some(name) = self.host.name(src) else {
            return Walk::Failed(src.clone());
        };
        let dst_dir = match self.host.create_dir(dst, &name) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(source = %self.host.reference(src), error = %e, "cannot create directory");
                return Walk::Failed(src.clone());
            }
        };
        if depth == 0 {
            self.destination_root = Some(dst_dir.clone());
        }

        let children = match self.host.children(src) {
            Ok(children) => children,
            Err(e) => {
                warn!(source = %self.host.reference(src), error = %e, "cannot list directory");
                return Walk::Failed(src.clone());
            }
        };

        for child in &children {
            if self.ctx.is_cancelled() {
                return Walk::Cancelled;
            }

            if self.host.is_file(child) {
                if !self.copy_file(child, &dst_dir) {
                    warn!(source = %self.host.reference(child), "cannot duplicate file");
                    return Walk::Failed(child.clone());
                }
            } else {
                match self.copy_dir(child, &dst_dir, depth + 1) {
                    Walk::Done => {}
                    other => return other,
                }
            }

            self.progress += 1;
            self.ctx.report(self.progress, self.total);
        }

        Walk::Done
    }

    fn copy_file(&self, src: &H::Node, dst_dir: &H::Node) -> bool {
        let Some(name) = self.host.name(src) else {
            return false;
        };
        let streams = self
            .host
            .create_file(dst_dir, &name)
            .and_then(|node| self.host.open_write(&node))
            .and_then(|writer| Ok((self.host.open_read(src)?, writer)));

        match streams {
            Ok((mut reader, mut writer)) => {
                match pipe(&mut *reader, &mut *writer, self.ctx.chunk_size()) {
                    Ok(written) => written == self.host.size(src),
                    Err(e) => {
                        debug!(source = %self.host.reference(src), error = %e, "stream failed");
                        false
                    }
                }
            }
            Err(e) => {
                debug!(source = %self.host.reference(src), error = %e, "cannot open streams");
                false
            }
        }
    }
}
