//! Secure wipe of host artifacts.

use tracing::{debug, warn};
use vaultops_core::{HostTree, SecureWiper, TaskResult};

use crate::context::OperationContext;
use crate::outcome::Outcome;

/// Result of a wipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeOutcome {
    /// The failed item is the wiper's error message.
    pub result: TaskResult<String>,
    /// Whether the root container was deleted afterwards. `None` when no
    /// root was given or the wipe did not get that far.
    pub root_removed: Option<bool>,
}

impl Outcome for WipeOutcome {
    fn mark_cancelled(&mut self) {
        self.result.mark_cancelled();
    }
}

/// Wipe every node in order, then delete `root` if all of them succeeded.
///
/// Failing to delete the root does not fail the wipe: every listed artifact
/// is already destroyed by then. It is reported in `root_removed`.
pub fn wipe_nodes<H, W>(
    ctx: &OperationContext,
    host: &H,
    wiper: &W,
    nodes: &[H::Node],
    root: Option<&H::Node>,
) -> WipeOutcome
where
    H: HostTree + ?Sized,
    W: SecureWiper<H> + ?Sized,
{
    let total = nodes.len();

    for (i, node) in nodes.iter().enumerate() {
        if ctx.is_cancelled() {
            return WipeOutcome {
                result: TaskResult::cancelled(),
                root_removed: None,
            };
        }

        if let Err(message) = wiper.wipe(host, node) {
            warn!(target_ref = %host.reference(node), %message, "wipe failed");
            return WipeOutcome {
                result: TaskResult::failed(message),
                root_removed: None,
            };
        }

        ctx.report(i + 1, total);
    }

    let root_removed = root.map(|root| match host.delete(root) {
        Ok(()) => {
            debug!(root = %host.reference(root), "removed wipe root");
            true
        }
        Err(e) => {
            warn!(root = %host.reference(root), error = %e, "cannot remove wipe root");
            false
        }
    });

    WipeOutcome {
        result: TaskResult::completed(),
        root_removed,
    }
}
