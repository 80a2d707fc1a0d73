//! Shared traversal control flow.

use vaultops_core::TaskResult;

/// How a recursive walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Walk<T> {
    Done,
    Failed(T),
    Cancelled,
}

impl<T> Walk<T> {
    pub(crate) fn into_result(self) -> TaskResult<T> {
        match self {
            Self::Done => TaskResult::completed(),
            Self::Failed(item) => TaskResult::failed(item),
            Self::Cancelled => TaskResult::cancelled(),
        }
    }
}

/// A value a unit of work can produce.
///
/// The supervisor calls [`mark_cancelled`](Self::mark_cancelled) when the
/// session was cancelled, so a cancelled run never reports a failed item.
pub trait Outcome: Send + 'static {
    fn mark_cancelled(&mut self);
}

impl<T: Send + 'static> Outcome for TaskResult<T> {
    fn mark_cancelled(&mut self) {
        self.cancelled = true;
        self.failed_item = None;
    }
}
