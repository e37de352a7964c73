//! Logical call-chain context carrying the active [`Scope`](crate::scope::Scope).
//!
//! The context is a persistent stack: each scope frame points at its parent,
//! so a snapshot is just a clone of the top pointer. Inside a Tokio task the
//! stack lives in a task-local, which follows the task across worker threads
//! and `.await` points. Forking (see [`fork`] and [`spawn`]) gives the new
//! branch its own copy of the stack as it was at the fork point, so sibling
//! branches never see each other's scopes.
//!
//! Plain synchronous code running outside any Tokio runtime falls back to a
//! per-thread stack. Inside a runtime the thread is shared by unrelated
//! tasks, so a task that never entered a context (e.g. one started with a
//! bare `tokio::spawn`) has no ambient scope: it reads as a root and its
//! scopes are not pushed anywhere. Enter a context with [`spawn`], [`fork`]
//! or [`LogicalContext::scope`] to get nesting.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::scope::ScopeFrame;

type Top = Option<Arc<ScopeFrame>>;

tokio::task_local! {
    static LOGICAL_TOP: RefCell<Top>;
}

thread_local! {
    static THREAD_TOP: RefCell<Top> = const { RefCell::new(None) };
}

/// The scope frame active on the current logical call chain.
pub fn current() -> Option<Arc<ScopeFrame>> {
    match LOGICAL_TOP.try_with(|top| top.borrow().clone()) {
        Ok(top) => top,
        Err(_) if in_runtime() => None,
        Err(_) => THREAD_TOP.with(|top| top.borrow().clone()),
    }
}

/// Replace the active frame, returning the previous one.
///
/// `None` when there is no context to write to: a Tokio task that never
/// entered one.
pub(crate) fn replace(frame: Top) -> Option<Top> {
    let mut pending = Some(frame);
    match LOGICAL_TOP.try_with(|top| top.replace(pending.take().unwrap_or_default())) {
        Ok(previous) => Some(previous),
        Err(_) if in_runtime() => None,
        Err(_) => Some(THREAD_TOP.with(|top| top.replace(pending.take().unwrap_or_default()))),
    }
}

fn in_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

/// An immutable snapshot of the logical context.
///
/// Capture it where work forks off and enter it in the new branch, e.g.
/// when handing work to a plain thread.
#[derive(Debug, Clone, Default)]
pub struct LogicalContext {
    top: Top,
}

impl LogicalContext {
    /// Snapshot the context of the current call chain.
    pub fn capture() -> Self {
        Self { top: current() }
    }

    /// An empty context with no active scope.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn current_scope(&self) -> Option<&Arc<ScopeFrame>> {
        self.top.as_ref()
    }

    /// Run `f` synchronously inside this context.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        LOGICAL_TOP.sync_scope(RefCell::new(self.top), f)
    }

    /// Run `future` inside this context.
    pub fn scope<F: Future>(self, future: F) -> impl Future<Output = F::Output> {
        LOGICAL_TOP.scope(RefCell::new(self.top), future)
    }
}

/// Run `future` as a new branch of the current logical call chain.
///
/// The snapshot is taken when `fork` is called, not when the future is
/// first polled.
pub fn fork<F: Future>(future: F) -> impl Future<Output = F::Output> {
    LogicalContext::capture().scope(future)
}

/// Spawn `future` on the Tokio runtime as a new branch of the current
/// logical call chain.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(fork(future))
}
