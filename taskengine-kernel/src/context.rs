//! The per-invocation handle a job receives.
//!
//! Rust has no ambient per-call context object, so this is passed as an
//! explicit first parameter to the job. A sentinel value-lookup slot is kept
//! available via [`tokio::task_local!`]: code nested arbitrarily deep under
//! the job's call, in any future spawned from it via
//! [`ExecutionContext::scope`], can still retrieve the full handle with
//! [`current`].

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::tick::Tick;

/// Why an [`ExecutionContext`]'s cancellation token was tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationCause {
    /// The owning supervisor/engine was shut down.
    Shutdown,
    /// The task's per-invocation timeout elapsed.
    Timeout,
}

struct Inner {
    tick: Tick,
    task_name: String,
    span: tracing::Span,
    token: CancellationToken,
    deadline: Option<Instant>,
    cause: Mutex<Option<CancellationCause>>,
}

/// Carries the tick, logger, task name, deadline, and cancellation signal
/// for one `Task::execute` invocation.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

impl ExecutionContext {
    pub(crate) fn new(
        tick: Tick,
        task_name: String,
        span: tracing::Span,
        token: CancellationToken,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tick,
                task_name,
                span,
                token,
                deadline,
                cause: Mutex::new(None),
            }),
        }
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.inner.tick.last_tick
    }

    pub fn current_tick(&self) -> DateTime<Utc> {
        self.inner.tick.current_tick
    }

    pub fn tick(&self) -> Tick {
        self.inner.tick
    }

    pub fn task_name(&self) -> &str {
        &self.inner.task_name
    }

    /// The span this invocation's log lines should be emitted under.
    pub fn span(&self) -> &tracing::Span {
        &self.inner.span
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once this context is cancelled (shutdown or timeout).
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    pub fn cancellation_cause(&self) -> Option<CancellationCause> {
        *self.inner.cause.lock().unwrap()
    }

    pub(crate) fn cancel(&self, cause: CancellationCause) {
        let mut guard = self.inner.cause.lock().unwrap();
        if guard.is_none() {
            *guard = Some(cause);
        }
        drop(guard);
        self.inner.token.cancel();
    }
}

tokio::task_local! {
    static CURRENT: ExecutionContext;
}

/// Retrieves the [`ExecutionContext`] of the task invocation the calling
/// async task tree is running under, if any.
pub fn current() -> Option<ExecutionContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}

/// Runs `fut` with `ctx` installed as the sentinel value retrievable via
/// [`current`] from anywhere `fut` (or anything it spawns within the same
/// task-local scope) calls into.
pub async fn scope<F: Future>(ctx: ExecutionContext, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}
