//! User-registered job plus its fixed metadata.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::context::{CancellationCause, ExecutionContext};
use crate::error::TaskBuildError;
use crate::job::Job;
use crate::store::{ExecutionInfo, Store};
use crate::status::ExecutionStatus;
use crate::tick::Tick;

/// The user-supplied job plus the metadata that makes up its persisted
/// signature fragment (`job`) and per-invocation behavior (`timeout`).
pub struct Task {
    name: String,
    job_id: String,
    job: Job,
    timeout: Option<Duration>,
}

impl Task {
    /// # Errors
    ///
    /// [`TaskBuildError::EmptyName`] if `name` is empty, or
    /// [`TaskBuildError::EmptyJobId`] if `job_id` is empty.
    pub fn new(
        name: impl Into<String>,
        job_id: impl Into<String>,
        job: Job,
        timeout: Option<Duration>,
    ) -> Result<Self, TaskBuildError> {
        let name = name.into();
        let job_id = job_id.into();
        if name.is_empty() {
            return Err(TaskBuildError::EmptyName);
        }
        if job_id.is_empty() {
            return Err(TaskBuildError::EmptyJobId);
        }
        Ok(Self {
            name,
            job_id,
            job,
            timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs the job for one `tick`, recording the outcome via `store`.
    ///
    /// Never panics and never returns an error: job failures become an
    /// `error`/`panic` execution record, and store-write failures are
    /// logged and swallowed.
    pub async fn execute(
        &self,
        store: &Arc<dyn Store>,
        parent_token: CancellationToken,
        tick: Tick,
    ) {
        let start_time = Utc::now();
        let span = tracing::info_span!("task_execute", task = %self.name);

        let token = parent_token.child_token();
        let deadline = self.timeout.map(|d| tokio::time::Instant::now() + d);

        let ctx = ExecutionContext::new(tick, self.name.clone(), span.clone(), token, deadline);

        span.in_scope(|| tracing::info!("executing task '{}'", self.name));

        let job = Arc::clone(&self.job);
        let job_ctx = ctx.clone();
        let handle = tokio::spawn(crate::context::scope(job_ctx.clone(), async move {
            (job)(job_ctx).await
        }));

        let outcome = if let Some(deadline) = deadline {
            self.run_with_timeout(&ctx, handle, deadline).await
        } else {
            handle.await
        };

        let (status, error_msg) = match outcome {
            Ok(Ok(())) => (ExecutionStatus::Success, None),
            Ok(Err(err)) => {
                tracing::error!("task '{}' failed: {}", self.name, err);
                (ExecutionStatus::Error, Some(err.to_string()))
            }
            Err(join_err) if join_err.is_panic() => {
                let msg = panic_message(join_err);
                tracing::error!("task '{}' panicked: {}", self.name, msg);
                (ExecutionStatus::Panic, Some(format!("PANIC: {msg}")))
            }
            Err(join_err) => {
                // Cancelled join handle (task aborted elsewhere); treat as error.
                tracing::error!("task '{}' execution was aborted: {}", self.name, join_err);
                (ExecutionStatus::Error, Some(join_err.to_string()))
            }
        };

        let end_time = Utc::now();
        let info = ExecutionInfo {
            start_time,
            end_time,
            duration: end_time - start_time,
            status,
            error_msg,
            tick: tick.current_tick,
        };

        if let Err(e) = store.save_execution(&self.name, &info).await {
            tracing::error!("failed to persist execution record for '{}': {}", self.name, e);
        } else {
            tracing::info!("task '{}' completed with status {:?}", self.name, info.status);
        }
    }

    /// Races the job's join handle against its deadline, cancelling the
    /// context (cooperatively, no forced abort) once the deadline passes,
    /// then keeps waiting for the job to actually finish.
    async fn run_with_timeout(
        &self,
        ctx: &ExecutionContext,
        mut handle: tokio::task::JoinHandle<Result<(), crate::job::JobError>>,
        deadline: tokio::time::Instant,
    ) -> Result<Result<(), crate::job::JobError>, tokio::task::JoinError> {
        tokio::select! {
            res = &mut handle => return res,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!("task '{}' exceeded its timeout; signalling cancellation", self.name);
                ctx.cancel(CancellationCause::Timeout);
            }
        }
        handle.await
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "non-string panic payload".to_string()
            }
        }
        Err(_) => "unknown panic".to_string(),
    }
}
