//! The user-supplied unit of work.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::ExecutionContext;

/// Error type a [`Job`] returns. Any `std::error::Error` works; its
/// `Display` output becomes `ExecutionInfo::error_msg`.
pub type JobError = Box<dyn std::error::Error + Send + Sync>;

/// The function the engine invokes once per tick.
///
/// Rust has no reflection to derive a stable "code location" identity, so
/// callers supply an explicit `job_id` string at [`crate::task::Task`]
/// construction instead; that string is what gets compared across restarts.
pub type Job = Arc<dyn Fn(ExecutionContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;
