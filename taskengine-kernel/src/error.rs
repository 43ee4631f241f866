//! Error types for the task engine core.
//!
//! Split by concern — construction-time, registration, dispatch, store, and
//! top-level engine errors — rather than one grab-bag enum.

use std::fmt;

use thiserror::Error;

/// Errors raised while constructing a [`crate::trigger::Trigger`].
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("interval must be a positive duration")]
    NonPositiveInterval,

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    /// Surfaced verbatim from the cron evaluator at `next()` time.
    #[error("cron evaluation failed: {0}")]
    Evaluation(String),
}

/// Errors raised while constructing a [`crate::task::Task`].
#[derive(Debug, Error)]
pub enum TaskBuildError {
    #[error("task name must be non-empty")]
    EmptyName,

    #[error("job identity must be non-empty")]
    EmptyJobId,
}

/// Errors returned from `Engine::register_task` when a task's persisted
/// signature drifts from the settings supplied at this call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("job name mismatch: persisted '{persisted}', supplied '{supplied}'")]
    JobMismatch { persisted: String, supplied: String },

    #[error("policy mismatch: persisted '{persisted}', supplied '{supplied}'")]
    PolicyMismatch { persisted: String, supplied: String },

    #[error("trigger mismatch: persisted '{persisted}', supplied '{supplied}'")]
    TriggerMismatch { persisted: String, supplied: String },
}

/// Dispatcher overflow: fatal to the Scheduler that hit it.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("dispatcher queue is full (capacity {capacity})")]
pub struct DispatcherFullError {
    pub capacity: usize,
}

/// Opaque error from a `Store` implementation, preserved verbatim.
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }

    pub fn msg(msg: impl Into<String>) -> Self {
        #[derive(Debug)]
        struct Msg(String);
        impl fmt::Display for Msg {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
        impl std::error::Error for Msg {}
        Self(Box::new(Msg(msg.into())))
    }
}

/// Top-level engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task '{0}' not found")]
    TaskNotFound(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),

    #[error("shutdown of task '{name}' timed out after {timeout:?}")]
    TaskShutdownTimeout {
        name: String,
        timeout: std::time::Duration,
    },
}
