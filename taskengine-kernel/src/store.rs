//! The persistence port the core requires.
//!
//! This crate defines the trait only; `taskengine` ships an in-memory
//! implementation for embedding and tests. A relational-backed
//! implementation is an external collaborator and not part of this
//! workspace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::policy::Policy;
use crate::status::{ExecutionStatus, TaskStatus};

/// `(job, policy, trigger)` tuple compared byte-exact against a new
/// registration to detect signature drift.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskSettings {
    pub job: String,
    pub policy: Policy,
    pub trigger: String,
}

/// One append-only execution record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionInfo {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: chrono::Duration,
    pub status: ExecutionStatus,
    pub error_msg: Option<String>,
    /// The dispatched `current_tick` this execution was running for. Used
    /// by `get_last_tick` to resume scheduling from the most recently
    /// dispatched tick rather than the most recent execution start time.
    pub tick: DateTime<Utc>,
}

/// Task settings, status, and execution-history persistence port.
///
/// All methods must be safe for concurrent use by every worker in the
/// process.
#[async_trait]
pub trait Store: Send + Sync {
    async fn task_exists(&self, name: &str) -> Result<bool, StoreError>;

    async fn save_task(&self, name: &str, settings: &TaskSettings) -> Result<(), StoreError>;

    async fn get_task_settings(&self, name: &str) -> Result<Option<TaskSettings>, StoreError>;

    async fn update_task_status(&self, name: &str, status: TaskStatus) -> Result<(), StoreError>;

    /// Most recent dispatched `current_tick` for this task, or `None` if it
    /// has never executed.
    async fn get_last_tick(&self, name: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Persists `info` and atomically allocates the next per-task
    /// `iteration` number, returning it.
    async fn save_execution(&self, name: &str, info: &ExecutionInfo) -> Result<u64, StoreError>;

    async fn create_stores(&self) -> Result<(), StoreError>;

    async fn delete_stores(&self) -> Result<(), StoreError>;

    async fn clear_stores(&self) -> Result<(), StoreError>;
}
