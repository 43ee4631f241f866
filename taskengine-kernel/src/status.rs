use std::fmt;

/// Persisted lifecycle status of a registered task.
///
/// Transitions: `idle -> registered` on first `register_task`,
/// `registered/idle -> running` on `start`, `running -> idle` on
/// `shutdown`/`remove_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Registered,
    Running,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Registered => "registered",
            TaskStatus::Running => "running",
        })
    }
}

/// Terminal outcome of one `Task::execute` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Panic,
    /// Produced only by the skip-if-busy path. Not persisted as an
    /// execution record; observable only via the in-memory skip counter.
    Skipped,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Panic => "panic",
            ExecutionStatus::Skipped => "skipped",
        })
    }
}

/// Runtime (non-persisted) state of a scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
}

/// Runtime (non-persisted) state of a worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
}

/// Runtime (non-persisted) state of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
}
