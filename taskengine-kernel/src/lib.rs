//! Trait and type layer for the recurring-task engine core.
//!
//! Concrete scheduling/dispatch/supervision and any `Trigger`/`Store`
//! implementation that needs an external crate (`cron`, a database driver)
//! live in the `taskengine` runtime crate. This crate stays dependency-light
//! so it can be unit-tested without pulling those in.

pub mod clock;
pub mod context;
pub mod error;
pub mod job;
pub mod policy;
pub mod status;
pub mod store;
pub mod task;
pub mod tick;
pub mod trigger;

pub use clock::{Clock, SystemClock};
pub use context::{current, scope, CancellationCause, ExecutionContext};
pub use error::{
    DispatcherFullError, EngineError, RegistrationError, StoreError, TaskBuildError, TriggerError,
};
pub use job::{Job, JobError};
pub use policy::{ParsePolicyError, Policy};
pub use status::{ExecutionStatus, SchedulerState, SupervisorState, TaskStatus, WorkerState};
pub use store::{ExecutionInfo, Store, TaskSettings};
pub use task::Task;
pub use tick::Tick;
pub use trigger::{format_go_duration, IntervalTrigger, Trigger};
