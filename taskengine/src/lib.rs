//! Embeddable recurring-task engine.
//!
//! Register a [`taskengine_kernel::Task`] with a [`taskengine_kernel::Trigger`]
//! and a [`taskengine_kernel::Policy`], and an [`Engine`] drives its
//! scheduling, execution, cancellation, and run-history persistence until
//! the host process shuts down.

pub mod cron_trigger;
pub mod dispatcher;
pub mod engine;
pub mod scheduler;
pub mod store;
pub mod supervisor;
pub mod worker;

pub use cron_trigger::CronTrigger;
pub use dispatcher::Dispatcher;
pub use engine::{Engine, EngineBuilder, RegistrationOptions};
pub use scheduler::Scheduler;
pub use store::MemoryStore;
pub use supervisor::Supervisor;
pub use worker::Worker;

pub use taskengine_kernel::{
    current, scope, CancellationCause, Clock, DispatcherFullError, EngineError, ExecutionContext,
    ExecutionInfo, ExecutionStatus, IntervalTrigger, Job, JobError, ParsePolicyError, Policy,
    RegistrationError, SchedulerState, Store as StorePort, StoreError, SupervisorState,
    SystemClock, Task, TaskBuildError, TaskSettings, TaskStatus, Tick, Trigger, TriggerError,
    WorkerState,
};
