//! Binds one [`Scheduler`], one [`Worker`], and their shared [`Dispatcher`]
//! for a single task and owns their combined lifetime.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use taskengine_kernel::{SchedulerState, SupervisorState, Task, Trigger, WorkerState};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::scheduler::Scheduler;
use crate::worker::Worker;

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;

fn decode(v: u8) -> SupervisorState {
    if v == STATE_RUNNING {
        SupervisorState::Running
    } else {
        SupervisorState::Idle
    }
}

struct RunHandles {
    token: CancellationToken,
    scheduler_handle: tokio::task::JoinHandle<()>,
    worker_handle: tokio::task::JoinHandle<()>,
}

pub struct Supervisor {
    scheduler: Arc<Scheduler>,
    worker: Arc<Worker>,
    dispatcher: Dispatcher,
    state: AtomicU8,
    running: Mutex<Option<RunHandles>>,
}

impl Supervisor {
    pub fn new(
        task: Arc<Task>,
        store: Arc<dyn taskengine_kernel::Store>,
        trigger: Arc<dyn Trigger>,
        policy: taskengine_kernel::Policy,
        dispatcher_capacity: i64,
        catch_up_enabled: bool,
        seed_last_tick: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Self {
        let dispatcher = Dispatcher::new(dispatcher_capacity);
        let scheduler = Arc::new(Scheduler::new(trigger, dispatcher.clone(), catch_up_enabled, seed_last_tick));
        let worker = Arc::new(Worker::new(task, dispatcher.clone(), policy, store));
        Self {
            scheduler,
            worker,
            dispatcher,
            state: AtomicU8::new(STATE_IDLE),
            running: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SupervisorState {
        decode(self.state.load(Ordering::Acquire))
    }

    pub fn scheduler_status(&self) -> SchedulerState {
        self.scheduler.status()
    }

    pub fn worker_status(&self) -> WorkerState {
        self.worker.status()
    }

    pub fn pause_scheduler(&self) {
        self.scheduler.pause();
    }

    pub fn resume_scheduler(&self) {
        self.scheduler.resume();
    }

    pub fn skipped_count(&self) -> u64 {
        self.worker.skipped_count()
    }

    /// Launches the scheduler and worker loops as independent tasks under a
    /// shared cancellable child of `parent`. A second `start` while already
    /// running is a warn-and-no-op.
    pub async fn start(&self, parent: CancellationToken) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::warn!("supervisor already running, ignoring start");
            return;
        }

        let token = parent.child_token();
        let scheduler = Arc::clone(&self.scheduler);
        let scheduler_token = token.clone();
        let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_token).await });

        let worker = Arc::clone(&self.worker);
        let worker_token = token.clone();
        let worker_handle = tokio::spawn(async move { worker.run(worker_token).await });

        *running = Some(RunHandles {
            token,
            scheduler_handle,
            worker_handle,
        });
        drop(running);

        self.state.store(STATE_RUNNING, Ordering::Release);
    }

    /// Cancels the scheduler and worker, closes the dispatcher, and waits
    /// for both loops to finish. Idempotent: a second `shutdown` while
    /// already idle is a no-op.
    pub async fn shutdown(&self) {
        let handles = self.running.lock().await.take();
        let Some(handles) = handles else {
            return;
        };

        handles.token.cancel();
        self.dispatcher.close();

        let _ = handles.scheduler_handle.await;
        let _ = handles.worker_handle.await;

        self.state.store(STATE_IDLE, Ordering::Release);
    }
}
