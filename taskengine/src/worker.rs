//! Consumes ticks from a [`Dispatcher`] and executes a [`Task`] under its
//! concurrency [`Policy`].

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use taskengine_kernel::{Policy, Store, Task, Tick, WorkerState};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;

fn decode(v: u8) -> WorkerState {
    if v == STATE_RUNNING {
        WorkerState::Running
    } else {
        WorkerState::Idle
    }
}

/// Single consumer loop executing `task` under `policy` for every tick the
/// paired scheduler dispatches.
pub struct Worker {
    task: Arc<Task>,
    dispatcher: Dispatcher,
    policy: Policy,
    store: Arc<dyn Store>,
    state: AtomicU8,
    /// Set while a skip-if-busy execution is in flight. Shared with spawned
    /// executions via `Arc` so they can clear it on completion without
    /// borrowing the worker.
    busy: Arc<AtomicBool>,
    /// Count of ticks discarded because an execution was already running
    /// under skip-if-busy. Not persisted.
    skipped: std::sync::atomic::AtomicU64,
}

impl Worker {
    pub fn new(task: Arc<Task>, dispatcher: Dispatcher, policy: Policy, store: Arc<dyn Store>) -> Self {
        Self {
            task,
            dispatcher,
            policy,
            store,
            state: AtomicU8::new(STATE_IDLE),
            busy: Arc::new(AtomicBool::new(false)),
            skipped: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> WorkerState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Number of ticks discarded under skip-if-busy since construction.
    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Runs until the dispatcher closes and drains, or `token` cancels.
    /// Either way, joins every outstanding parallel execution before
    /// returning.
    pub async fn run(&self, token: CancellationToken) {
        tracing::info!("starting worker for task '{}'", self.task.name());
        self.state.store(STATE_RUNNING, Ordering::Release);

        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                tick = self.dispatcher.dequeue() => {
                    match tick {
                        Some(tick) => self.handle_tick(tick, &token, &mut in_flight).await,
                        None => {
                            tracing::info!("dispatcher closed, draining task '{}'", self.task.name());
                            break;
                        }
                    }
                }
                () = token.cancelled() => {
                    tracing::info!("worker for task '{}' cancelled, draining", self.task.name());
                    break;
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
        self.state.store(STATE_IDLE, Ordering::Release);
        tracing::info!("worker for task '{}' stopped", self.task.name());
    }

    async fn handle_tick(&self, tick: Tick, token: &CancellationToken, in_flight: &mut JoinSet<()>) {
        match self.policy {
            Policy::Parallel => {
                // TODO: maximum concurrency limit handling.
                let task = Arc::clone(&self.task);
                let store = Arc::clone(&self.store);
                let child = token.child_token();
                in_flight.spawn(async move { task.execute(&store, child, tick).await });
            }
            Policy::Serial => {
                self.task.execute(&self.store, token.child_token(), tick).await;
            }
            Policy::SkipIfBusy => {
                if self.busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "task '{}' still executing, discarding tick {}",
                        self.task.name(),
                        tick.current_tick
                    );
                    return;
                }
                let task = Arc::clone(&self.task);
                let store = Arc::clone(&self.store);
                let child = token.child_token();
                let busy_flag = Arc::clone(&self.busy);
                in_flight.spawn(async move {
                    task.execute(&store, child, tick).await;
                    busy_flag.store(false, Ordering::Release);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;
    use taskengine_kernel::{ExecutionInfo, StoreError, TaskSettings, TaskStatus};

    #[derive(Default)]
    struct RecordingStore {
        records: StdMutex<Vec<ExecutionInfo>>,
    }

    #[async_trait]
    impl Store for RecordingStore {
        async fn task_exists(&self, _name: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn save_task(&self, _name: &str, _settings: &TaskSettings) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_task_settings(&self, _name: &str) -> Result<Option<TaskSettings>, StoreError> {
            Ok(None)
        }
        async fn update_task_status(&self, _name: &str, _status: TaskStatus) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_last_tick(&self, _name: &str) -> Result<Option<chrono::DateTime<Utc>>, StoreError> {
            Ok(None)
        }
        async fn save_execution(&self, _name: &str, info: &ExecutionInfo) -> Result<u64, StoreError> {
            let mut records = self.records.lock().unwrap();
            records.push(info.clone());
            Ok(records.len() as u64)
        }
        async fn create_stores(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_stores(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn clear_stores(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn make_task(sleep_ms: u64) -> Arc<Task> {
        Arc::new(
            Task::new(
                "t",
                "job-1",
                Arc::new(move |_ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
                        Ok(())
                    })
                }),
                None,
            )
            .unwrap(),
        )
    }

    fn tick_at(n: i64) -> Tick {
        let base = Utc::now();
        Tick::new(None, base + chrono::Duration::milliseconds(n))
    }

    #[tokio::test(start_paused = true)]
    async fn skip_if_busy_never_exceeds_one_concurrent_execution() {
        let store = Arc::new(RecordingStore::default());
        let dispatcher = Dispatcher::new(10);
        let worker = Arc::new(Worker::new(
            make_task(200),
            dispatcher.clone(),
            Policy::SkipIfBusy,
            Arc::clone(&store) as Arc<dyn Store>,
        ));
        let token = CancellationToken::new();
        let child = token.clone();
        let w = Arc::clone(&worker);
        let handle = tokio::spawn(async move { w.run(child).await });

        dispatcher.enqueue(tick_at(0)).unwrap();
        tokio::time::advance(std::time::Duration::from_millis(10)).await;
        dispatcher.enqueue(tick_at(10)).unwrap();
        tokio::time::advance(std::time::Duration::from_millis(10)).await;
        dispatcher.enqueue(tick_at(20)).unwrap();

        tokio::time::advance(std::time::Duration::from_millis(300)).await;
        dispatcher.close();
        handle.await.unwrap();

        assert!(worker.skipped_count() >= 1);
        assert_eq!(store.records.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn serial_executions_never_overlap() {
        let store = Arc::new(RecordingStore::default());
        let dispatcher = Dispatcher::new(10);
        dispatcher.enqueue(tick_at(0)).unwrap();
        dispatcher.enqueue(tick_at(1)).unwrap();
        dispatcher.close();

        let worker = Worker::new(
            make_task(50),
            dispatcher,
            Policy::Serial,
            Arc::clone(&store) as Arc<dyn Store>,
        );
        let token = CancellationToken::new();
        worker.run(token).await;

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].end_time <= records[1].start_time);
    }
}
