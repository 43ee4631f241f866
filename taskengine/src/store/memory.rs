//! In-memory [`Store`] for embedding and tests. Not durable across process
//! restarts — a relational-backed implementation is the production
//! counterpart and lives outside this workspace.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskengine_kernel::{ExecutionInfo, Store, StoreError, TaskSettings, TaskStatus};

struct TaskRecord {
    settings: TaskSettings,
    status: TaskStatus,
    last_tick: Option<DateTime<Utc>>,
    next_iteration: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<HashMap<String, TaskRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn task_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.tasks.lock().unwrap().contains_key(name))
    }

    async fn save_task(&self, name: &str, settings: &TaskSettings) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(
            name.to_string(),
            TaskRecord {
                settings: settings.clone(),
                status: TaskStatus::Idle,
                last_tick: None,
                next_iteration: 1,
            },
        );
        Ok(())
    }

    async fn get_task_settings(&self, name: &str) -> Result<Option<TaskSettings>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .get(name)
            .map(|r| r.settings.clone()))
    }

    async fn update_task_status(&self, name: &str, status: TaskStatus) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(name) {
            Some(record) => {
                record.status = status;
                Ok(())
            }
            None => Err(StoreError::msg(format!("no such task '{name}'"))),
        }
    }

    async fn get_last_tick(&self, name: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.tasks.lock().unwrap().get(name).and_then(|r| r.last_tick))
    }

    async fn save_execution(&self, name: &str, info: &ExecutionInfo) -> Result<u64, StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        let record = tasks
            .get_mut(name)
            .ok_or_else(|| StoreError::msg(format!("no such task '{name}'")))?;
        let iteration = record.next_iteration;
        record.next_iteration += 1;
        record.last_tick = Some(info.tick);
        Ok(iteration)
    }

    async fn create_stores(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete_stores(&self) -> Result<(), StoreError> {
        self.tasks.lock().unwrap().clear();
        Ok(())
    }

    async fn clear_stores(&self) -> Result<(), StoreError> {
        self.tasks.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskengine_kernel::Policy;

    fn settings() -> TaskSettings {
        TaskSettings {
            job: "job-1".to_string(),
            policy: Policy::Parallel,
            trigger: "Interval(interval=10s, runOnStart=false)".to_string(),
        }
    }

    fn exec_at(tick: DateTime<Utc>) -> ExecutionInfo {
        ExecutionInfo {
            start_time: tick,
            end_time: tick,
            duration: chrono::Duration::zero(),
            status: taskengine_kernel::ExecutionStatus::Success,
            error_msg: None,
            tick,
        }
    }

    #[tokio::test]
    async fn unknown_task_does_not_exist() {
        let store = MemoryStore::new();
        assert!(!store.task_exists("missing").await.unwrap());
        assert!(store.get_task_settings("missing").await.unwrap().is_none());
        assert!(store.get_last_tick("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn iterations_increase_monotonically_per_task() {
        let store = MemoryStore::new();
        store.save_task("t", &settings()).await.unwrap();

        let now = Utc::now();
        let i1 = store.save_execution("t", &exec_at(now)).await.unwrap();
        let i2 = store
            .save_execution("t", &exec_at(now + chrono::Duration::seconds(10)))
            .await
            .unwrap();

        assert_eq!(i1, 1);
        assert_eq!(i2, 2);
    }

    #[tokio::test]
    async fn get_last_tick_reflects_most_recently_dispatched_tick() {
        let store = MemoryStore::new();
        store.save_task("t", &settings()).await.unwrap();

        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(10);
        store.save_execution("t", &exec_at(t1)).await.unwrap();
        store.save_execution("t", &exec_at(t2)).await.unwrap();

        assert_eq!(store.get_last_tick("t").await.unwrap(), Some(t2));
    }

    #[tokio::test]
    async fn status_round_trips() {
        let store = MemoryStore::new();
        store.save_task("t", &settings()).await.unwrap();
        store.update_task_status("t", TaskStatus::Running).await.unwrap();
        // No direct getter for status in the trait; exercised indirectly via
        // the engine's registration flow in integration tests.
    }
}
