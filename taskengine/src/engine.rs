//! Process-wide registry of [`Supervisor`]s, keyed by task name; owns
//! process-wide start/shutdown and per-task control.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use taskengine_kernel::{
    EngineError, Policy, RegistrationError, Store, Task, TaskSettings, TaskStatus, Trigger,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::supervisor::Supervisor;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_EXECUTION_LAG: i64 = 100;

/// Per-registration knobs beyond the task and its store-persisted identity.
pub struct RegistrationOptions {
    policy: Policy,
    trigger: Arc<dyn Trigger>,
    catch_up_enabled: bool,
    max_execution_lag: i64,
}

impl RegistrationOptions {
    pub fn new(policy: Policy, trigger: Arc<dyn Trigger>) -> Self {
        Self {
            policy,
            trigger,
            catch_up_enabled: false,
            max_execution_lag: DEFAULT_MAX_EXECUTION_LAG,
        }
    }

    pub fn catch_up_enabled(mut self, enabled: bool) -> Self {
        self.catch_up_enabled = enabled;
        self
    }

    pub fn max_execution_lag(mut self, lag: i64) -> Self {
        self.max_execution_lag = lag;
        self
    }
}

pub struct EngineBuilder {
    store: Arc<dyn Store>,
    shutdown_timeout: Duration,
}

impl EngineBuilder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            store: self.store,
            supervisors: Mutex::new(HashMap::new()),
            shutdown_timeout: self.shutdown_timeout,
            base_token: CancellationToken::new(),
        }
    }
}

/// Registry of supervisors keyed by task name, plus the store handle and
/// shutdown deadline shared across them.
pub struct Engine {
    store: Arc<dyn Store>,
    supervisors: Mutex<HashMap<String, Arc<Supervisor>>>,
    shutdown_timeout: Duration,
    base_token: CancellationToken,
}

impl Engine {
    pub fn builder(store: Arc<dyn Store>) -> EngineBuilder {
        EngineBuilder::new(store)
    }

    /// Registers `task` under `options`. Re-registering an already-known
    /// task name is a warn-and-succeed no-op, independent of what the store
    /// holds. A name new to this process but already persisted in the store
    /// is checked against the persisted `(job, policy, trigger)` signature;
    /// any mismatch aborts registration with the corresponding error and
    /// leaves the registry untouched.
    pub async fn register_task(
        &self,
        task: Task,
        options: RegistrationOptions,
    ) -> Result<(), EngineError> {
        let name = task.name().to_string();

        {
            let supervisors = self.supervisors.lock().await;
            if supervisors.contains_key(&name) {
                tracing::warn!("task '{name}' already registered, ignoring re-registration");
                return Ok(());
            }
        }

        tracing::info!("registering task '{name}'");

        let job = task.job_id().to_string();
        let trigger_str = options.trigger.describe();

        if self.store.task_exists(&name).await? {
            let persisted = self
                .store
                .get_task_settings(&name)
                .await?
                .ok_or_else(|| EngineError::Store(taskengine_kernel::StoreError::msg(
                    format!("task '{name}' reported as existing but has no settings"),
                )))?;

            if persisted.job != job {
                return Err(EngineError::Registration(RegistrationError::JobMismatch {
                    persisted: persisted.job,
                    supplied: job,
                }));
            }
            if persisted.policy != options.policy {
                return Err(EngineError::Registration(RegistrationError::PolicyMismatch {
                    persisted: persisted.policy.to_string(),
                    supplied: options.policy.to_string(),
                }));
            }
            if persisted.trigger != trigger_str {
                return Err(EngineError::Registration(RegistrationError::TriggerMismatch {
                    persisted: persisted.trigger,
                    supplied: trigger_str,
                }));
            }
        } else {
            let settings = TaskSettings {
                job: job.clone(),
                policy: options.policy,
                trigger: trigger_str,
            };
            self.store.save_task(&name, &settings).await?;
        }

        let last_tick = match self.store.get_last_tick(&name).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("failed to fetch last dispatched tick for '{name}': {e}");
                None
            }
        };

        let supervisor = Arc::new(Supervisor::new(
            Arc::new(task),
            Arc::clone(&self.store),
            Arc::clone(&options.trigger),
            options.policy,
            options.max_execution_lag,
            options.catch_up_enabled,
            last_tick,
        ));

        self.store.update_task_status(&name, TaskStatus::Registered).await?;

        self.supervisors.lock().await.insert(name, supervisor);
        Ok(())
    }

    /// Starts every registered supervisor. A task whose persisted-status
    /// update fails is logged and skipped, not fatal to the others.
    pub async fn start(&self) {
        let supervisors: Vec<_> = self
            .supervisors
            .lock()
            .await
            .iter()
            .map(|(name, sup)| (name.clone(), Arc::clone(sup)))
            .collect();

        for (name, supervisor) in supervisors {
            if let Err(e) = self.store.update_task_status(&name, TaskStatus::Running).await {
                tracing::error!("failed to mark task '{name}' running, skipping start: {e}");
                continue;
            }
            supervisor.start(self.base_token.clone()).await;
        }
    }

    /// Shuts down every supervisor concurrently, bounded by the engine's
    /// shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let supervisors: Vec<_> = self
            .supervisors
            .lock()
            .await
            .iter()
            .map(|(name, sup)| (name.clone(), Arc::clone(sup)))
            .collect();

        let store = Arc::clone(&self.store);
        let joined = futures::future::join_all(supervisors.into_iter().map(|(name, supervisor)| {
            let store = Arc::clone(&store);
            async move {
                supervisor.shutdown().await;
                if let Err(e) = store.update_task_status(&name, TaskStatus::Idle).await {
                    tracing::error!("failed to mark task '{name}' idle after shutdown: {e}");
                }
            }
        }));

        tokio::time::timeout(self.shutdown_timeout, joined)
            .await
            .map(|_| ())
            .map_err(|_| EngineError::ShutdownTimeout(self.shutdown_timeout))
    }

    /// Starts the engine, blocks until SIGINT/SIGTERM, then shuts down.
    pub async fn run(&self) -> Result<(), EngineError> {
        self.start().await;
        shutdown_signal().await;
        self.shutdown().await
    }

    pub async fn start_task(&self, name: &str) -> Result<(), EngineError> {
        let supervisor = self.get_supervisor(name).await?;
        self.store.update_task_status(name, TaskStatus::Running).await?;
        supervisor.start(self.base_token.clone()).await;
        Ok(())
    }

    pub async fn shutdown_task(&self, name: &str) -> Result<(), EngineError> {
        let supervisor = self.get_supervisor(name).await?;
        tokio::time::timeout(self.shutdown_timeout, supervisor.shutdown())
            .await
            .map_err(|_| EngineError::TaskShutdownTimeout {
                name: name.to_string(),
                timeout: self.shutdown_timeout,
            })?;
        self.store.update_task_status(name, TaskStatus::Idle).await?;
        Ok(())
    }

    /// Shuts the task down, then drops it from the registry entirely. A
    /// subsequent `register_task` for the same name is treated as fresh.
    pub async fn remove_task(&self, name: &str) -> Result<(), EngineError> {
        self.shutdown_task(name).await?;
        self.supervisors.lock().await.remove(name);
        Ok(())
    }

    /// Count of ticks discarded under skip-if-busy for `name` since
    /// registration. Not persisted; observational only.
    pub async fn skipped_count(&self, name: &str) -> Result<u64, EngineError> {
        Ok(self.get_supervisor(name).await?.skipped_count())
    }

    async fn get_supervisor(&self, name: &str) -> Result<Arc<Supervisor>, EngineError> {
        self.supervisors
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::TaskNotFound(name.to_string()))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use taskengine_kernel::IntervalTrigger;

    fn noop_task(name: &str) -> Task {
        Task::new(name, "job-1", Arc::new(|_ctx| Box::pin(async { Ok(()) })), None).unwrap()
    }

    fn trigger() -> Arc<dyn Trigger> {
        Arc::new(IntervalTrigger::new(std::time::Duration::from_millis(50), true).unwrap())
    }

    #[tokio::test]
    async fn re_registration_of_same_name_in_process_is_idempotent() {
        let engine = Engine::builder(Arc::new(MemoryStore::new())).build();
        engine
            .register_task("a".into(), RegistrationOptions::new(Policy::Parallel, trigger()))
            .await
            .unwrap();

        // A second registration under the same name, even with different
        // policy/trigger, is a warn-and-succeed no-op: the in-process
        // registry check happens before any settings comparison.
        engine
            .register_task("a".into(), RegistrationOptions::new(Policy::Serial, trigger()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registration_rejects_policy_drift_after_store_restart() {
        let store = Arc::new(MemoryStore::new());

        {
            let engine = Engine::builder(Arc::clone(&store) as Arc<dyn Store>).build();
            engine
                .register_task(noop_task("t"), RegistrationOptions::new(Policy::Parallel, trigger()))
                .await
                .unwrap();
        }

        // Simulates a fresh process with an empty in-memory registry but the
        // same backing store.
        let engine = Engine::builder(store as Arc<dyn Store>).build();
        let err = engine
            .register_task(noop_task("t"), RegistrationOptions::new(Policy::Serial, trigger()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Registration(RegistrationError::PolicyMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn start_task_on_unknown_name_returns_not_found() {
        let engine = Engine::builder(Arc::new(MemoryStore::new()) as Arc<dyn Store>).build();
        let err = engine.start_task("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::TaskNotFound(name) if name == "missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_shutdown_round_trip() {
        let store = Arc::new(MemoryStore::new()) as Arc<dyn Store>;
        let engine = Engine::builder(store).build();
        engine
            .register_task(noop_task("t"), RegistrationOptions::new(Policy::Parallel, trigger()))
            .await
            .unwrap();

        engine.start().await;
        tokio::time::advance(std::time::Duration::from_millis(200)).await;
        engine.shutdown().await.unwrap();
    }
}
