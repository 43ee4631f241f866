//! Drives a [`Trigger`] forward in time, enqueuing ticks onto a
//! [`Dispatcher`].
//!
//! The cooperative loop and its pause/resume control channel mirror the
//! original scheduler's run loop; the atomic status cell follows the
//! single-writer atomic state pattern used elsewhere for non-persisted
//! runtime status.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use taskengine_kernel::{Clock, SchedulerState, SystemClock, Tick, Trigger};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCommand {
    Pause,
    Resume,
}

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_PAUSED: u8 = 2;

fn decode(v: u8) -> SchedulerState {
    match v {
        STATE_RUNNING => SchedulerState::Running,
        STATE_PAUSED => SchedulerState::Paused,
        _ => SchedulerState::Idle,
    }
}

/// Time-driven producer of ticks for one task.
pub struct Scheduler {
    trigger: Arc<dyn Trigger>,
    dispatcher: Dispatcher,
    catch_up_enabled: bool,
    seed_last_tick: Option<DateTime<Utc>>,
    control_tx: mpsc::Sender<ControlCommand>,
    control_rx: tokio::sync::Mutex<mpsc::Receiver<ControlCommand>>,
    state: AtomicU8,
    /// Source of "now" for catch-up/past-tick decisions (injectable for
    /// testing). Production callers always get [`SystemClock`] via `new`.
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(
        trigger: Arc<dyn Trigger>,
        dispatcher: Dispatcher,
        catch_up_enabled: bool,
        seed_last_tick: Option<DateTime<Utc>>,
    ) -> Self {
        Self::with_clock(
            trigger,
            dispatcher,
            catch_up_enabled,
            seed_last_tick,
            Arc::new(SystemClock),
        )
    }

    /// Constructs a scheduler with a custom clock (primarily for testing).
    pub(crate) fn with_clock(
        trigger: Arc<dyn Trigger>,
        dispatcher: Dispatcher,
        catch_up_enabled: bool,
        seed_last_tick: Option<DateTime<Utc>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(1);
        Self {
            trigger,
            dispatcher,
            catch_up_enabled,
            seed_last_tick,
            control_tx,
            control_rx: tokio::sync::Mutex::new(control_rx),
            state: AtomicU8::new(STATE_IDLE),
            clock,
        }
    }

    pub fn status(&self) -> SchedulerState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Requests a pause; a no-op if the control channel is full (a pause is
    /// already pending).
    pub fn pause(&self) {
        let _ = self.control_tx.try_send(ControlCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.control_tx.try_send(ControlCommand::Resume);
    }

    /// Runs until `token` is cancelled or the trigger/dispatcher fatally
    /// errors. A second concurrent `run` on an already-running scheduler is
    /// a warn-and-no-op.
    pub async fn run(&self, token: CancellationToken) {
        if self.state.load(Ordering::Acquire) != STATE_IDLE {
            tracing::error!("scheduler is already running or paused, cannot start again");
            return;
        }

        tracing::info!("starting scheduler");
        let mut last_tick = self.seed_last_tick;
        self.state.store(STATE_RUNNING, Ordering::Release);
        let mut control_rx = self.control_rx.lock().await;

        loop {
            if self.state.load(Ordering::Acquire) == STATE_PAUSED {
                tokio::select! {
                    cmd = control_rx.recv() => match cmd {
                        Some(ControlCommand::Resume) => {
                            tracing::info!("scheduler resumed");
                            self.state.store(STATE_RUNNING, Ordering::Release);
                        }
                        Some(ControlCommand::Pause) | None => {}
                    },
                    () = token.cancelled() => {
                        tracing::info!("scheduler shutdown complete");
                        self.state.store(STATE_IDLE, Ordering::Release);
                        return;
                    }
                }
                continue;
            }

            let now = self.clock.now();
            let next = match self.trigger.next(last_tick) {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("error computing next tick: {e}");
                    self.state.store(STATE_IDLE, Ordering::Release);
                    return;
                }
            };

            if next < now && !self.catch_up_enabled {
                tracing::warn!("next tick {next} is in the past, skipping");
                last_tick = Some(next);
                continue;
            }

            let sleep = if next <= now {
                tokio::time::sleep(std::time::Duration::ZERO)
            } else {
                tokio::time::sleep((next - now).to_std().unwrap_or(std::time::Duration::ZERO))
            };
            tokio::pin!(sleep);

            tokio::select! {
                () = &mut sleep => {
                    let tick = Tick::new(last_tick, next);
                    tracing::info!("dispatching tick at {next}");
                    if let Err(e) = self.dispatcher.enqueue(tick) {
                        tracing::error!("error dispatching tick: {e}");
                        self.state.store(STATE_IDLE, Ordering::Release);
                        return;
                    }
                    last_tick = Some(next);
                }
                cmd = control_rx.recv() => {
                    match cmd {
                        Some(ControlCommand::Pause) => {
                            tracing::info!("scheduler paused");
                            self.state.store(STATE_PAUSED, Ordering::Release);
                        }
                        Some(ControlCommand::Resume) | None => {}
                    }
                }
                () = token.cancelled() => {
                    tracing::info!("scheduler shutdown complete");
                    self.state.store(STATE_IDLE, Ordering::Release);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;
    use taskengine_kernel::IntervalTrigger;

    fn interval_ms(ms: u64) -> Arc<dyn Trigger> {
        Arc::new(IntervalTrigger::new(std::time::Duration::from_millis(ms), true).unwrap())
    }

    /// Fixed-but-settable clock for deterministic catch-up/skip assertions,
    /// independent of tokio's paused virtual timer.
    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn new(start: DateTime<Utc>) -> Self {
            Self(AtomicI64::new(start.timestamp_millis()))
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.0.load(Ordering::SeqCst))
                .expect("in-range timestamp")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatches_ticks_on_interval() {
        let dispatcher = Dispatcher::new(10);
        let scheduler = Scheduler::new(interval_ms(100), dispatcher.clone(), false, None);
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move { scheduler.run(child).await });

        tokio::time::advance(std::time::Duration::from_millis(350)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(dispatcher.size() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_halts_dispatch_until_resumed() {
        let dispatcher = Dispatcher::new(10);
        let scheduler = Arc::new(Scheduler::new(interval_ms(50), dispatcher.clone(), false, None));
        let token = CancellationToken::new();
        let child = token.clone();
        let s = Arc::clone(&scheduler);

        let handle = tokio::spawn(async move { s.run(child).await });

        tokio::time::advance(std::time::Duration::from_millis(120)).await;
        scheduler.pause();
        tokio::time::advance(std::time::Duration::from_millis(10)).await;
        assert_eq!(scheduler.status(), SchedulerState::Paused);

        let size_while_paused = dispatcher.size();
        tokio::time::advance(std::time::Duration::from_millis(500)).await;
        assert_eq!(dispatcher.size(), size_while_paused);

        scheduler.resume();
        tokio::time::advance(std::time::Duration::from_millis(120)).await;
        assert!(dispatcher.size() > size_while_paused);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn catch_up_disabled_skips_ticks_computed_as_past_under_injected_clock() {
        let seed = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(seed + chrono::Duration::seconds(10)));
        let dispatcher = Dispatcher::new(10);
        let scheduler = Scheduler::with_clock(
            interval_ms(1000),
            dispatcher.clone(),
            false,
            Some(seed),
            Arc::clone(&clock),
        );
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move { scheduler.run(child).await });

        // The clock sits 10 interval-lengths ahead of the seeded last tick;
        // with catch-up disabled every backlog instant computed as past
        // relative to the injected "now" must be skipped without ever being
        // dispatched, leaving only the first non-past tick.
        tokio::time::advance(std::time::Duration::from_millis(1100)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(dispatcher.size(), 1);
        let tick = dispatcher.dequeue().await.unwrap();
        assert!(tick.current_tick > seed + chrono::Duration::seconds(9));
    }
}
