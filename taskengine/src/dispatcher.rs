//! Bounded FIFO of [`Tick`]s decoupling the [`crate::scheduler::Scheduler`]
//! from the [`crate::worker::Worker`].
//!
//! A `VecDeque` behind a `Mutex` with a `Notify` waking a waiting consumer.
//! `enqueue` is always non-blocking: on a full buffer it returns
//! [`DispatcherFullError`] rather than applying a backpressure strategy,
//! since an overflowing queue means the worker has fallen behind the
//! scheduler by more ticks than it can still usefully catch up on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use taskengine_kernel::{DispatcherFullError, Tick};
use tokio::sync::Notify;

const DEFAULT_CAPACITY: usize = 100;

struct Inner {
    queue: Mutex<VecDeque<Tick>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
}

/// A bounded, single-producer/single-consumer tick queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// `capacity <= 0` falls back to a default of 100.
    pub fn new(capacity: i64) -> Self {
        let capacity = if capacity <= 0 {
            DEFAULT_CAPACITY
        } else {
            capacity as usize
        };
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                notify: Notify::new(),
                capacity,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn size(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    /// Non-blocking enqueue. Fails with [`DispatcherFullError`] if the
    /// buffer is already at capacity.
    ///
    /// Callers must not enqueue after [`Dispatcher::close`]; the scheduler
    /// is solely responsible for honoring that contract.
    pub fn enqueue(&self, tick: Tick) -> Result<(), DispatcherFullError> {
        let mut q = self.inner.queue.lock().unwrap();
        if q.len() >= self.inner.capacity {
            return Err(DispatcherFullError {
                capacity: self.inner.capacity,
            });
        }
        q.push_back(tick);
        drop(q);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Blocks until a tick is available or the dispatcher is closed and
    /// drained, returning `None` in the latter case (end-of-stream).
    pub async fn dequeue(&self) -> Option<Tick> {
        loop {
            let notified = self.inner.notify.notified();

            if let Some(tick) = self.inner.queue.lock().unwrap().pop_front() {
                return Some(tick);
            }

            if self.inner.closed.load(Ordering::Acquire) {
                return None;
            }

            notified.await;
        }
    }

    /// Idempotent. Wakes any pending `dequeue` so it can observe
    /// end-of-stream once the buffer drains.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tick() -> Tick {
        Tick::new(None, Utc::now())
    }

    #[test]
    fn accepts_exactly_capacity_enqueues_then_errors() {
        let d = Dispatcher::new(3);
        for _ in 0..3 {
            d.enqueue(tick()).unwrap();
        }
        let err = d.enqueue(tick()).unwrap_err();
        assert_eq!(err.capacity, 3);
        assert_eq!(d.size(), 3);
    }

    #[test]
    fn non_positive_capacity_defaults_to_100() {
        let d = Dispatcher::new(0);
        assert_eq!(d.capacity(), 100);
        let d = Dispatcher::new(-5);
        assert_eq!(d.capacity(), 100);
    }

    #[tokio::test]
    async fn dequeue_returns_in_fifo_order() {
        let d = Dispatcher::new(10);
        let t1 = Tick::new(None, Utc::now());
        let t2 = Tick::new(Some(t1.current_tick), t1.current_tick + chrono::Duration::seconds(1));
        d.enqueue(t1).unwrap();
        d.enqueue(t2).unwrap();

        assert_eq!(d.dequeue().await.unwrap().current_tick, t1.current_tick);
        assert_eq!(d.dequeue().await.unwrap().current_tick, t2.current_tick);
    }

    #[tokio::test]
    async fn dequeue_after_close_drains_then_returns_none() {
        let d = Dispatcher::new(10);
        d.enqueue(tick()).unwrap();
        d.close();

        assert!(d.dequeue().await.is_some());
        assert!(d.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn dequeue_blocks_until_enqueue() {
        let d = Dispatcher::new(10);
        let d2 = d.clone();
        let handle = tokio::spawn(async move { d2.dequeue().await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        d.enqueue(tick()).unwrap();

        assert!(handle.await.unwrap().is_some());
    }
}
