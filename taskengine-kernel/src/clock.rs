//! Clock abstraction (injectable for deterministic tests).
//!
//! Scheduling code asks the clock for "now" rather than calling `Utc::now()`
//! directly, so tests can supply a fake clock and assert on tick ordering
//! without depending on wall time.

use chrono::{DateTime, Utc};

/// Provides the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The default [`Clock`], backed by `Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
