//! Trigger polymorphism: a small contract with two concrete shapes.
//!
//! This crate only carries the interval variant, which needs nothing beyond
//! `std::time`/`chrono`. The cron-expression variant depends on the external
//! `cron` crate and therefore lives in the `taskengine` runtime crate, which
//! is allowed to depend on this crate but not the other way around.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::TriggerError;

/// Converts the previous firing instant into the next one.
///
/// `describe()` is the stable string form persisted as part of a task's
/// signature; two triggers that describe the same schedule must render
/// identical strings across restarts.
pub trait Trigger: Send + Sync {
    /// `last` is `None` on the very first call for a task (the "zero
    /// instant").
    fn next(&self, last: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, TriggerError>;

    fn describe(&self) -> String;
}

/// Fixed-interval trigger, optionally firing immediately on first call.
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    interval: Duration,
    run_on_start: bool,
}

impl IntervalTrigger {
    /// # Errors
    ///
    /// Returns [`TriggerError::NonPositiveInterval`] if `interval` is zero.
    pub fn new(interval: Duration, run_on_start: bool) -> Result<Self, TriggerError> {
        if interval.is_zero() {
            return Err(TriggerError::NonPositiveInterval);
        }
        Ok(Self {
            interval,
            run_on_start,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn run_on_start(&self) -> bool {
        self.run_on_start
    }
}

impl Trigger for IntervalTrigger {
    fn next(&self, last: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, TriggerError> {
        let delta = chrono::Duration::from_std(self.interval)
            .map_err(|e| TriggerError::Evaluation(e.to_string()))?;
        Ok(match last {
            None if self.run_on_start => Utc::now(),
            None => Utc::now() + delta,
            Some(prev) => prev + delta,
        })
    }

    fn describe(&self) -> String {
        format!(
            "Interval(interval={}, runOnStart={})",
            format_go_duration(self.interval),
            self.run_on_start
        )
    }
}

/// Renders a [`Duration`] the way Go's `time.Duration.String()` would
/// (`10s`, `5m0s`, `1h30m0s`), matching the format persisted as part of a
/// trigger's signature string.
pub fn format_go_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    let total_nanos = d.as_nanos();
    if total_nanos < 1_000_000_000 {
        // Sub-second: pick the coarsest unit (ms/us/ns) that stays exact.
        if total_nanos % 1_000_000 == 0 {
            return format!("{}ms", total_nanos / 1_000_000);
        }
        if total_nanos % 1_000 == 0 {
            return format!("{}\u{b5}s", total_nanos / 1_000);
        }
        return format!("{}ns", total_nanos);
    }

    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let nanos = d.subsec_nanos();

    let frac = if nanos == 0 {
        String::new()
    } else {
        let mut s = format!("{:09}", nanos);
        while s.ends_with('0') {
            s.pop();
        }
        format!(".{}", s)
    };

    if hours > 0 {
        format!("{hours}h{minutes}m{secs}{frac}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs}{frac}s")
    } else {
        format!("{secs}{frac}s")
    }
}

impl fmt::Display for IntervalTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
