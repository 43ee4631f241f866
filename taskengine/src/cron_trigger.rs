//! Cron-expression trigger.
//!
//! Depends on the external `cron` crate, the reason this variant lives in
//! the runtime crate rather than `taskengine-kernel`, which depends on
//! nothing but `chrono` and `tokio`.
//!
//! The engine's cron contract is the standard 5-field form (minute hour
//! day-of-month month day-of-week), but the `cron` crate only parses its own
//! 6-/7-field, seconds-first dialect. `CronTrigger` bridges the two: it
//! validates that the caller supplied exactly 5 fields, keeps that string as
//! the persisted/displayed expression, and prepends a zero seconds field
//! before handing it to `cron::Schedule`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use taskengine_kernel::{Trigger, TriggerError};

/// A 5-field cron expression, validated at construction.
#[derive(Clone)]
pub struct CronTrigger {
    expr: String,
    schedule: Schedule,
}

impl CronTrigger {
    /// # Errors
    ///
    /// [`TriggerError::InvalidCron`] if `expr` does not have exactly 5
    /// whitespace-separated fields, or if the resulting expression fails to
    /// parse.
    pub fn new(expr: impl Into<String>) -> Result<Self, TriggerError> {
        let expr = expr.into();
        let field_count = expr.split_whitespace().count();
        if field_count != 5 {
            return Err(TriggerError::InvalidCron {
                expr: expr.clone(),
                reason: format!(
                    "expected a 5-field cron expression (minute hour day-of-month month day-of-week), got {field_count} field(s)"
                ),
            });
        }

        let with_seconds = format!("0 {expr}");
        let schedule = Schedule::from_str(&with_seconds).map_err(|e| TriggerError::InvalidCron {
            expr: expr.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { expr, schedule })
    }
}

impl Trigger for CronTrigger {
    fn next(&self, last: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, TriggerError> {
        let after = last.unwrap_or_else(Utc::now);
        self.schedule
            .after(&after)
            .next()
            .ok_or_else(|| TriggerError::Evaluation("no further cron occurrences".to_string()))
    }

    fn describe(&self) -> String {
        format!("Cron(expr={})", self.expr)
    }
}
