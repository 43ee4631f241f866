use chrono::{DateTime, Utc};

/// One firing instant, carrying the previous instant for differencing.
///
/// `last_tick` is `None` for the very first tick dispatched for a task (the
/// zero instant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tick {
    pub last_tick: Option<DateTime<Utc>>,
    pub current_tick: DateTime<Utc>,
}

impl Tick {
    pub fn new(last_tick: Option<DateTime<Utc>>, current_tick: DateTime<Utc>) -> Self {
        Self {
            last_tick,
            current_tick,
        }
    }
}
