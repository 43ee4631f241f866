use std::fmt;
use std::str::FromStr;

/// Concurrency discipline a [`crate::worker`](crate)-level consumer applies
/// to ticks of one task.
///
/// The `Display`/`FromStr` pair is the persisted wire form stored alongside
/// a task's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// No cap on concurrent executions of this task.
    Parallel,
    /// Executions are globally ordered; the next tick isn't dequeued until
    /// the current execution finishes.
    Serial,
    /// At most one execution in flight; a tick that fires while one is
    /// running is discarded.
    SkipIfBusy,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Policy::Parallel => "parallel",
            Policy::Serial => "serial",
            Policy::SkipIfBusy => "skip_if_busy",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized policy '{0}'")]
pub struct ParsePolicyError(String);

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parallel" => Ok(Policy::Parallel),
            "serial" => Ok(Policy::Serial),
            "skip_if_busy" => Ok(Policy::SkipIfBusy),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for p in [Policy::Parallel, Policy::Serial, Policy::SkipIfBusy] {
            let s = p.to_string();
            assert_eq!(s.parse::<Policy>().unwrap(), p);
        }
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!("urgent".parse::<Policy>().is_err());
    }
}
