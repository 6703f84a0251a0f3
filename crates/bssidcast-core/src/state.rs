//! Scheduler lifecycle states.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the publish scheduler.
///
/// ```text
/// Idle --start--> Connecting --connected--> Publishing
///  ^                  |                         |
///  +---- stop / connect failure ----------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Not connected; no scans are scheduled.
    #[default]
    Idle,
    /// A broker connection attempt is in flight.
    Connecting,
    /// Connected; scans run on the configured interval.
    Publishing,
}

impl SchedulerState {
    /// Whether `stop()` is meaningful in this state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, SchedulerState::Idle)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Connecting => write!(f, "connecting"),
            SchedulerState::Publishing => write!(f, "publishing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(SchedulerState::default(), SchedulerState::Idle);
    }

    #[test]
    fn test_is_active() {
        assert!(!SchedulerState::Idle.is_active());
        assert!(SchedulerState::Connecting.is_active());
        assert!(SchedulerState::Publishing.is_active());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&SchedulerState::Publishing).unwrap();
        assert_eq!(json, "\"publishing\"");
    }
}
