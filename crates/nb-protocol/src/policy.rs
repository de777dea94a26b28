//! Nudge backoff tables.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard follow-up delays in minutes (1st, 2nd, 3rd nudge).
pub const STANDARD_NUDGE_MINUTES: [u32; 3] = [60, 120, 180];

/// Medication reminders nag every half hour.
pub const MEDICINE_NUDGE_MINUTES: [u32; 3] = [30, 30, 30];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("nudge table must not be empty")]
    Empty,

    #[error("nudge interval must be at least one minute (entry {0})")]
    ZeroInterval(usize),

    #[error("nudge intervals must be non-decreasing (entry {0} is shorter than the one before)")]
    Decreasing(usize),
}

/// Delay before each follow-up nudge, as a non-decreasing table of minutes.
///
/// `interval(k)` gives the wait before the check at `Nudging(k)`; levels beyond the
/// table reuse its last entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct NudgePolicy {
    minutes: Vec<u32>,
}

impl NudgePolicy {
    pub fn new(minutes: Vec<u32>) -> Result<Self, PolicyError> {
        if minutes.is_empty() {
            return Err(PolicyError::Empty);
        }
        if let Some(i) = minutes.iter().position(|m| *m == 0) {
            return Err(PolicyError::ZeroInterval(i));
        }
        if let Some(i) = minutes.windows(2).position(|w| w[1] < w[0]) {
            return Err(PolicyError::Decreasing(i + 1));
        }
        Ok(Self { minutes })
    }

    pub fn standard() -> Self {
        Self {
            minutes: STANDARD_NUDGE_MINUTES.to_vec(),
        }
    }

    pub fn medicine() -> Self {
        Self {
            minutes: MEDICINE_NUDGE_MINUTES.to_vec(),
        }
    }

    /// Delay before the check at nudge level `level` (1-based).
    pub fn interval(&self, level: u8) -> Duration {
        let idx = usize::from(level.max(1)) - 1;
        let minutes = self
            .minutes
            .get(idx)
            .or_else(|| self.minutes.last())
            .copied()
            .unwrap_or(STANDARD_NUDGE_MINUTES[0]);
        Duration::minutes(i64::from(minutes))
    }

    pub fn minutes(&self) -> &[u32] {
        &self.minutes
    }
}

impl Default for NudgePolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<u32>> for NudgePolicy {
    type Error = PolicyError;

    fn try_from(minutes: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(minutes)
    }
}

impl From<NudgePolicy> for Vec<u32> {
    fn from(policy: NudgePolicy) -> Self {
        policy.minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table() {
        let p = NudgePolicy::standard();
        assert_eq!(p.interval(1), Duration::minutes(60));
        assert_eq!(p.interval(2), Duration::minutes(120));
        assert_eq!(p.interval(3), Duration::minutes(180));
    }

    #[test]
    fn levels_past_table_reuse_last() {
        let p = NudgePolicy::new(vec![10, 20]).unwrap();
        assert_eq!(p.interval(5), Duration::minutes(20));
        assert_eq!(p.interval(0), Duration::minutes(10));
    }

    #[test]
    fn interval_is_non_decreasing() {
        for p in [NudgePolicy::standard(), NudgePolicy::medicine()] {
            for k in 1..10u8 {
                assert!(p.interval(k) <= p.interval(k + 1));
            }
        }
    }

    #[test]
    fn rejects_bad_tables() {
        assert_eq!(NudgePolicy::new(vec![]), Err(PolicyError::Empty));
        assert_eq!(
            NudgePolicy::new(vec![30, 0]),
            Err(PolicyError::ZeroInterval(1))
        );
        assert_eq!(
            NudgePolicy::new(vec![60, 30, 90]),
            Err(PolicyError::Decreasing(1))
        );
    }

    #[test]
    fn serde_validates() {
        let p: NudgePolicy = serde_json::from_str("[15, 30, 60]").unwrap();
        assert_eq!(p.minutes(), &[15, 30, 60]);
        assert!(serde_json::from_str::<NudgePolicy>("[60, 15]").is_err());
        assert_eq!(serde_json::to_string(&p).unwrap(), "[15,30,60]");
    }
}
