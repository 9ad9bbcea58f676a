//! External API-quota gate.
//!
//! The engine only ever asks a yes/no question before an analyzer call; the
//! actual accounting lives behind the [`QuotaGate`] trait so hosts can plug
//! in their own bookkeeping.

use std::sync::Mutex;

use crate::error::QuotaError;

/// Gate consulted before every external analyzer call.
pub trait QuotaGate: Send + Sync {
    /// Whether `needed` more calls are allowed right now.
    fn check(&self, needed: u32) -> Result<(), QuotaError>;

    /// Account for successfully issued calls.
    fn record(&self, calls: u32);
}

/// A gate that always allows.
#[derive(Debug, Default)]
pub struct Unlimited;

impl QuotaGate for Unlimited {
    fn check(&self, _needed: u32) -> Result<(), QuotaError> {
        Ok(())
    }

    fn record(&self, _calls: u32) {}
}

#[derive(Debug)]
struct DayCount {
    day: u64,
    used: u32,
}

/// A daily call budget that resets when the day changes.
#[derive(Debug)]
pub struct DailyQuota {
    limit: u32,
    state: Mutex<DayCount>,
}

impl DailyQuota {
    /// Create a gate allowing `limit` calls per day.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new(DayCount {
                day: current_day(),
                used: 0,
            }),
        }
    }

    /// Calls used so far today.
    pub fn used_today(&self) -> u32 {
        let mut state = self.state.lock().expect("quota lock poisoned");
        let today = current_day();
        if state.day != today {
            state.day = today;
            state.used = 0;
        }
        state.used
    }
}

impl QuotaGate for DailyQuota {
    fn check(&self, needed: u32) -> Result<(), QuotaError> {
        let mut state = self.state.lock().expect("quota lock poisoned");
        let today = current_day();
        if state.day != today {
            state.day = today;
            state.used = 0;
        }
        if state.used + needed > self.limit {
            tracing::warn!(
                used = state.used,
                limit = self.limit,
                needed,
                "API quota exhausted"
            );
            return Err(QuotaError::Exhausted {
                used: state.used,
                limit: self.limit,
                needed,
            });
        }
        Ok(())
    }

    fn record(&self, calls: u32) {
        let mut state = self.state.lock().expect("quota lock poisoned");
        let today = current_day();
        if state.day != today {
            state.day = today;
            state.used = 0;
        }
        state.used += calls;
    }
}

/// Days since the UNIX epoch.
fn current_day() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_allows() {
        let gate = Unlimited;
        assert!(gate.check(1_000_000).is_ok());
    }

    #[test]
    fn daily_quota_denies_past_limit() {
        let gate = DailyQuota::new(2);
        assert!(gate.check(1).is_ok());
        gate.record(1);
        assert!(gate.check(1).is_ok());
        gate.record(1);
        assert_eq!(gate.used_today(), 2);

        let err = gate.check(1).unwrap_err();
        assert!(matches!(
            err,
            QuotaError::Exhausted {
                used: 2,
                limit: 2,
                needed: 1
            }
        ));
    }

    #[test]
    fn check_does_not_consume() {
        let gate = DailyQuota::new(1);
        assert!(gate.check(1).is_ok());
        assert!(gate.check(1).is_ok());
        assert_eq!(gate.used_today(), 0);
    }
}
