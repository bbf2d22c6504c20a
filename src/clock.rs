//! Wall-clock abstraction injected into the decision engine.

use chrono::{DateTime, Utc};

/// Thread-safe wall-clock time source.
///
/// The decision engine reads the clock exactly once per decision and reuses
/// the value for both limit resolution and bucket-key derivation, so the
/// two can never disagree about "now".
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests.
#[cfg(test)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::Mutex::new(now),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock();
        *now += duration;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn system_clock_is_non_decreasing() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at(Utc.timestamp_opt(1_000, 0).unwrap());
        assert_eq!(clock.now().timestamp(), 1_000);

        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now().timestamp(), 1_030);
    }

    #[test]
    fn usable_as_trait_object() {
        let clock: Box<dyn Clock> = Box::new(SystemClock);
        let _ = clock.now();
    }
}
