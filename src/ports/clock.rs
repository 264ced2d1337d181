use chrono::{NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tracing::warn;

/// Source of the local calendar date and wall time for saved entries
pub trait ClockPort: Send + Sync {
    fn now(&self) -> (NaiveDate, NaiveTime);
}

/// Wall clock in a configured timezone
#[derive(Debug, Clone)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Resolve an IANA timezone name, falling back to UTC on parse errors
    pub fn from_timezone_name(tz_name: &str) -> Self {
        let timezone = match tz_name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!("Invalid journal timezone '{}', falling back to UTC", tz_name);
                chrono_tz::UTC
            }
        };
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> (NaiveDate, NaiveTime) {
        let local = Utc::now().with_timezone(&self.timezone);
        (local.date_naive(), local.time())
    }
}

/// Clock pinned to a settable instant
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<(NaiveDate, NaiveTime)>,
}

impl FixedClock {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            current: Mutex::new((date, time)),
        }
    }

    pub fn set(&self, date: NaiveDate, time: NaiveTime) {
        *self.current.lock() = (date, time);
    }
}

impl ClockPort for FixedClock {
    fn now(&self) -> (NaiveDate, NaiveTime) {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_timezone_falls_back_to_utc() {
        let clock = SystemClock::from_timezone_name("Mars/Olympus_Mons");
        assert_eq!(clock.timezone(), chrono_tz::UTC);
    }

    #[test]
    fn test_valid_timezone_is_used() {
        let clock = SystemClock::from_timezone_name("Europe/Berlin");
        assert_eq!(clock.timezone(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_fixed_clock_can_be_moved() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let clock = FixedClock::new(date, time);
        assert_eq!(clock.now(), (date, time));

        let next = date.succ_opt().unwrap();
        clock.set(next, time);
        assert_eq!(clock.now().0, next);
    }
}
