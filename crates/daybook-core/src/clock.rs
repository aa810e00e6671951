use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{OffsetDateTime, Time};
use tracing::warn;

use crate::{LocalDate, PlannerError};

/// Source of wall-clock time. Everything date-dependent goes through this seam.
pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

/// Local wall clock. Falls back to UTC when the local offset cannot be resolved.
#[derive(Debug, Default)]
pub struct SystemClock {
    fallback_logged: AtomicBool,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        match OffsetDateTime::now_local() {
            Ok(now) => now,
            Err(err) => {
                if !self.fallback_logged.swap(true, Ordering::Relaxed) {
                    warn!(error = %err, "local UTC offset unavailable; using UTC for day boundaries");
                }
                OffsetDateTime::now_utc()
            }
        }
    }
}

/// Settable clock for tests and deterministic CLI runs.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<OffsetDateTime>,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, by: time::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now.get()
    }
}

/// Time of day at which a new logical day begins.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct DayStart(Time);

impl DayStart {
    pub const MIDNIGHT: Self = Self(Time::MIDNIGHT);

    /// Parses `HH:mm` in the range `00:00..=23:59`.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] for any other shape or range.
    pub fn parse(raw: &str) -> Result<Self, PlannerError> {
        let invalid = || PlannerError::Validation(format!("day start MUST be HH:mm: {raw}"));

        let (hour, minute) = raw.split_once(':').ok_or_else(invalid)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(invalid());
        }

        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }

        Time::from_hms(hour, minute, 0)
            .map(Self)
            .map_err(|_| invalid())
    }

    #[must_use]
    pub const fn time(self) -> Time {
        self.0
    }
}

impl Default for DayStart {
    fn default() -> Self {
        Self(time::macros::time!(04:00))
    }
}

impl Display for DayStart {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl Serialize for DayStart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayStart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Resolves the logical date for `now`, read in `now`'s own offset.
///
/// Any instant before the day start belongs to the previous calendar date.
#[must_use]
pub fn logical_today(day_start: DayStart, now: OffsetDateTime) -> LocalDate {
    let date = LocalDate::from_date(now.date());
    if now.time() < day_start.time() {
        date.prev_day()
    } else {
        date
    }
}
