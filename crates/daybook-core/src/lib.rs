//! Temporal state engine for day-scoped tasks and habits.
//!
//! Live state is a pure projection of an append-only event log. Elapsed logical
//! days are sealed into write-once history by the rollover engine, which also
//! carries unfinished tasks forward. Streaks, perfect days and per-day views are
//! derived from sealed history on demand.
//!
//! Persistence is reached only through [`PlannerStore`]; the [`Planner`] owns the
//! projected state and exposes the mutation and query surface.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};
use ulid::Ulid;

mod clock;
mod event;
mod history;
mod planner;
mod rollover;
mod snapshot;
mod state;
mod store;
mod streak;
mod watcher;

pub use clock::{logical_today, Clock, DayStart, FixedClock, SystemClock};
pub use event::{
    Event, EventKind, EventType, HabitCreated, HabitPatch, HabitRef, HabitToggledToday,
    HabitUpdated, Patch, TaskCarriedOver, TaskCreated, TaskPatch, TaskRef, TaskToggledDone,
    TaskToggledToday, TaskUpdated, PROVISIONAL_EVENT_ID,
};
pub use history::{
    day_task_rows, history_stats, live_snapshot, sealed_snapshot, summarize_days, DayHabit, DayRecord,
    DaySnapshot, DaySummary, DayTask, HabitHistoryRow, HistoryStats, TaskHistoryRow,
};
pub use planner::{InitReport, MutationTicket, Planner, PlannerConfig, PlannerSettings};
pub use rollover::{plan_day_seal, DaySeal, RolloverReport, SealedDay};
pub use snapshot::{PlannerSnapshot, SnapshotCache, SNAPSHOT_CONTRACT_VERSION};
pub use state::{apply, fold, reduce, Habit, HabitCompletion, PlannerState, Task, TaskStatus};
pub use store::{PlannerStore, SETTING_AUTO_CARRYOVER, SETTING_DAY_START};
pub use streak::{is_perfect_day, streak_from_rows, DEFAULT_STREAK_LOOKBACK_DAYS};
pub use watcher::{DayWatcher, RolloverTrigger, TimerHandle, TriggerOutcome};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum PlannerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct TaskId(pub Ulid);

impl TaskId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Parses a task id from its ULID text form.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] when `raw` is not a ULID.
    pub fn parse(raw: &str) -> Result<Self, PlannerError> {
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|_| PlannerError::Validation(format!("invalid task id: {raw}")))
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct HabitId(pub Ulid);

impl HabitId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Parses a habit id from its ULID text form.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] when `raw` is not a ULID.
    pub fn parse(raw: &str) -> Result<Self, PlannerError> {
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|_| PlannerError::Validation(format!("invalid habit id: {raw}")))
    }
}

impl Display for HabitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar date as the user experiences it, serialized as `YYYY-MM-DD`.
///
/// Ordering follows the calendar, which also matches the lexical order of the
/// text form; the SQLite store relies on that for range queries.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LocalDate(Date);

impl LocalDate {
    #[must_use]
    pub const fn from_date(date: Date) -> Self {
        Self(date)
    }

    /// Builds a date from calendar components.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] for out-of-range components.
    pub fn from_calendar(year: i32, month: u8, day: u8) -> Result<Self, PlannerError> {
        let month = Month::try_from(month)
            .map_err(|err| PlannerError::Validation(format!("invalid month {month}: {err}")))?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|err| PlannerError::Validation(format!("invalid calendar date: {err}")))
    }

    /// Parses a `YYYY-MM-DD` date.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] when the text is not a valid date in
    /// that exact shape.
    pub fn parse(raw: &str) -> Result<Self, PlannerError> {
        let invalid = || PlannerError::Validation(format!("date MUST be YYYY-MM-DD: {raw}"));

        let mut parts = raw.split('-');
        let (Some(year), Some(month), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if year.len() != 4 || month.len() != 2 || day.len() != 2 {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        let day: u8 = day.parse().map_err(|_| invalid())?;
        Self::from_calendar(year, month, day)
    }

    #[must_use]
    pub const fn date(self) -> Date {
        self.0
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(self) -> u8 {
        u8::from(self.0.month())
    }

    #[must_use]
    pub fn next_day(self) -> Self {
        Self(self.0.saturating_add(Duration::DAY))
    }

    #[must_use]
    pub fn prev_day(self) -> Self {
        Self(self.0.saturating_sub(Duration::DAY))
    }

    #[must_use]
    pub fn days_before(self, days: u32) -> Self {
        Self(self.0.saturating_sub(Duration::days(i64::from(days))))
    }

    /// First and last day of the given month.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] for an invalid year/month.
    pub fn month_bounds(year: i32, month: u8) -> Result<(Self, Self), PlannerError> {
        let first = Self::from_calendar(year, month, 1)?;
        let last_day = time::util::days_in_year_month(year, first.0.month());
        let last = Self::from_calendar(year, month, last_day)?;
        Ok((first, last))
    }
}

impl Display for LocalDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for LocalDate {
    type Err = PlannerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl Serialize for LocalDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LocalDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parses an RFC3339 timestamp, keeping its offset.
///
/// # Errors
/// Returns [`PlannerError::Validation`] when parsing fails.
pub fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, PlannerError> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|err| PlannerError::Validation(format!("invalid RFC3339 timestamp: {err}")))
}

/// Formats a timestamp as RFC3339 after normalizing to UTC.
///
/// # Errors
/// Returns [`PlannerError::Validation`] when formatting fails.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, PlannerError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| {
            PlannerError::Validation(format!("failed to format RFC3339 timestamp: {err}"))
        })
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
