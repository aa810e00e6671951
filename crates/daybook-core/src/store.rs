use time::OffsetDateTime;

use crate::event::{Event, EventKind};
use crate::history::{HabitHistoryRow, TaskHistoryRow};
use crate::rollover::DaySeal;
use crate::{HabitId, LocalDate, PlannerError};

pub const SETTING_DAY_START: &str = "day_start";
pub const SETTING_AUTO_CARRYOVER: &str = "auto_carryover";

/// Persistence seam for the planner.
///
/// Implementations own durability and ordering: event ids strictly increase in
/// append order, history rows are write-once per `(date, entity)`, and
/// [`PlannerStore::seal_day`] is atomic.
pub trait PlannerStore {
    /// Appends one event in its own transaction and returns it with its id.
    /// `recorded_at` comes from the planner's clock and is stored as given.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] when the write fails; nothing is stored.
    fn append_event(
        &mut self,
        kind: &EventKind,
        recorded_at: OffsetDateTime,
    ) -> Result<Event, PlannerError>;

    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read or decode failure.
    fn all_events(&self) -> Result<Vec<Event>, PlannerError>;

    /// Events with id strictly greater than `last_event_id`, ascending.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read or decode failure.
    fn events_since(&self, last_event_id: i64) -> Result<Vec<Event>, PlannerError>;

    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn latest_event_id(&self) -> Result<Option<i64>, PlannerError>;

    /// The first day not yet sealed, if rollover has ever run.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn rollover_cursor(&self) -> Result<Option<LocalDate>, PlannerError>;

    /// Seeds the cursor, and records `date` as the rollover origin, when no cursor
    /// exists. Never moves an existing cursor.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] on write failure.
    fn init_rollover_cursor(&mut self, date: LocalDate) -> Result<(), PlannerError>;

    /// The day the cursor was first seeded. Days before it were never sealed.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn rollover_origin(&self) -> Result<Option<LocalDate>, PlannerError>;

    /// Writes the day's history rows, appends its carry-over events stamped with
    /// `recorded_at` and advances the cursor to `seal.next`, all or nothing.
    /// Returns the appended events.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] when the transaction fails.
    fn seal_day(
        &mut self,
        seal: &DaySeal,
        recorded_at: OffsetDateTime,
    ) -> Result<Vec<Event>, PlannerError>;

    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn habit_history_for_day(&self, date: LocalDate) -> Result<Vec<HabitHistoryRow>, PlannerError>;

    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn task_history_for_day(&self, date: LocalDate) -> Result<Vec<TaskHistoryRow>, PlannerError>;

    /// Rows for one habit in the `lookback_days` days ending at `until`, newest first.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn habit_history_window(
        &self,
        habit_id: HabitId,
        until: LocalDate,
        lookback_days: u32,
    ) -> Result<Vec<HabitHistoryRow>, PlannerError>;

    /// Inclusive date range.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn habit_history_between(
        &self,
        from: LocalDate,
        to: LocalDate,
    ) -> Result<Vec<HabitHistoryRow>, PlannerError>;

    /// Inclusive date range.
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn task_history_between(
        &self,
        from: LocalDate,
        to: LocalDate,
    ) -> Result<Vec<TaskHistoryRow>, PlannerError>;

    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn earliest_history_date(&self) -> Result<Option<LocalDate>, PlannerError>;

    /// # Errors
    /// Returns [`PlannerError::Persistence`] on read failure.
    fn setting(&self, key: &str) -> Result<Option<String>, PlannerError>;

    /// # Errors
    /// Returns [`PlannerError::Persistence`] on write failure.
    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), PlannerError>;
}
