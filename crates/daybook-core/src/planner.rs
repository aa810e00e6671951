use std::cmp::Ordering;
use std::collections::VecDeque;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{logical_today, Clock, DayStart};
use crate::event::{
    Event, EventKind, HabitCreated, HabitPatch, HabitRef, HabitToggledToday, HabitUpdated,
    Patch, TaskCreated, TaskPatch, TaskRef, TaskToggledDone, TaskToggledToday, TaskUpdated,
    PROVISIONAL_EVENT_ID,
};
use crate::history::{
    history_stats, live_snapshot, sealed_snapshot, summarize_days, DayRecord, DaySummary,
    HistoryStats,
};
use crate::rollover::{plan_day_seal, RolloverReport, SealedDay};
use crate::snapshot::{PlannerSnapshot, SnapshotCache};
use crate::state::{apply, fold, PlannerState, TaskStatus};
use crate::store::{PlannerStore, SETTING_AUTO_CARRYOVER, SETTING_DAY_START};
use crate::streak::{is_perfect_day, streak_from_rows, DEFAULT_STREAK_LOOKBACK_DAYS};
use crate::{HabitId, LocalDate, PlannerError, TaskId};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlannerConfig {
    pub snapshot_path: Option<PathBuf>,
    pub streak_lookback_days: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            streak_lookback_days: DEFAULT_STREAK_LOOKBACK_DAYS,
        }
    }
}

/// User settings persisted in the store.
#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
pub struct PlannerSettings {
    pub day_start: DayStart,
    pub auto_carryover: bool,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            day_start: DayStart::default(),
            auto_carryover: true,
        }
    }
}

/// Handle for a mutation that has been applied to the visible state but not yet
/// persisted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MutationTicket(u64);

impl MutationTicket {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct InitReport {
    pub settings: PlannerSettings,
    pub restored_from_snapshot: bool,
    pub snapshot_event_id: Option<i64>,
    pub replayed_events: usize,
    pub last_event_id: i64,
    pub rollover: RolloverReport,
}

#[derive(Debug)]
struct PendingMutation {
    ticket: MutationTicket,
    event: Event,
}

struct Rebuild {
    state: PlannerState,
    last_event_id: i64,
    replayed_events: usize,
    snapshot_event_id: Option<i64>,
}

/// Owns the projected state and is the only writer to the store.
///
/// `confirmed` is folded from persisted events only. `visible` is `confirmed` plus
/// every queued optimistic mutation, and is what queries read.
pub struct Planner<S, C> {
    store: S,
    clock: C,
    config: PlannerConfig,
    cache: Option<SnapshotCache>,
    settings: PlannerSettings,
    confirmed: PlannerState,
    visible: PlannerState,
    last_event_id: i64,
    pending: VecDeque<PendingMutation>,
    next_ticket: u64,
}

impl<S: PlannerStore, C: Clock> Planner<S, C> {
    pub fn new(store: S, clock: C, config: PlannerConfig) -> Self {
        let cache = config.snapshot_path.clone().map(SnapshotCache::new);
        Self {
            store,
            clock,
            config,
            cache,
            settings: PlannerSettings::default(),
            confirmed: PlannerState::default(),
            visible: PlannerState::default(),
            last_event_id: 0,
            pending: VecDeque::new(),
            next_ticket: 1,
        }
    }

    /// Loads settings, rebuilds state (snapshot plus tail, or full replay) and
    /// catches up rollover.
    ///
    /// # Errors
    /// Propagates persistence and configuration failures. Snapshot problems are
    /// recovered by full replay and never surface here.
    pub fn init(&mut self) -> Result<InitReport, PlannerError> {
        self.settings = self.load_settings()?;

        let rebuild = self.rebuild_state()?;
        self.confirmed = rebuild.state;
        self.last_event_id = rebuild.last_event_id;
        self.pending.clear();
        self.visible = self.confirmed.clone();
        debug!(
            replayed = rebuild.replayed_events,
            last_event_id = self.last_event_id,
            from_snapshot = rebuild.snapshot_event_id.is_some(),
            "planner state rebuilt"
        );

        let rollover = self.run_rollover()?;

        Ok(InitReport {
            settings: self.settings,
            restored_from_snapshot: rebuild.snapshot_event_id.is_some(),
            snapshot_event_id: rebuild.snapshot_event_id,
            replayed_events: rebuild.replayed_events,
            last_event_id: self.last_event_id,
            rollover,
        })
    }

    fn load_settings(&self) -> Result<PlannerSettings, PlannerError> {
        let mut settings = PlannerSettings::default();

        if let Some(raw) = self.store.setting(SETTING_DAY_START)? {
            settings.day_start = DayStart::parse(&raw).map_err(|err| {
                PlannerError::Configuration(format!("stored {SETTING_DAY_START} is invalid: {err}"))
            })?;
        }

        if let Some(raw) = self.store.setting(SETTING_AUTO_CARRYOVER)? {
            settings.auto_carryover = parse_bool_setting(&raw)?;
        }

        Ok(settings)
    }

    fn rebuild_state(&self) -> Result<Rebuild, PlannerError> {
        if let Some(cache) = &self.cache {
            match cache.load().and_then(|loaded| match loaded {
                Some(snapshot) => self.resume_from_snapshot(snapshot).map(Some),
                None => Ok(None),
            }) {
                Ok(Some(rebuild)) => return Ok(rebuild),
                Ok(None) => {}
                Err(PlannerError::Snapshot(reason)) => {
                    warn!(
                        path = %cache.path().display(),
                        reason = %reason,
                        "snapshot unusable; falling back to full replay"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let events = self.store.all_events()?;
        let last_event_id = events.last().map_or(0, |event| event.id);
        Ok(Rebuild {
            state: fold(PlannerState::default(), &events),
            last_event_id,
            replayed_events: events.len(),
            snapshot_event_id: None,
        })
    }

    fn resume_from_snapshot(&self, snapshot: PlannerSnapshot) -> Result<Rebuild, PlannerError> {
        let latest = self.store.latest_event_id()?.unwrap_or(0);
        if snapshot.last_event_id > latest {
            return Err(PlannerError::Snapshot(format!(
                "snapshot watermark {} is ahead of the event log ({latest})",
                snapshot.last_event_id
            )));
        }

        let tail = self.store.events_since(snapshot.last_event_id)?;
        let last_event_id = tail.last().map_or(snapshot.last_event_id, |event| event.id);
        Ok(Rebuild {
            state: fold(snapshot.state, &tail),
            last_event_id,
            replayed_events: tail.len(),
            snapshot_event_id: Some(snapshot.last_event_id),
        })
    }

    /// Applies `kind` to the visible state now and queues it for [`Planner::flush`].
    pub fn begin(&mut self, kind: EventKind) -> MutationTicket {
        let ticket = MutationTicket(self.next_ticket);
        self.next_ticket += 1;

        let event = Event {
            id: PROVISIONAL_EVENT_ID,
            recorded_at: self.clock.now(),
            kind,
        };
        apply(&mut self.visible, &event);
        self.pending.push_back(PendingMutation { ticket, event });
        ticket
    }

    /// Persists queued mutations in order.
    ///
    /// # Errors
    /// On the first failing append, that mutation is dropped, the visible state is
    /// rebuilt without it, and the error is returned. Mutations queued behind it
    /// stay queued.
    pub fn flush(&mut self) -> Result<Vec<Event>, PlannerError> {
        let mut persisted = Vec::with_capacity(self.pending.len());

        while let Some(pending) = self.pending.pop_front() {
            match self
                .store
                .append_event(&pending.event.kind, pending.event.recorded_at)
            {
                Ok(event) => {
                    apply(&mut self.confirmed, &event);
                    self.last_event_id = event.id;
                    debug!(event_id = event.id, event_type = event.kind.event_type(), "event appended");
                    persisted.push(event);
                }
                Err(err) => {
                    warn!(
                        ticket = pending.ticket.value(),
                        event_type = pending.event.kind.event_type(),
                        error = %err,
                        "rolling back optimistic mutation"
                    );
                    self.rebuild_visible();
                    return Err(err);
                }
            }
        }

        self.visible = self.confirmed.clone();
        Ok(persisted)
    }

    fn rebuild_visible(&mut self) {
        self.visible = fold(
            self.confirmed.clone(),
            self.pending.iter().map(|pending| &pending.event),
        );
    }

    fn commit(&mut self, kind: EventKind) -> Result<Event, PlannerError> {
        self.begin(kind);
        let mut persisted = self.flush()?;
        persisted
            .pop()
            .ok_or_else(|| PlannerError::Internal("flush persisted no events".to_string()))
    }

    #[must_use]
    pub fn logical_today(&self) -> LocalDate {
        logical_today(self.settings.day_start, self.clock.now())
    }

    /// Past days are sealed or about to be; nothing can be planned onto them.
    fn require_schedulable(&self, date: LocalDate) -> Result<(), PlannerError> {
        let today = self.logical_today();
        if date < today {
            return Err(PlannerError::Validation(format!(
                "cannot schedule for {date}, which is before logical today ({today})"
            )));
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`PlannerError::Validation`] for a blank title, a schedule date
    /// before logical today or a dependency on an unknown task, or the
    /// persistence error if the append fails.
    pub fn create_task(
        &mut self,
        title: &str,
        notes: Option<String>,
        due_date: Option<LocalDate>,
        scheduled_for: Option<LocalDate>,
        depends_on: Option<TaskId>,
    ) -> Result<TaskId, PlannerError> {
        let title = require_title(title)?;
        if let Some(date) = scheduled_for {
            self.require_schedulable(date)?;
        }
        if let Some(dependency) = depends_on {
            self.require_task(dependency)?;
        }

        let task_id = TaskId::generate();
        self.commit(EventKind::TaskCreated(TaskCreated {
            task_id,
            title,
            notes,
            due_date,
            scheduled_for,
            depends_on,
        }))?;
        Ok(task_id)
    }

    /// # Errors
    /// Returns [`PlannerError::NotFound`] for an unknown task,
    /// [`PlannerError::Validation`] for an empty patch, blank title, past schedule
    /// date or self dependency, or the persistence error.
    pub fn update_task(&mut self, task_id: TaskId, mut changes: TaskPatch) -> Result<(), PlannerError> {
        self.require_task(task_id)?;
        if changes.is_empty() {
            return Err(PlannerError::Validation("task update has no changes".to_string()));
        }
        if let Some(title) = changes.title.take() {
            changes.title = Some(require_title(&title)?);
        }
        if let Patch::Set(date) = changes.scheduled_for {
            self.require_schedulable(date)?;
        }
        if let Patch::Set(dependency) = changes.depends_on {
            if dependency == task_id {
                return Err(PlannerError::Validation(
                    "task cannot depend on itself".to_string(),
                ));
            }
            self.require_task(dependency)?;
        }

        self.commit(EventKind::TaskUpdated(TaskUpdated { task_id, changes }))?;
        Ok(())
    }

    /// Archives the task; its history keeps resolving.
    ///
    /// # Errors
    /// Returns [`PlannerError::NotFound`] or the persistence error.
    pub fn delete_task(&mut self, task_id: TaskId) -> Result<(), PlannerError> {
        self.require_task(task_id)?;
        self.commit(EventKind::TaskDeleted(TaskRef { task_id }))?;
        Ok(())
    }

    /// Adds the task to today's list, or removes it if already there.
    ///
    /// # Errors
    /// Returns [`PlannerError::NotFound`], [`PlannerError::Validation`] for an
    /// archived task, or the persistence error.
    pub fn toggle_task_for_today(&mut self, task_id: TaskId) -> Result<(), PlannerError> {
        self.require_live_task(task_id)?;
        let date = self.logical_today();
        self.commit(EventKind::TaskToggledToday(TaskToggledToday { task_id, date }))?;
        Ok(())
    }

    /// Flips open and done, stamping the logical day of completion.
    ///
    /// # Errors
    /// Returns [`PlannerError::NotFound`], [`PlannerError::Validation`] for an
    /// archived task, or the persistence error.
    pub fn toggle_task_completion(&mut self, task_id: TaskId) -> Result<TaskStatus, PlannerError> {
        self.require_live_task(task_id)?;
        let at = self.clock.now();
        let on = logical_today(self.settings.day_start, at);
        self.commit(EventKind::TaskToggledDone(TaskToggledDone { task_id, at, on }))?;
        self.task_status(task_id)
    }

    /// Schedules the task for `date`, or unschedules it with `None`.
    ///
    /// # Errors
    /// Returns [`PlannerError::NotFound`], [`PlannerError::Validation`] for an
    /// archived task or a date before logical today, or the persistence error.
    pub fn plan_task_for(&mut self, task_id: TaskId, date: Option<LocalDate>) -> Result<(), PlannerError> {
        self.require_live_task(task_id)?;
        if let Some(date) = date {
            self.require_schedulable(date)?;
        }
        self.commit(EventKind::TaskUpdated(TaskUpdated {
            task_id,
            changes: TaskPatch {
                scheduled_for: Patch::from_option(date),
                ..TaskPatch::default()
            },
        }))?;
        Ok(())
    }

    /// Moves the task to tomorrow's list.
    ///
    /// # Errors
    /// As [`Planner::plan_task_for`].
    pub fn skip_task_for_today(&mut self, task_id: TaskId) -> Result<LocalDate, PlannerError> {
        let tomorrow = self.logical_today().next_day();
        self.plan_task_for(task_id, Some(tomorrow))?;
        Ok(tomorrow)
    }

    /// # Errors
    /// Returns [`PlannerError::Validation`] for a blank title, or the persistence error.
    pub fn create_habit(&mut self, title: &str, notes: Option<String>) -> Result<HabitId, PlannerError> {
        let title = require_title(title)?;
        let habit_id = HabitId::generate();
        self.commit(EventKind::HabitCreated(HabitCreated {
            habit_id,
            title,
            notes,
        }))?;
        Ok(habit_id)
    }

    /// # Errors
    /// Returns [`PlannerError::NotFound`], [`PlannerError::Validation`] for an empty
    /// patch or blank title, or the persistence error.
    pub fn update_habit(&mut self, habit_id: HabitId, mut changes: HabitPatch) -> Result<(), PlannerError> {
        self.require_habit(habit_id)?;
        if changes.is_empty() {
            return Err(PlannerError::Validation("habit update has no changes".to_string()));
        }
        if let Some(title) = changes.title.take() {
            changes.title = Some(require_title(&title)?);
        }
        self.commit(EventKind::HabitUpdated(HabitUpdated { habit_id, changes }))?;
        Ok(())
    }

    /// Deactivates the habit; its history stays.
    ///
    /// # Errors
    /// Returns [`PlannerError::NotFound`] or the persistence error.
    pub fn delete_habit(&mut self, habit_id: HabitId) -> Result<(), PlannerError> {
        self.require_habit(habit_id)?;
        self.commit(EventKind::HabitDeleted(HabitRef { habit_id }))?;
        Ok(())
    }

    /// Toggles today's completion and returns whether the habit is now done.
    ///
    /// # Errors
    /// Returns [`PlannerError::NotFound`], [`PlannerError::Validation`] for an
    /// inactive habit, or the persistence error.
    pub fn toggle_habit_completion(&mut self, habit_id: HabitId) -> Result<bool, PlannerError> {
        let habit = self.require_habit(habit_id)?;
        if !habit.is_active {
            return Err(PlannerError::Validation(format!("habit {habit_id} is inactive")));
        }
        let date = self.logical_today();
        self.commit(EventKind::HabitToggledToday(HabitToggledToday { habit_id, date }))?;
        Ok(self.visible.habit_done_on(habit_id, date))
    }

    /// Seals every elapsed logical day, oldest first.
    ///
    /// # Errors
    /// Returns the persistence error of the failing day. Days sealed before it stay
    /// sealed, and the next run resumes at the failing day.
    pub fn run_rollover(&mut self) -> Result<RolloverReport, PlannerError> {
        let today = self.logical_today();

        let Some(previous) = self.store.rollover_cursor()? else {
            self.store.init_rollover_cursor(today)?;
            info!(%today, "rollover cursor initialized without backfill");
            return Ok(RolloverReport::fresh(today));
        };

        match previous.cmp(&today) {
            Ordering::Equal => return Ok(RolloverReport::idle(today, previous)),
            Ordering::Greater => {
                warn!(
                    cursor = %previous,
                    %today,
                    "rollover cursor is ahead of logical today; leaving it in place"
                );
                return Ok(RolloverReport::idle(today, previous));
            }
            Ordering::Less => {}
        }

        info!(from = %previous, %today, "rollover started");
        let mut cursor = previous;
        let mut sealed = Vec::new();

        while cursor < today {
            let seal = plan_day_seal(&self.confirmed, cursor, self.settings.auto_carryover);
            let carried = self.store.seal_day(&seal, self.clock.now())?;
            for event in &carried {
                apply(&mut self.confirmed, event);
                self.last_event_id = event.id;
            }
            self.rebuild_visible();

            info!(
                date = %seal.date,
                habit_rows = seal.habit_rows.len(),
                task_rows = seal.task_rows.len(),
                carried_over = carried.len(),
                "day sealed"
            );
            sealed.push(SealedDay::from_seal(&seal, carried.len()));
            cursor = seal.next;
        }

        info!(cursor = %cursor, days = sealed.len(), "rollover finished");
        Ok(RolloverReport {
            today,
            previous_cursor: Some(previous),
            cursor,
            fresh_cursor: false,
            sealed,
        })
    }

    /// Writes the confirmed state to the snapshot cache. Returns the watermark, or
    /// `None` when the log is still empty.
    ///
    /// # Errors
    /// Returns [`PlannerError::Configuration`] without a snapshot path, or the
    /// snapshot I/O error.
    pub fn take_snapshot(&self) -> Result<Option<i64>, PlannerError> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            PlannerError::Configuration("no snapshot path configured".to_string())
        })?;

        if self.last_event_id == 0 {
            debug!("event log empty; snapshot skipped");
            return Ok(None);
        }

        cache.store(&PlannerSnapshot::new(self.last_event_id, self.confirmed.clone()))?;
        Ok(Some(self.last_event_id))
    }

    /// Consecutive completed sealed days ending at `reference`.
    ///
    /// # Errors
    /// Returns the persistence error of the history read.
    pub fn streak(&self, habit_id: HabitId, reference: LocalDate) -> Result<u32, PlannerError> {
        let lookback = self.config.streak_lookback_days;
        let rows = self.store.habit_history_window(habit_id, reference, lookback)?;
        Ok(streak_from_rows(&rows, habit_id, reference, lookback))
    }

    /// # Errors
    /// Returns the persistence error of the history read.
    pub fn is_perfect_day(&self, date: LocalDate) -> Result<bool, PlannerError> {
        let rows = self.store.habit_history_for_day(date)?;
        Ok(is_perfect_day(&rows))
    }

    /// The open day from live state, or a past day from sealed history.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] for a future date or a past day the
    /// rollover has not sealed yet, [`PlannerError::NotFound`] for a day before
    /// the rollover origin, or the persistence error of the history read.
    pub fn day_record(&self, date: LocalDate) -> Result<DayRecord, PlannerError> {
        let today = self.logical_today();
        match date.cmp(&today) {
            Ordering::Equal => Ok(DayRecord::Live(live_snapshot(&self.visible, date))),
            Ordering::Less => {
                let sealed = matches!(self.store.rollover_cursor()?, Some(cursor) if date < cursor);
                if !sealed {
                    return Err(PlannerError::Validation(format!(
                        "{date} has not been sealed yet; run rollover first"
                    )));
                }
                let recorded = matches!(self.store.rollover_origin()?, Some(origin) if date >= origin);
                if !recorded {
                    return Err(PlannerError::NotFound(format!("no history recorded for {date}")));
                }
                let tasks = self.store.task_history_for_day(date)?;
                let habits = self.store.habit_history_for_day(date)?;
                Ok(DayRecord::Sealed(sealed_snapshot(
                    &self.visible,
                    date,
                    &tasks,
                    &habits,
                )))
            }
            Ordering::Greater => Err(PlannerError::Validation(format!(
                "{date} is after logical today ({today})"
            ))),
        }
    }

    /// Sealed per-day summaries for one calendar month.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] for an invalid month, or the persistence
    /// error of the history read.
    pub fn month_summary(&self, year: i32, month: u8) -> Result<Vec<DaySummary>, PlannerError> {
        let (first, last) = LocalDate::month_bounds(year, month)?;
        let tasks = self.store.task_history_between(first, last)?;
        let habits = self.store.habit_history_between(first, last)?;
        Ok(summarize_days(&tasks, &habits))
    }

    /// # Errors
    /// Returns the persistence error of the history reads.
    pub fn history_stats(&self) -> Result<HistoryStats, PlannerError> {
        let today = self.logical_today();
        let earliest = self.store.earliest_history_date()?;
        let recent_tasks = self
            .store
            .task_history_between(today.days_before(6), today.prev_day())?;
        let habits = match earliest {
            Some(first) => self.store.habit_history_between(first, today)?,
            None => Vec::new(),
        };
        Ok(history_stats(&self.visible, today, &recent_tasks, &habits, earliest))
    }

    /// Persists a new day start and catches up rollover under it.
    ///
    /// # Errors
    /// Returns the persistence error of the write or of the rollover.
    pub fn set_day_start(&mut self, day_start: DayStart) -> Result<RolloverReport, PlannerError> {
        self.store
            .set_setting(SETTING_DAY_START, &day_start.to_string())?;
        self.settings.day_start = day_start;
        info!(%day_start, "day start updated");
        self.run_rollover()
    }

    /// # Errors
    /// Returns the persistence error of the write.
    pub fn set_auto_carryover(&mut self, enabled: bool) -> Result<(), PlannerError> {
        self.store
            .set_setting(SETTING_AUTO_CARRYOVER, if enabled { "true" } else { "false" })?;
        self.settings.auto_carryover = enabled;
        Ok(())
    }

    /// Visible state: confirmed plus pending optimistic mutations.
    #[must_use]
    pub fn state(&self) -> &PlannerState {
        &self.visible
    }

    #[must_use]
    pub fn confirmed_state(&self) -> &PlannerState {
        &self.confirmed
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn last_event_id(&self) -> i64 {
        self.last_event_id
    }

    #[must_use]
    pub fn settings(&self) -> PlannerSettings {
        self.settings
    }

    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn task_status(&self, task_id: TaskId) -> Result<TaskStatus, PlannerError> {
        self.visible
            .task(task_id)
            .map(|task| task.status)
            .ok_or_else(|| PlannerError::NotFound(format!("task {task_id}")))
    }

    fn require_task(&self, task_id: TaskId) -> Result<(), PlannerError> {
        self.task_status(task_id).map(|_| ())
    }

    fn require_live_task(&self, task_id: TaskId) -> Result<(), PlannerError> {
        match self.task_status(task_id)? {
            TaskStatus::Archived => Err(PlannerError::Validation(format!(
                "task {task_id} is archived"
            ))),
            TaskStatus::Open | TaskStatus::Done => Ok(()),
        }
    }

    fn require_habit(&self, habit_id: HabitId) -> Result<&crate::state::Habit, PlannerError> {
        self.visible
            .habit(habit_id)
            .ok_or_else(|| PlannerError::NotFound(format!("habit {habit_id}")))
    }
}

fn require_title(title: &str) -> Result<String, PlannerError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(PlannerError::Validation("title MUST be non-empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_bool_setting(raw: &str) -> Result<bool, PlannerError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(PlannerError::Configuration(format!(
            "stored {SETTING_AUTO_CARRYOVER} must be true or false, got {raw}"
        ))),
    }
}
