use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::planner::Planner;
use crate::rollover::RolloverReport;
use crate::store::PlannerStore;
use crate::PlannerError;

#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RolloverTrigger {
    Startup,
    Foreground,
    Tick,
    Manual,
}

impl RolloverTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Foreground => "foreground",
            Self::Tick => "tick",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TriggerOutcome {
    Completed(RolloverReport),
    /// Another rollover pass was already running; this trigger was dropped.
    Busy,
}

struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serializes rollover passes from every trigger source onto one shared planner.
pub struct DayWatcher<S, C> {
    planner: Arc<Mutex<Planner<S, C>>>,
    in_progress: Arc<AtomicBool>,
}

impl<S, C> Clone for DayWatcher<S, C> {
    fn clone(&self) -> Self {
        Self {
            planner: Arc::clone(&self.planner),
            in_progress: Arc::clone(&self.in_progress),
        }
    }
}

impl<S: PlannerStore, C: Clock> DayWatcher<S, C> {
    pub fn new(planner: Planner<S, C>) -> Self {
        Self::from_shared(Arc::new(Mutex::new(planner)))
    }

    pub fn from_shared(planner: Arc<Mutex<Planner<S, C>>>) -> Self {
        Self {
            planner,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn planner(&self) -> Arc<Mutex<Planner<S, C>>> {
        Arc::clone(&self.planner)
    }

    /// Runs one rollover pass unless one is already in flight.
    ///
    /// # Errors
    /// Returns the rollover error, or [`PlannerError::Internal`] if the planner lock
    /// was poisoned by a panicking holder.
    pub fn trigger(&self, reason: RolloverTrigger) -> Result<TriggerOutcome, PlannerError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(reason = reason.as_str(), "rollover already running; trigger dropped");
            return Ok(TriggerOutcome::Busy);
        }
        let _guard = InProgress(&self.in_progress);

        let mut planner = self
            .planner
            .lock()
            .map_err(|_| PlannerError::Internal("planner lock poisoned".to_string()))?;
        debug!(reason = reason.as_str(), "rollover triggered");
        planner.run_rollover().map(TriggerOutcome::Completed)
    }
}

impl<S, C> DayWatcher<S, C>
where
    S: PlannerStore + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Starts a background thread that triggers [`RolloverTrigger::Tick`] every
    /// `interval` until the returned handle is stopped or dropped.
    #[must_use]
    pub fn spawn_timer(&self, interval: Duration) -> TimerHandle {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let watcher = self.clone();

        let join = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = watcher.trigger(RolloverTrigger::Tick) {
                        warn!(error = %err, "periodic rollover failed; will retry on next tick");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        TimerHandle {
            stop: Some(stop_tx),
            join: Some(join),
        }
    }
}

pub struct TimerHandle {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("rollover timer thread panicked");
            }
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use time::macros::datetime;
    use time::OffsetDateTime;

    use super::*;
    use crate::clock::FixedClock;
    use crate::event::{Event, EventKind};
    use crate::history::{HabitHistoryRow, TaskHistoryRow};
    use crate::planner::PlannerConfig;
    use crate::rollover::DaySeal;
    use crate::{HabitId, LocalDate};

    /// Store that only tracks the cursor and counts seals.
    #[derive(Default)]
    struct CursorStore {
        cursor: Option<LocalDate>,
        seals: Arc<AtomicUsize>,
    }

    impl PlannerStore for CursorStore {
        fn append_event(
            &mut self,
            _kind: &EventKind,
            _recorded_at: OffsetDateTime,
        ) -> Result<Event, PlannerError> {
            Err(PlannerError::Persistence("read-only".to_string()))
        }
        fn all_events(&self) -> Result<Vec<Event>, PlannerError> {
            Ok(Vec::new())
        }
        fn events_since(&self, _last_event_id: i64) -> Result<Vec<Event>, PlannerError> {
            Ok(Vec::new())
        }
        fn latest_event_id(&self) -> Result<Option<i64>, PlannerError> {
            Ok(None)
        }
        fn rollover_cursor(&self) -> Result<Option<LocalDate>, PlannerError> {
            Ok(self.cursor)
        }
        fn init_rollover_cursor(&mut self, date: LocalDate) -> Result<(), PlannerError> {
            self.cursor.get_or_insert(date);
            Ok(())
        }
        fn rollover_origin(&self) -> Result<Option<LocalDate>, PlannerError> {
            Ok(None)
        }
        fn seal_day(
            &mut self,
            seal: &DaySeal,
            _recorded_at: OffsetDateTime,
        ) -> Result<Vec<Event>, PlannerError> {
            self.seals.fetch_add(1, Ordering::SeqCst);
            self.cursor = Some(seal.next);
            Ok(Vec::new())
        }
        fn habit_history_for_day(&self, _date: LocalDate) -> Result<Vec<HabitHistoryRow>, PlannerError> {
            Ok(Vec::new())
        }
        fn task_history_for_day(&self, _date: LocalDate) -> Result<Vec<TaskHistoryRow>, PlannerError> {
            Ok(Vec::new())
        }
        fn habit_history_window(
            &self,
            _habit_id: HabitId,
            _until: LocalDate,
            _lookback_days: u32,
        ) -> Result<Vec<HabitHistoryRow>, PlannerError> {
            Ok(Vec::new())
        }
        fn habit_history_between(
            &self,
            _from: LocalDate,
            _to: LocalDate,
        ) -> Result<Vec<HabitHistoryRow>, PlannerError> {
            Ok(Vec::new())
        }
        fn task_history_between(
            &self,
            _from: LocalDate,
            _to: LocalDate,
        ) -> Result<Vec<TaskHistoryRow>, PlannerError> {
            Ok(Vec::new())
        }
        fn earliest_history_date(&self) -> Result<Option<LocalDate>, PlannerError> {
            Ok(None)
        }
        fn setting(&self, _key: &str) -> Result<Option<String>, PlannerError> {
            Ok(None)
        }
        fn set_setting(&mut self, _key: &str, _value: &str) -> Result<(), PlannerError> {
            Ok(())
        }
    }

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn fixture_watcher(seals: Arc<AtomicUsize>) -> DayWatcher<CursorStore, FixedClock> {
        let store = CursorStore {
            cursor: None,
            seals,
        };
        let mut planner = Planner::new(
            store,
            FixedClock::new(datetime!(2024-06-01 10:00 UTC)),
            PlannerConfig::default(),
        );
        must_ok(planner.init());
        DayWatcher::new(planner)
    }

    fn advance(watcher: &DayWatcher<CursorStore, FixedClock>, days: i64) {
        let planner = watcher.planner();
        let guard = match planner.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("planner lock poisoned"),
        };
        guard.clock().advance(time::Duration::days(days));
    }

    #[test]
    fn foreground_trigger_seals_elapsed_days() {
        let seals = Arc::new(AtomicUsize::new(0));
        let watcher = fixture_watcher(Arc::clone(&seals));
        advance(&watcher, 2);

        let outcome = must_ok(watcher.trigger(RolloverTrigger::Foreground));
        let TriggerOutcome::Completed(report) = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(report.sealed.len(), 2);
        assert_eq!(seals.load(Ordering::SeqCst), 2);

        let again = must_ok(watcher.trigger(RolloverTrigger::Manual));
        assert!(matches!(again, TriggerOutcome::Completed(report) if report.sealed.is_empty()));
    }

    #[test]
    fn trigger_while_in_progress_is_busy() {
        let seals = Arc::new(AtomicUsize::new(0));
        let watcher = fixture_watcher(Arc::clone(&seals));
        advance(&watcher, 1);

        watcher.in_progress.store(true, Ordering::Release);
        assert_eq!(
            must_ok(watcher.trigger(RolloverTrigger::Tick)),
            TriggerOutcome::Busy
        );
        assert_eq!(seals.load(Ordering::SeqCst), 0);

        watcher.in_progress.store(false, Ordering::Release);
        assert!(matches!(
            must_ok(watcher.trigger(RolloverTrigger::Tick)),
            TriggerOutcome::Completed(_)
        ));
        assert_eq!(seals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timer_ticks_until_stopped() {
        let seals = Arc::new(AtomicUsize::new(0));
        let watcher = fixture_watcher(Arc::clone(&seals));
        advance(&watcher, 3);

        let timer = watcher.spawn_timer(Duration::from_millis(10));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while seals.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        timer.stop();

        assert_eq!(seals.load(Ordering::SeqCst), 3);
    }
}
