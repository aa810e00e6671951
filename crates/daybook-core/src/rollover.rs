use serde::Serialize;

use crate::event::{EventKind, TaskCarriedOver};
use crate::history::{day_task_rows, HabitHistoryRow, TaskHistoryRow};
use crate::state::PlannerState;
use crate::LocalDate;

/// Everything needed to seal one logical day, computed from live state.
///
/// A store applies the whole plan atomically: history rows, carry-over events,
/// then the cursor moves to `next`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DaySeal {
    pub date: LocalDate,
    pub next: LocalDate,
    pub habit_rows: Vec<HabitHistoryRow>,
    pub task_rows: Vec<TaskHistoryRow>,
    pub carry_over: Vec<EventKind>,
}

#[must_use]
pub fn plan_day_seal(state: &PlannerState, date: LocalDate, auto_carryover: bool) -> DaySeal {
    let next = date.next_day();

    let habit_rows = state
        .active_habits()
        .into_iter()
        .map(|habit| HabitHistoryRow {
            date,
            habit_id: habit.id,
            completed: state.habit_done_on(habit.id, date),
        })
        .collect();

    let task_rows = day_task_rows(state, date);
    let carry_over = if auto_carryover {
        state
            .tasks
            .values()
            .filter(|task| task.is_open() && task.scheduled_for == Some(date))
            .map(|task| {
                EventKind::TaskCarriedOver(TaskCarriedOver {
                    task_id: task.id,
                    from: date,
                    to: next,
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    DaySeal {
        date,
        next,
        habit_rows,
        task_rows,
        carry_over,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
pub struct SealedDay {
    pub date: LocalDate,
    pub habit_rows: usize,
    pub task_rows: usize,
    pub carried_over: usize,
}

impl SealedDay {
    #[must_use]
    pub fn from_seal(seal: &DaySeal, carried_over: usize) -> Self {
        Self {
            date: seal.date,
            habit_rows: seal.habit_rows.len(),
            task_rows: seal.task_rows.len(),
            carried_over,
        }
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct RolloverReport {
    pub today: LocalDate,
    pub previous_cursor: Option<LocalDate>,
    pub cursor: LocalDate,
    pub fresh_cursor: bool,
    pub sealed: Vec<SealedDay>,
}

impl RolloverReport {
    #[must_use]
    pub fn fresh(today: LocalDate) -> Self {
        Self {
            today,
            previous_cursor: None,
            cursor: today,
            fresh_cursor: true,
            sealed: Vec::new(),
        }
    }

    #[must_use]
    pub fn idle(today: LocalDate, cursor: LocalDate) -> Self {
        Self {
            today,
            previous_cursor: Some(cursor),
            cursor,
            fresh_cursor: false,
            sealed: Vec::new(),
        }
    }
}
