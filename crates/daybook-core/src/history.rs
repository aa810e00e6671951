use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::PlannerState;
use crate::streak::is_perfect_day;
use crate::{HabitId, LocalDate, TaskId};

/// Finalized habit outcome for one sealed day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct HabitHistoryRow {
    pub date: LocalDate,
    pub habit_id: HabitId,
    pub completed: bool,
}

/// Finalized task outcome for one sealed day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct TaskHistoryRow {
    pub date: LocalDate,
    pub task_id: TaskId,
    pub planned: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct DayTask {
    pub task_id: TaskId,
    pub title: Option<String>,
    pub planned: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct DayHabit {
    pub habit_id: HabitId,
    pub title: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct DaySnapshot {
    pub date: LocalDate,
    pub tasks: Vec<DayTask>,
    pub habits: Vec<DayHabit>,
    pub perfect_day: bool,
}

/// A day as seen by the history layer: still open, or sealed into history.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "source", content = "day", rename_all = "snake_case")]
pub enum DayRecord {
    Live(DaySnapshot),
    Sealed(DaySnapshot),
}

impl DayRecord {
    #[must_use]
    pub fn snapshot(&self) -> &DaySnapshot {
        match self {
            Self::Live(snapshot) | Self::Sealed(snapshot) => snapshot,
        }
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct DaySummary {
    pub date: LocalDate,
    pub tasks_planned: u32,
    pub tasks_completed: u32,
    pub habits_tracked: u32,
    pub habits_completed: u32,
    pub perfect_day: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct HistoryStats {
    pub today: LocalDate,
    pub tasks_completed_last_7_days: u32,
    pub perfect_day_count: u32,
    pub earliest_date: Option<LocalDate>,
}

/// Task rows for `date` as live state sees them: the day's list, archived tasks
/// excluded. Sealing writes exactly these rows, so a live day and its sealed
/// record hold the same tasks.
#[must_use]
pub fn day_task_rows(state: &PlannerState, date: LocalDate) -> Vec<TaskHistoryRow> {
    state
        .today_tasks(date)
        .into_iter()
        .map(|task| TaskHistoryRow {
            date,
            task_id: task.id,
            planned: task.scheduled_for == Some(date),
            completed: task.completed_on == Some(date),
        })
        .collect()
}

/// Composes the open day from live state.
///
/// Habits are the active ones; the day's perfect flag uses the same rule as
/// sealed days, so it reads as "perfect so far".
#[must_use]
pub fn live_snapshot(state: &PlannerState, date: LocalDate) -> DaySnapshot {
    let tasks = day_task_rows(state, date)
        .into_iter()
        .map(|row| DayTask {
            task_id: row.task_id,
            title: state.task(row.task_id).map(|task| task.title.clone()),
            planned: row.planned,
            completed: row.completed,
        })
        .collect();

    let habits: Vec<DayHabit> = state
        .active_habits()
        .into_iter()
        .map(|habit| DayHabit {
            habit_id: habit.id,
            title: Some(habit.title.clone()),
            completed: state.habit_done_on(habit.id, date),
        })
        .collect();

    let perfect_day = !habits.is_empty() && habits.iter().all(|habit| habit.completed);

    DaySnapshot {
        date,
        tasks,
        habits,
        perfect_day,
    }
}

/// Composes a sealed day from its history rows, resolving titles from state.
#[must_use]
pub fn sealed_snapshot(
    state: &PlannerState,
    date: LocalDate,
    task_rows: &[TaskHistoryRow],
    habit_rows: &[HabitHistoryRow],
) -> DaySnapshot {
    let tasks = task_rows
        .iter()
        .filter(|row| row.date == date)
        .map(|row| DayTask {
            task_id: row.task_id,
            title: state.task(row.task_id).map(|task| task.title.clone()),
            planned: row.planned,
            completed: row.completed,
        })
        .collect();

    let day_habits: Vec<HabitHistoryRow> = habit_rows
        .iter()
        .filter(|row| row.date == date)
        .copied()
        .collect();

    let habits = day_habits
        .iter()
        .map(|row| DayHabit {
            habit_id: row.habit_id,
            title: state.habit(row.habit_id).map(|habit| habit.title.clone()),
            completed: row.completed,
        })
        .collect();

    DaySnapshot {
        date,
        tasks,
        habits,
        perfect_day: is_perfect_day(&day_habits),
    }
}

/// Per-date counts over sealed rows, ascending by date.
#[must_use]
pub fn summarize_days(
    task_rows: &[TaskHistoryRow],
    habit_rows: &[HabitHistoryRow],
) -> Vec<DaySummary> {
    let mut days: BTreeMap<LocalDate, (DaySummary, Vec<HabitHistoryRow>)> = BTreeMap::new();
    let blank = |date| DaySummary {
        date,
        tasks_planned: 0,
        tasks_completed: 0,
        habits_tracked: 0,
        habits_completed: 0,
        perfect_day: false,
    };

    for row in task_rows {
        let (summary, _) = days
            .entry(row.date)
            .or_insert_with(|| (blank(row.date), Vec::new()));
        summary.tasks_planned += u32::from(row.planned);
        summary.tasks_completed += u32::from(row.completed);
    }

    for row in habit_rows {
        let (summary, rows) = days
            .entry(row.date)
            .or_insert_with(|| (blank(row.date), Vec::new()));
        summary.habits_tracked += 1;
        summary.habits_completed += u32::from(row.completed);
        rows.push(*row);
    }

    days.into_values()
        .map(|(mut summary, rows)| {
            summary.perfect_day = is_perfect_day(&rows);
            summary
        })
        .collect()
}

/// Aggregate history figures.
///
/// `recent_task_rows` are the sealed rows of the six days before `today`; the open
/// day contributes its live completions so the window covers seven days.
#[must_use]
pub fn history_stats(
    state: &PlannerState,
    today: LocalDate,
    recent_task_rows: &[TaskHistoryRow],
    all_habit_rows: &[HabitHistoryRow],
    earliest_date: Option<LocalDate>,
) -> HistoryStats {
    let window_start = today.days_before(6);
    let sealed_completed = recent_task_rows
        .iter()
        .filter(|row| row.completed && row.date >= window_start && row.date < today)
        .count();
    let live_completed = state
        .tasks
        .values()
        .filter(|task| task.is_done() && task.completed_on == Some(today))
        .count();

    let perfect_day_count = summarize_days(&[], all_habit_rows)
        .iter()
        .filter(|summary| summary.perfect_day)
        .count();

    HistoryStats {
        today,
        tasks_completed_last_7_days: saturating_u32(sealed_completed + live_completed),
        perfect_day_count: saturating_u32(perfect_day_count),
        earliest_date,
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
