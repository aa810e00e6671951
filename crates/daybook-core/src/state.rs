use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::event::{Event, EventKind};
use crate::{HabitId, LocalDate, PlannerError, TaskId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Done,
    Archived,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }

    /// Parses task status values.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] for unsupported values.
    pub fn parse(value: &str) -> Result<Self, PlannerError> {
        match value {
            "open" => Ok(Self::Open),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            _ => Err(PlannerError::Validation(format!(
                "unsupported task status: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due_date: Option<LocalDate>,
    #[serde(default)]
    pub scheduled_for: Option<LocalDate>,
    pub status: TaskStatus,
    #[serde(default)]
    pub depends_on: Option<TaskId>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub completed_on: Option<LocalDate>,
}

impl Task {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Open
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Habit {
    pub id: HabitId,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HabitCompletion {
    pub habit_id: HabitId,
    pub date: LocalDate,
}

/// Live projection of the event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct PlannerState {
    #[serde(default)]
    pub tasks: BTreeMap<TaskId, Task>,
    #[serde(default)]
    pub habits: BTreeMap<HabitId, Habit>,
    #[serde(default)]
    pub completions: BTreeSet<HabitCompletion>,
}

impl PlannerState {
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    #[must_use]
    pub fn habit(&self, habit_id: HabitId) -> Option<&Habit> {
        self.habits.get(&habit_id)
    }

    /// Tasks on the given day's list: scheduled for it, or completed on it.
    #[must_use]
    pub fn today_tasks(&self, date: LocalDate) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| match task.status {
                TaskStatus::Open => task.scheduled_for == Some(date),
                TaskStatus::Done => {
                    task.scheduled_for == Some(date) || task.completed_on == Some(date)
                }
                TaskStatus::Archived => false,
            })
            .collect()
    }

    /// Open tasks with no scheduled day.
    #[must_use]
    pub fn slate_tasks(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.is_open() && task.scheduled_for.is_none())
            .collect()
    }

    #[must_use]
    pub fn overdue_tasks(&self, date: LocalDate) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.is_open() && task.due_date.is_some_and(|due| due < date))
            .collect()
    }

    #[must_use]
    pub fn active_habits(&self) -> Vec<&Habit> {
        self.habits.values().filter(|habit| habit.is_active).collect()
    }

    #[must_use]
    pub fn habit_done_on(&self, habit_id: HabitId, date: LocalDate) -> bool {
        self.completions
            .contains(&HabitCompletion { habit_id, date })
    }
}

/// Applies one event in place. Mutations addressed to unknown ids are no-ops.
pub fn apply(state: &mut PlannerState, event: &Event) {
    let at = event.recorded_at;

    match &event.kind {
        EventKind::TaskCreated(created) => {
            state.tasks.entry(created.task_id).or_insert_with(|| Task {
                id: created.task_id,
                title: created.title.clone(),
                notes: created.notes.clone(),
                due_date: created.due_date,
                scheduled_for: created.scheduled_for,
                status: TaskStatus::Open,
                depends_on: created.depends_on,
                created_at: at,
                updated_at: at,
                completed_at: None,
                completed_on: None,
            });
        }
        EventKind::TaskUpdated(updated) => {
            if let Some(task) = state.tasks.get_mut(&updated.task_id) {
                let changes = &updated.changes;
                if let Some(title) = &changes.title {
                    task.title.clone_from(title);
                }
                changes.notes.apply_to(&mut task.notes);
                changes.due_date.apply_to(&mut task.due_date);
                changes.scheduled_for.apply_to(&mut task.scheduled_for);
                changes.depends_on.apply_to(&mut task.depends_on);
                task.updated_at = at;
            }
        }
        EventKind::TaskDeleted(deleted) => {
            if let Some(task) = state.tasks.get_mut(&deleted.task_id) {
                task.status = TaskStatus::Archived;
                task.updated_at = at;
            }
        }
        EventKind::TaskToggledToday(toggled) => {
            if let Some(task) = state.tasks.get_mut(&toggled.task_id) {
                if task.status == TaskStatus::Archived {
                    return;
                }
                task.scheduled_for = if task.scheduled_for == Some(toggled.date) {
                    None
                } else {
                    Some(toggled.date)
                };
                task.updated_at = at;
            }
        }
        EventKind::TaskToggledDone(toggled) => {
            if let Some(task) = state.tasks.get_mut(&toggled.task_id) {
                match task.status {
                    TaskStatus::Open => {
                        task.status = TaskStatus::Done;
                        task.completed_at = Some(toggled.at);
                        task.completed_on = Some(toggled.on);
                    }
                    TaskStatus::Done => {
                        task.status = TaskStatus::Open;
                        task.completed_at = None;
                        task.completed_on = None;
                    }
                    TaskStatus::Archived => return,
                }
                task.updated_at = at;
            }
        }
        EventKind::TaskCarriedOver(carried) => {
            if let Some(task) = state.tasks.get_mut(&carried.task_id) {
                if task.is_open() && task.scheduled_for == Some(carried.from) {
                    task.scheduled_for = Some(carried.to);
                    task.updated_at = at;
                }
            }
        }
        EventKind::HabitCreated(created) => {
            state.habits.entry(created.habit_id).or_insert_with(|| Habit {
                id: created.habit_id,
                title: created.title.clone(),
                notes: created.notes.clone(),
                is_active: true,
                created_at: at,
                updated_at: at,
            });
        }
        EventKind::HabitUpdated(updated) => {
            if let Some(habit) = state.habits.get_mut(&updated.habit_id) {
                if let Some(title) = &updated.changes.title {
                    habit.title.clone_from(title);
                }
                updated.changes.notes.apply_to(&mut habit.notes);
                habit.updated_at = at;
            }
        }
        EventKind::HabitDeleted(deleted) => {
            if let Some(habit) = state.habits.get_mut(&deleted.habit_id) {
                habit.is_active = false;
                habit.updated_at = at;
            }
        }
        EventKind::HabitToggledToday(toggled) => {
            if !state.habits.contains_key(&toggled.habit_id) {
                return;
            }
            let completion = HabitCompletion {
                habit_id: toggled.habit_id,
                date: toggled.date,
            };
            if !state.completions.remove(&completion) {
                state.completions.insert(completion);
            }
        }
        EventKind::Unrecognized { .. } => {}
    }
}

#[must_use]
pub fn reduce(mut state: PlannerState, event: &Event) -> PlannerState {
    apply(&mut state, event);
    state
}

#[must_use]
pub fn fold<'a, I>(initial: PlannerState, events: I) -> PlannerState
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().fold(initial, reduce)
}
