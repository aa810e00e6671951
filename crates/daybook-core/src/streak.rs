use std::collections::BTreeMap;

use crate::history::HabitHistoryRow;
use crate::{HabitId, LocalDate};

pub const DEFAULT_STREAK_LOOKBACK_DAYS: u32 = 365;

/// Consecutive completed days for `habit_id` ending at `reference`.
///
/// A missing row or a row with `completed = false` ends the streak. At most
/// `lookback_days` days are examined.
#[must_use]
pub fn streak_from_rows(
    rows: &[HabitHistoryRow],
    habit_id: HabitId,
    reference: LocalDate,
    lookback_days: u32,
) -> u32 {
    let by_date: BTreeMap<LocalDate, bool> = rows
        .iter()
        .filter(|row| row.habit_id == habit_id && row.date <= reference)
        .map(|row| (row.date, row.completed))
        .collect();

    let mut streak = 0;
    let mut cursor = reference;
    while streak < lookback_days {
        match by_date.get(&cursor) {
            Some(true) => {
                streak += 1;
                cursor = cursor.prev_day();
            }
            _ => break,
        }
    }
    streak
}

/// A day is perfect when at least one habit was tracked and all were completed.
#[must_use]
pub fn is_perfect_day(rows: &[HabitHistoryRow]) -> bool {
    !rows.is_empty() && rows.iter().all(|row| row.completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> LocalDate {
        match LocalDate::parse(raw) {
            Ok(value) => value,
            Err(err) => panic!("bad fixture date {raw}: {err}"),
        }
    }

    fn row(habit_id: HabitId, raw: &str, completed: bool) -> HabitHistoryRow {
        HabitHistoryRow {
            date: date(raw),
            habit_id,
            completed,
        }
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let habit = HabitId::generate();
        let rows = vec![
            row(habit, "2024-06-10", true),
            row(habit, "2024-06-09", true),
            row(habit, "2024-06-08", true),
            row(habit, "2024-06-06", true),
        ];
        assert_eq!(streak_from_rows(&rows, habit, date("2024-06-10"), 365), 3);
    }

    #[test]
    fn streak_stops_at_incomplete_day() {
        let habit = HabitId::generate();
        let rows = vec![
            row(habit, "2024-06-10", true),
            row(habit, "2024-06-09", false),
            row(habit, "2024-06-08", true),
        ];
        assert_eq!(streak_from_rows(&rows, habit, date("2024-06-10"), 365), 1);
    }

    #[test]
    fn streak_is_zero_without_row_on_reference() {
        let habit = HabitId::generate();
        let rows = vec![row(habit, "2024-06-09", true)];
        assert_eq!(streak_from_rows(&rows, habit, date("2024-06-10"), 365), 0);
    }

    #[test]
    fn streak_ignores_other_habits_and_respects_lookback() {
        let habit = HabitId::generate();
        let other = HabitId::generate();
        let rows = vec![
            row(habit, "2024-06-10", true),
            row(habit, "2024-06-09", true),
            row(habit, "2024-06-08", true),
            row(other, "2024-06-07", true),
        ];
        assert_eq!(streak_from_rows(&rows, habit, date("2024-06-10"), 2), 2);
        assert_eq!(streak_from_rows(&rows, other, date("2024-06-10"), 365), 0);
    }

    #[test]
    fn perfect_day_rules() {
        let a = HabitId::generate();
        let b = HabitId::generate();
        assert!(is_perfect_day(&[row(a, "2024-06-01", true), row(b, "2024-06-01", true)]));
        assert!(!is_perfect_day(&[row(a, "2024-06-01", true), row(b, "2024-06-01", false)]));
        assert!(!is_perfect_day(&[]));
    }
}
