#![allow(clippy::missing_errors_doc)]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use daybook_core::{
    format_rfc3339, now_utc, parse_rfc3339, DaySeal, Event, EventKind, HabitHistoryRow, HabitId,
    LocalDate, PlannerError, PlannerStore, TaskHistoryRow, TaskId,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

const DAYBOOK_MIGRATION_VERSION: i64 = 1;
const META_ROLLOVER_CURSOR: &str = "last_processed_date";
const META_ROLLOVER_ORIGIN: &str = "rollover_origin";

const SCHEMA_DAYBOOK_V1: &str = r"
CREATE TABLE IF NOT EXISTS events (
  event_id INTEGER PRIMARY KEY AUTOINCREMENT,
  recorded_at TEXT NOT NULL,
  event_type TEXT NOT NULL,
  payload_json TEXT NOT NULL DEFAULT '{}'
);

CREATE TRIGGER IF NOT EXISTS trg_events_no_update
BEFORE UPDATE ON events
BEGIN
  SELECT RAISE(FAIL, 'events is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_events_no_delete
BEFORE DELETE ON events
BEGIN
  SELECT RAISE(FAIL, 'events is append-only');
END;

CREATE INDEX IF NOT EXISTS idx_events_type_id
  ON events(event_type, event_id);

CREATE TABLE IF NOT EXISTS task_history (
  history_id INTEGER PRIMARY KEY AUTOINCREMENT,
  date TEXT NOT NULL,
  task_id TEXT NOT NULL,
  planned INTEGER NOT NULL CHECK (planned IN (0, 1)),
  completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
  sealed_at TEXT NOT NULL,
  UNIQUE (date, task_id)
);

CREATE TRIGGER IF NOT EXISTS trg_task_history_no_update
BEFORE UPDATE ON task_history
BEGIN
  SELECT RAISE(FAIL, 'task_history is write-once');
END;

CREATE TRIGGER IF NOT EXISTS trg_task_history_no_delete
BEFORE DELETE ON task_history
BEGIN
  SELECT RAISE(FAIL, 'task_history is write-once');
END;

CREATE TABLE IF NOT EXISTS habit_history (
  history_id INTEGER PRIMARY KEY AUTOINCREMENT,
  date TEXT NOT NULL,
  habit_id TEXT NOT NULL,
  completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
  sealed_at TEXT NOT NULL,
  UNIQUE (date, habit_id)
);

CREATE TRIGGER IF NOT EXISTS trg_habit_history_no_update
BEFORE UPDATE ON habit_history
BEGIN
  SELECT RAISE(FAIL, 'habit_history is write-once');
END;

CREATE TRIGGER IF NOT EXISTS trg_habit_history_no_delete
BEFORE DELETE ON habit_history
BEGIN
  SELECT RAISE(FAIL, 'habit_history is write-once');
END;

CREATE INDEX IF NOT EXISTS idx_habit_history_habit_date
  ON habit_history(habit_id, date);

CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
";

const EVENT_COLUMNS: &str = "event_id, recorded_at, event_type, payload_json";

pub struct SqlitePlannerStore {
    conn: Connection,
}

impl SqlitePlannerStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                );",
            )
            .context("failed to ensure schema_migrations exists")?;

        self.conn
            .execute_batch(SCHEMA_DAYBOOK_V1)
            .context("failed to apply daybook schema")?;

        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![DAYBOOK_MIGRATION_VERSION, timestamp_now()?],
            )
            .context("failed to register daybook schema migration")?;

        Ok(())
    }

    pub fn schema_version(&self) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .context("failed to read schema version")
    }

    pub fn append_event(&mut self, kind: &EventKind, recorded_at: OffsetDateTime) -> Result<Event> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start event transaction")?;
        let event = insert_event(&tx, kind, recorded_at)?;
        tx.commit().context("failed to commit event transaction")?;

        debug!(event_id = event.id, event_type = kind.event_type(), "event appended");
        Ok(event)
    }

    /// Events with id greater than `after_event_id`, ascending, optionally capped.
    pub fn list_events(&self, after_event_id: i64, limit: Option<usize>) -> Result<Vec<Event>> {
        let mut query = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE event_id > ?1 ORDER BY event_id ASC"
        );

        if let Some(raw_limit) = limit {
            query.push_str(" LIMIT ");
            query.push_str(&raw_limit.to_string());
        }

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![after_event_id], parse_event_row)?;
        collect_rows(rows)
    }

    pub fn latest_event_id(&self) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT MAX(event_id) FROM events", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .context("failed to read latest event id")
    }

    pub fn event_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .context("failed to count events")
    }

    pub fn rollover_cursor(&self) -> Result<Option<LocalDate>> {
        self.meta_date(META_ROLLOVER_CURSOR)
    }

    /// The date the cursor was first seeded with.
    pub fn rollover_origin(&self) -> Result<Option<LocalDate>> {
        self.meta_date(META_ROLLOVER_ORIGIN)
    }

    /// Seeds cursor and origin together; a database that already has a cursor
    /// keeps both values.
    pub fn init_rollover_cursor(&mut self, date: LocalDate) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start cursor transaction")?;
        let seeded = tx
            .execute(
                "INSERT INTO meta(key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO NOTHING",
                params![META_ROLLOVER_CURSOR, date.to_string()],
            )
            .context("failed to initialize rollover cursor")?;
        if seeded > 0 {
            tx.execute(
                "INSERT INTO meta(key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO NOTHING",
                params![META_ROLLOVER_ORIGIN, date.to_string()],
            )
            .context("failed to record rollover origin")?;
        }
        tx.commit()
            .context("failed to commit rollover cursor")?;
        Ok(())
    }

    fn meta_date(&self, key: &str) -> Result<Option<LocalDate>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("failed to read {key}"))?;

        raw.as_deref()
            .map(|value| {
                LocalDate::parse(value).map_err(|err| anyhow!("stored {key} is invalid: {err}"))
            })
            .transpose()
    }

    /// Seals one day in a single transaction.
    ///
    /// History inserts ignore rows that already exist, and the cursor only moves
    /// forward, so re-sealing a day is harmless.
    pub fn seal_day(&mut self, seal: &DaySeal, recorded_at: OffsetDateTime) -> Result<Vec<Event>> {
        let date = seal.date.to_string();
        let sealed_at = format_rfc3339(recorded_at).map_err(|err| anyhow!(err.to_string()))?;

        let tx = self
            .conn
            .transaction()
            .context("failed to start seal transaction")?;

        let mut inserted_habits = 0_usize;
        for row in &seal.habit_rows {
            inserted_habits += tx
                .execute(
                    "INSERT INTO habit_history(date, habit_id, completed, sealed_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(date, habit_id) DO NOTHING",
                    params![
                        row.date.to_string(),
                        row.habit_id.to_string(),
                        bool_to_sql(row.completed),
                        sealed_at
                    ],
                )
                .with_context(|| format!("failed to write habit history for {date}"))?;
        }

        let mut inserted_tasks = 0_usize;
        for row in &seal.task_rows {
            inserted_tasks += tx
                .execute(
                    "INSERT INTO task_history(date, task_id, planned, completed, sealed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(date, task_id) DO NOTHING",
                    params![
                        row.date.to_string(),
                        row.task_id.to_string(),
                        bool_to_sql(row.planned),
                        bool_to_sql(row.completed),
                        sealed_at
                    ],
                )
                .with_context(|| format!("failed to write task history for {date}"))?;
        }

        let mut appended = Vec::with_capacity(seal.carry_over.len());
        for kind in &seal.carry_over {
            appended.push(insert_event(&tx, kind, recorded_at)?);
        }

        tx.execute(
            "INSERT INTO meta(key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value
             WHERE excluded.value > meta.value",
            params![META_ROLLOVER_CURSOR, seal.next.to_string()],
        )
        .with_context(|| format!("failed to advance rollover cursor past {date}"))?;

        tx.commit()
            .with_context(|| format!("failed to commit seal of {date}"))?;

        debug!(
            %date,
            inserted_habits,
            inserted_tasks,
            carried_over = appended.len(),
            "day sealed in sqlite"
        );
        Ok(appended)
    }

    pub fn habit_history_for_day(&self, date: LocalDate) -> Result<Vec<HabitHistoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, habit_id, completed FROM habit_history
             WHERE date = ?1
             ORDER BY habit_id ASC",
        )?;
        let rows = stmt.query_map(params![date.to_string()], parse_habit_history_row)?;
        collect_rows(rows)
    }

    pub fn task_history_for_day(&self, date: LocalDate) -> Result<Vec<TaskHistoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, task_id, planned, completed FROM task_history
             WHERE date = ?1
             ORDER BY task_id ASC",
        )?;
        let rows = stmt.query_map(params![date.to_string()], parse_task_history_row)?;
        collect_rows(rows)
    }

    pub fn habit_history_window(
        &self,
        habit_id: HabitId,
        until: LocalDate,
        lookback_days: u32,
    ) -> Result<Vec<HabitHistoryRow>> {
        let floor = until.days_before(lookback_days);
        let mut stmt = self.conn.prepare(
            "SELECT date, habit_id, completed FROM habit_history
             WHERE habit_id = ?1 AND date <= ?2 AND date > ?3
             ORDER BY date DESC",
        )?;
        let rows = stmt.query_map(
            params![habit_id.to_string(), until.to_string(), floor.to_string()],
            parse_habit_history_row,
        )?;
        collect_rows(rows)
    }

    pub fn habit_history_between(
        &self,
        from: LocalDate,
        to: LocalDate,
    ) -> Result<Vec<HabitHistoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, habit_id, completed FROM habit_history
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC, habit_id ASC",
        )?;
        let rows = stmt.query_map(
            params![from.to_string(), to.to_string()],
            parse_habit_history_row,
        )?;
        collect_rows(rows)
    }

    pub fn task_history_between(
        &self,
        from: LocalDate,
        to: LocalDate,
    ) -> Result<Vec<TaskHistoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, task_id, planned, completed FROM task_history
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC, task_id ASC",
        )?;
        let rows = stmt.query_map(
            params![from.to_string(), to.to_string()],
            parse_task_history_row,
        )?;
        collect_rows(rows)
    }

    pub fn earliest_history_date(&self) -> Result<Option<LocalDate>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT MIN(date) FROM (
                    SELECT date FROM habit_history
                    UNION ALL
                    SELECT date FROM task_history
                 )",
                [],
                |row| row.get(0),
            )
            .context("failed to read earliest history date")?;

        raw.as_deref()
            .map(|value| {
                LocalDate::parse(value).map_err(|err| anyhow!("invalid history date: {err}"))
            })
            .transpose()
    }

    pub fn setting(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read setting {key}"))
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings(key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("failed to write setting {key}"))?;
        Ok(())
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl PlannerStore for SqlitePlannerStore {
    fn append_event(
        &mut self,
        kind: &EventKind,
        recorded_at: OffsetDateTime,
    ) -> Result<Event, PlannerError> {
        Self::append_event(self, kind, recorded_at).map_err(persistence)
    }

    fn all_events(&self) -> Result<Vec<Event>, PlannerError> {
        self.list_events(0, None).map_err(persistence)
    }

    fn events_since(&self, last_event_id: i64) -> Result<Vec<Event>, PlannerError> {
        self.list_events(last_event_id, None).map_err(persistence)
    }

    fn latest_event_id(&self) -> Result<Option<i64>, PlannerError> {
        Self::latest_event_id(self).map_err(persistence)
    }

    fn rollover_cursor(&self) -> Result<Option<LocalDate>, PlannerError> {
        Self::rollover_cursor(self).map_err(persistence)
    }

    fn init_rollover_cursor(&mut self, date: LocalDate) -> Result<(), PlannerError> {
        Self::init_rollover_cursor(self, date).map_err(persistence)
    }

    fn rollover_origin(&self) -> Result<Option<LocalDate>, PlannerError> {
        Self::rollover_origin(self).map_err(persistence)
    }

    fn seal_day(
        &mut self,
        seal: &DaySeal,
        recorded_at: OffsetDateTime,
    ) -> Result<Vec<Event>, PlannerError> {
        Self::seal_day(self, seal, recorded_at).map_err(persistence)
    }

    fn habit_history_for_day(&self, date: LocalDate) -> Result<Vec<HabitHistoryRow>, PlannerError> {
        Self::habit_history_for_day(self, date).map_err(persistence)
    }

    fn task_history_for_day(&self, date: LocalDate) -> Result<Vec<TaskHistoryRow>, PlannerError> {
        Self::task_history_for_day(self, date).map_err(persistence)
    }

    fn habit_history_window(
        &self,
        habit_id: HabitId,
        until: LocalDate,
        lookback_days: u32,
    ) -> Result<Vec<HabitHistoryRow>, PlannerError> {
        Self::habit_history_window(self, habit_id, until, lookback_days).map_err(persistence)
    }

    fn habit_history_between(
        &self,
        from: LocalDate,
        to: LocalDate,
    ) -> Result<Vec<HabitHistoryRow>, PlannerError> {
        Self::habit_history_between(self, from, to).map_err(persistence)
    }

    fn task_history_between(
        &self,
        from: LocalDate,
        to: LocalDate,
    ) -> Result<Vec<TaskHistoryRow>, PlannerError> {
        Self::task_history_between(self, from, to).map_err(persistence)
    }

    fn earliest_history_date(&self) -> Result<Option<LocalDate>, PlannerError> {
        Self::earliest_history_date(self).map_err(persistence)
    }

    fn setting(&self, key: &str) -> Result<Option<String>, PlannerError> {
        Self::setting(self, key).map_err(persistence)
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), PlannerError> {
        Self::set_setting(self, key, value).map_err(persistence)
    }
}

#[allow(clippy::needless_pass_by_value)]
fn persistence(err: anyhow::Error) -> PlannerError {
    PlannerError::Persistence(format!("{err:#}"))
}

fn insert_event(conn: &Connection, kind: &EventKind, recorded_at: OffsetDateTime) -> Result<Event> {
    let payload = kind
        .payload_json()
        .map_err(|err| anyhow!(err.to_string()))?;

    conn.execute(
        "INSERT INTO events(recorded_at, event_type, payload_json) VALUES (?1, ?2, ?3)",
        params![
            format_rfc3339(recorded_at).map_err(|err| anyhow!(err.to_string()))?,
            kind.event_type(),
            serde_json::to_string(&payload).context("failed to serialize payload_json")?,
        ],
    )
    .with_context(|| format!("failed to append {} event", kind.event_type()))?;

    Ok(Event {
        id: conn.last_insert_rowid(),
        recorded_at,
        kind: kind.clone(),
    })
}

fn timestamp_now() -> Result<String> {
    format_rfc3339(now_utc()).map_err(|err| anyhow!(err.to_string()))
}

fn parse_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let recorded_at_raw: String = row.get(1)?;
    let event_type: String = row.get(2)?;
    let payload_raw: String = row.get(3)?;

    let recorded_at = parse_rfc3339(&recorded_at_raw).map_err(|err| to_sql_error(1, &err))?;
    let payload: Value = serde_json::from_str(&payload_raw).map_err(|err| {
        invalid_data(3, Type::Text, format!("invalid payload_json: {err}"))
    })?;
    let kind = EventKind::from_parts(&event_type, payload).map_err(|err| to_sql_error(3, &err))?;

    Ok(Event {
        id: row.get(0)?,
        recorded_at,
        kind,
    })
}

fn parse_habit_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HabitHistoryRow> {
    let date_raw: String = row.get(0)?;
    let habit_id_raw: String = row.get(1)?;

    Ok(HabitHistoryRow {
        date: LocalDate::parse(&date_raw).map_err(|err| to_sql_error(0, &err))?,
        habit_id: HabitId::parse(&habit_id_raw).map_err(|err| to_sql_error(1, &err))?,
        completed: row.get::<_, i64>(2)? == 1,
    })
}

fn parse_task_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskHistoryRow> {
    let date_raw: String = row.get(0)?;
    let task_id_raw: String = row.get(1)?;

    Ok(TaskHistoryRow {
        date: LocalDate::parse(&date_raw).map_err(|err| to_sql_error(0, &err))?,
        task_id: TaskId::parse(&task_id_raw).map_err(|err| to_sql_error(1, &err))?,
        planned: row.get::<_, i64>(2)? == 1,
        completed: row.get::<_, i64>(3)? == 1,
    })
}

fn bool_to_sql(value: bool) -> i64 {
    i64::from(value)
}

fn invalid_data(column: usize, column_type: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        column_type,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message,
        )),
    )
}

fn to_sql_error(column: usize, err: &PlannerError) -> rusqlite::Error {
    invalid_data(column, Type::Text, err.to_string())
}

fn collect_rows<T>(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::too_many_lines)]

    use daybook_core::{
        fold, Clock, DayStart, FixedClock, HabitCreated, Planner, PlannerConfig, PlannerState,
        TaskCarriedOver, TaskCreated, TaskRef, TaskStatus,
    };
    use proptest::prelude::*;
    use serde_json::json;
    use time::macros::datetime;
    use ulid::Ulid;

    use super::*;

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err:#}"),
        }
    }

    fn must_ok<T, E: std::fmt::Display>(result: std::result::Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn fixture_store() -> SqlitePlannerStore {
        let store = must(SqlitePlannerStore::open_in_memory());
        must(store.migrate());
        store
    }

    fn date(raw: &str) -> LocalDate {
        must_ok(LocalDate::parse(raw))
    }

    fn stamp() -> OffsetDateTime {
        datetime!(2024-06-01 12:00 UTC)
    }

    fn temp_db_path(label: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("daybook-{label}-{}.sqlite3", Ulid::new()))
    }

    fn remove_db(path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            let _ = std::fs::remove_file(std::path::PathBuf::from(file));
        }
    }

    fn fixture_task(title: &str, scheduled_for: Option<LocalDate>) -> EventKind {
        EventKind::TaskCreated(TaskCreated {
            task_id: TaskId::generate(),
            title: title.to_string(),
            notes: None,
            due_date: None,
            scheduled_for,
            depends_on: None,
        })
    }

    #[test]
    fn migrate_is_idempotent() {
        let store = fixture_store();
        must(store.migrate());
        assert_eq!(must(store.schema_version()), Some(DAYBOOK_MIGRATION_VERSION));
    }

    #[test]
    fn append_assigns_increasing_ids_and_round_trips() {
        let mut store = fixture_store();
        let first = must(store.append_event(&fixture_task("One", None), stamp()));
        let second = must(store.append_event(&fixture_task("Two", Some(date("2024-06-01"))), stamp()));
        assert!(first.id < second.id);

        let loaded = must(store.list_events(0, None));
        assert_eq!(loaded, vec![first.clone(), second.clone()]);
        assert_eq!(must(store.list_events(first.id, None)), vec![second.clone()]);
        assert_eq!(must(store.list_events(0, Some(1))), vec![first]);
        assert_eq!(must(store.latest_event_id()), Some(second.id));
        assert_eq!(must(store.event_count()), 2);
    }

    #[test]
    fn append_only_trigger_blocks_updates_and_deletes() {
        let mut store = fixture_store();
        let event = must(store.append_event(&fixture_task("Immutable", None), stamp()));

        let update_result = store.connection().execute(
            "UPDATE events SET event_type = 'mutated' WHERE event_id = ?1",
            params![event.id],
        );
        assert!(update_result.is_err());

        let delete_result = store
            .connection()
            .execute("DELETE FROM events WHERE event_id = ?1", params![event.id]);
        assert!(delete_result.is_err());
    }

    #[test]
    fn history_tables_are_write_once() {
        let mut store = fixture_store();
        let habit_id = HabitId::generate();
        let day = date("2024-06-01");
        must(store.seal_day(&DaySeal {
            date: day,
            next: day.next_day(),
            habit_rows: vec![HabitHistoryRow {
                date: day,
                habit_id,
                completed: false,
            }],
            task_rows: Vec::new(),
            carry_over: Vec::new(),
        }, stamp()));

        assert!(store
            .connection()
            .execute("UPDATE habit_history SET completed = 1", [])
            .is_err());
        assert!(store
            .connection()
            .execute("DELETE FROM habit_history", [])
            .is_err());
    }

    #[test]
    fn unknown_event_type_loads_as_unrecognized() {
        let store = fixture_store();
        must_ok(store.connection().execute(
            "INSERT INTO events(recorded_at, event_type, payload_json) VALUES (?1, ?2, ?3)",
            params!["2024-06-01T10:00:00Z", "goal_created", r#"{"goal":"x"}"#],
        ));

        let events = must(store.list_events(0, None));
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::Unrecognized {
                event_type: "goal_created".to_string(),
                payload: json!({ "goal": "x" }),
            }
        );
    }

    #[test]
    fn malformed_known_payload_fails_to_load() {
        let store = fixture_store();
        must_ok(store.connection().execute(
            "INSERT INTO events(recorded_at, event_type, payload_json) VALUES (?1, ?2, ?3)",
            params!["2024-06-01T10:00:00Z", "task_deleted", r#"{"task_id":42}"#],
        ));
        assert!(store.list_events(0, None).is_err());
        assert!(matches!(
            PlannerStore::all_events(&store),
            Err(PlannerError::Persistence(_))
        ));
    }

    #[test]
    fn seal_day_is_idempotent_and_cursor_never_regresses() {
        let mut store = fixture_store();
        let habit_id = HabitId::generate();
        let task_id = TaskId::generate();
        let d1 = date("2024-06-01");
        let d2 = date("2024-06-02");

        let seal = DaySeal {
            date: d1,
            next: d2,
            habit_rows: vec![HabitHistoryRow {
                date: d1,
                habit_id,
                completed: true,
            }],
            task_rows: vec![TaskHistoryRow {
                date: d1,
                task_id,
                planned: true,
                completed: false,
            }],
            carry_over: vec![EventKind::TaskCarriedOver(TaskCarriedOver {
                task_id,
                from: d1,
                to: d2,
            })],
        };

        must(store.init_rollover_cursor(d1));
        let carried = must(store.seal_day(&seal, stamp()));
        assert_eq!(carried.len(), 1);
        assert_eq!(must(store.rollover_cursor()), Some(d2));

        let mut conflicting = seal.clone();
        conflicting.habit_rows[0].completed = false;
        conflicting.carry_over.clear();
        must(store.seal_day(&conflicting, stamp()));
        let habits = must(store.habit_history_for_day(d1));
        assert_eq!(habits.len(), 1);
        assert!(habits[0].completed);
        assert_eq!(must(store.task_history_for_day(d1)).len(), 1);

        let mut stale = conflicting;
        stale.next = d1;
        must(store.seal_day(&stale, stamp()));
        assert_eq!(must(store.rollover_cursor()), Some(d2));

        must(store.init_rollover_cursor(date("2023-01-01")));
        assert_eq!(must(store.rollover_cursor()), Some(d2));
        assert_eq!(must(store.rollover_origin()), Some(d1));
    }

    #[test]
    fn origin_is_recorded_only_when_the_cursor_is_seeded() {
        let mut store = fixture_store();
        assert_eq!(must(store.rollover_origin()), None);

        let d1 = date("2024-06-01");
        must(store.init_rollover_cursor(d1));
        must(store.init_rollover_cursor(date("2024-07-01")));
        assert_eq!(must(store.rollover_origin()), Some(d1));
        assert_eq!(must(store.rollover_cursor()), Some(d1));
    }

    #[test]
    fn planner_writes_its_clock_time_not_wall_time() {
        let clock = FixedClock::new(datetime!(2020-01-01 10:00 UTC));
        let mut planner = Planner::new(fixture_store(), clock.clone(), PlannerConfig::default());
        must_ok(planner.init());
        let task = must_ok(planner.create_task(
            "Frozen time",
            None,
            None,
            Some(date("2020-01-01")),
            None,
        ));
        assert_eq!(
            planner.state().task(task).map(|task| task.created_at),
            Some(clock.now())
        );

        clock.set(datetime!(2020-01-02 09:30 UTC));
        must_ok(planner.run_rollover());

        let stamps: Vec<OffsetDateTime> = must(planner.store().list_events(0, None))
            .iter()
            .map(|event| event.recorded_at)
            .collect();
        assert_eq!(
            stamps,
            vec![datetime!(2020-01-01 10:00 UTC), datetime!(2020-01-02 09:30 UTC)]
        );

        let sealed_at: String = must_ok(planner.store().connection().query_row(
            "SELECT sealed_at FROM task_history WHERE date = '2020-01-01'",
            [],
            |row| row.get(0),
        ));
        assert_eq!(sealed_at, "2020-01-02T09:30:00Z");
    }

    #[test]
    fn failed_seal_rolls_back_the_whole_day() {
        let mut store = fixture_store();
        let task_id = TaskId::generate();
        let d1 = date("2024-06-01");
        must(store.init_rollover_cursor(d1));
        must_ok(store.connection().execute_batch(
            "CREATE TRIGGER trg_test_reject_task_history
             BEFORE INSERT ON task_history
             BEGIN
               SELECT RAISE(FAIL, 'simulated crash');
             END;",
        ));

        let seal = DaySeal {
            date: d1,
            next: d1.next_day(),
            habit_rows: vec![HabitHistoryRow {
                date: d1,
                habit_id: HabitId::generate(),
                completed: true,
            }],
            task_rows: vec![TaskHistoryRow {
                date: d1,
                task_id,
                planned: true,
                completed: false,
            }],
            carry_over: vec![EventKind::TaskCarriedOver(TaskCarriedOver {
                task_id,
                from: d1,
                to: d1.next_day(),
            })],
        };

        assert!(store.seal_day(&seal, stamp()).is_err());
        assert_eq!(must(store.rollover_cursor()), Some(d1));
        assert!(must(store.habit_history_for_day(d1)).is_empty());
        assert_eq!(must(store.event_count()), 0);

        must_ok(
            store
                .connection()
                .execute_batch("DROP TRIGGER trg_test_reject_task_history;"),
        );
        must(store.seal_day(&seal, stamp()));
        assert_eq!(must(store.rollover_cursor()), Some(d1.next_day()));
        assert_eq!(must(store.event_count()), 1);
    }

    #[test]
    fn history_queries_filter_by_habit_and_range() {
        let mut store = fixture_store();
        let walk = HabitId::generate();
        let read = HabitId::generate();
        let mut day = date("2024-06-01");
        for completed in [true, true, false, true] {
            must(store.seal_day(&DaySeal {
                date: day,
                next: day.next_day(),
                habit_rows: vec![
                    HabitHistoryRow { date: day, habit_id: walk, completed },
                    HabitHistoryRow { date: day, habit_id: read, completed: true },
                ],
                task_rows: Vec::new(),
                carry_over: Vec::new(),
            }, stamp()));
            day = day.next_day();
        }

        let window = must(store.habit_history_window(walk, date("2024-06-04"), 2));
        let dates: Vec<String> = window.iter().map(|row| row.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-06-04", "2024-06-03"]);

        let range = must(store.habit_history_between(date("2024-06-02"), date("2024-06-03")));
        assert_eq!(range.len(), 4);
        assert_eq!(must(store.earliest_history_date()), Some(date("2024-06-01")));
        assert_eq!(must(store.rollover_cursor()), Some(date("2024-06-05")));
    }

    #[test]
    fn settings_upsert() {
        let store = fixture_store();
        assert_eq!(must(store.setting("day_start")), None);
        must(store.set_setting("day_start", "05:30"));
        must(store.set_setting("day_start", "06:00"));
        assert_eq!(must(store.setting("day_start")).as_deref(), Some("06:00"));
    }

    #[test]
    fn planner_over_sqlite_survives_restart_after_multi_day_gap() {
        let path = temp_db_path("restart");
        let clock = FixedClock::new(datetime!(2024-06-01 09:00 UTC));

        let (task, habit) = {
            let store = must(SqlitePlannerStore::open(&path));
            must(store.migrate());
            let mut planner = Planner::new(store, clock.clone(), PlannerConfig::default());
            must_ok(planner.init());
            let task = must_ok(planner.create_task(
                "Book dentist",
                None,
                None,
                Some(date("2024-06-01")),
                None,
            ));
            let habit = must_ok(planner.create_habit("Walk", None));
            must_ok(planner.toggle_habit_completion(habit));
            (task, habit)
        };

        clock.advance(time::Duration::days(3));
        let store = must(SqlitePlannerStore::open(&path));
        must(store.migrate());
        let mut planner = Planner::new(store, clock, PlannerConfig::default());
        let report = must_ok(planner.init());

        let sealed: Vec<String> = report
            .rollover
            .sealed
            .iter()
            .map(|day| day.date.to_string())
            .collect();
        assert_eq!(sealed, vec!["2024-06-01", "2024-06-02", "2024-06-03"]);
        assert_eq!(
            must_ok(planner.store().rollover_cursor()),
            Some(date("2024-06-04"))
        );

        let state = planner.state();
        let carried = match state.task(task) {
            Some(task) => task,
            None => panic!("task should survive restart"),
        };
        assert_eq!(carried.status, TaskStatus::Open);
        assert_eq!(carried.scheduled_for, Some(date("2024-06-04")));

        for day in ["2024-06-01", "2024-06-02", "2024-06-03"] {
            let rows = must(planner.store().task_history_for_day(date(day)));
            assert_eq!(rows.len(), 1);
            assert!(rows[0].planned && !rows[0].completed);
        }
        assert_eq!(must_ok(planner.streak(habit, date("2024-06-01"))), 1);
        assert!(must_ok(planner.is_perfect_day(date("2024-06-01"))));
        assert!(!must_ok(planner.is_perfect_day(date("2024-06-02"))));

        let replayed = fold(
            PlannerState::default(),
            &must(planner.store().list_events(0, None)),
        );
        assert_eq!(&replayed, planner.confirmed_state());

        drop(planner);
        remove_db(&path);
    }

    #[test]
    fn day_start_setting_persists_across_open() {
        let path = temp_db_path("settings");
        let clock = FixedClock::new(datetime!(2024-06-02 05:00 UTC));
        {
            let store = must(SqlitePlannerStore::open(&path));
            must(store.migrate());
            let mut planner = Planner::new(store, clock.clone(), PlannerConfig::default());
            must_ok(planner.init());
            must_ok(planner.set_day_start(must_ok(DayStart::parse("06:00"))));
            must_ok(planner.set_auto_carryover(false));
        }

        let store = must(SqlitePlannerStore::open(&path));
        must(store.migrate());
        let mut planner = Planner::new(store, clock, PlannerConfig::default());
        let report = must_ok(planner.init());
        assert_eq!(report.settings.day_start.to_string(), "06:00");
        assert!(!report.settings.auto_carryover);
        assert_eq!(planner.logical_today(), date("2024-06-01"));

        drop(planner);
        remove_db(&path);
    }

    #[test]
    fn archived_task_history_keeps_title() {
        let mut planner = Planner::new(
            fixture_store(),
            FixedClock::new(datetime!(2024-06-01 09:00 UTC)),
            PlannerConfig::default(),
        );
        must_ok(planner.init());
        let task = must_ok(planner.create_task("Old chore", None, None, Some(date("2024-06-01")), None));
        planner.clock().advance(time::Duration::days(1));
        must_ok(planner.run_rollover());
        must_ok(planner.delete_task(task));

        let record = must_ok(planner.day_record(date("2024-06-01")));
        assert!(record.is_sealed());
        assert_eq!(record.snapshot().tasks[0].title.as_deref(), Some("Old chore"));
    }

    fn arb_kinds() -> impl Strategy<Value = Vec<EventKind>> {
        let task_ids: Vec<TaskId> = (1..=3_u128).map(|n| TaskId(Ulid(n))).collect();
        let habit_ids: Vec<HabitId> = (10..=11_u128).map(|n| HabitId(Ulid(n))).collect();
        let task = proptest::sample::select(task_ids);
        let habit = proptest::sample::select(habit_ids);

        let kind = prop_oneof![
            task.clone().prop_map(|task_id| EventKind::TaskCreated(TaskCreated {
                task_id,
                title: "Generated".to_string(),
                notes: None,
                due_date: None,
                scheduled_for: None,
                depends_on: None,
            })),
            task.prop_map(|task_id| EventKind::TaskDeleted(TaskRef { task_id })),
            habit.prop_map(|habit_id| EventKind::HabitCreated(HabitCreated {
                habit_id,
                title: "Generated".to_string(),
                notes: None,
            })),
        ];
        proptest::collection::vec(kind, 0..24)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn snapshot_split_matches_full_replay(kinds in arb_kinds(), split in 0_i64..24) {
            let mut store = fixture_store();
            for kind in &kinds {
                must(store.append_event(kind, stamp()));
            }

            let all = must(store.list_events(0, None));
            let full = fold(PlannerState::default(), &all);

            let watermark = split.min(must(store.latest_event_id()).unwrap_or(0));
            let prefix: Vec<Event> = all.iter().filter(|event| event.id <= watermark).cloned().collect();
            let snapshot_state = fold(PlannerState::default(), &prefix);
            let tail = must(store.list_events(watermark, None));
            prop_assert_eq!(fold(snapshot_state, &tail), full);
        }
    }
}
