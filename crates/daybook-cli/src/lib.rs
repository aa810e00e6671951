//! Command surface for the `daybook` binary.
//!
//! Embedders can drive the planner through:
//! - [`run_cli`] for full parsed CLI execution, printing to stdout.
//! - [`run_command_with_db`] for direct [`Command`] execution against a DB path.
//! - [`run_command`] for execution against an already initialized planner.

#![allow(clippy::missing_errors_doc)]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use daybook_core::{
    format_rfc3339, parse_rfc3339, Clock, DayStart, DaySummary, Event, FixedClock, Habit,
    HabitId, HabitPatch, InitReport, LocalDate, Patch, Planner, PlannerConfig, SystemClock, Task,
    TaskId, TaskPatch,
};
use daybook_store_sqlite::SqlitePlannerStore;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

pub type CliPlanner = Planner<SqlitePlannerStore, FixedClock>;

#[derive(Debug, Parser)]
#[command(name = "daybook")]
#[command(about = "Daybook task and habit planner")]
pub struct Cli {
    #[arg(long, default_value = "./daybook.sqlite3")]
    db: PathBuf,

    /// Snapshot cache file; defaults to `<db>.snapshot.json`.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Pins the current time (RFC3339) for this invocation.
    #[arg(long)]
    now: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    Habit {
        #[command(subcommand)]
        command: HabitCommand,
    },
    Rollover {
        #[command(subcommand)]
        command: RolloverCommand,
    },
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    Add(TaskAddArgs),
    Update(TaskUpdateArgs),
    /// Toggles completion.
    Done(TaskIdArgs),
    /// Adds to or removes from today's list.
    Today(TaskIdArgs),
    Plan(TaskPlanArgs),
    /// Moves the task to tomorrow.
    Skip(TaskIdArgs),
    Delete(TaskIdArgs),
    List(TaskListArgs),
}

#[derive(Debug, Args)]
pub struct TaskAddArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    due: Option<LocalDate>,
    #[arg(long, conflicts_with = "today")]
    scheduled_for: Option<LocalDate>,
    #[arg(long)]
    today: bool,
    #[arg(long)]
    depends_on: Option<String>,
}

#[derive(Debug, Args)]
pub struct TaskUpdateArgs {
    #[arg(long)]
    task_id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long, conflicts_with = "clear_notes")]
    notes: Option<String>,
    #[arg(long)]
    clear_notes: bool,
    #[arg(long, conflicts_with = "clear_due")]
    due: Option<LocalDate>,
    #[arg(long)]
    clear_due: bool,
    #[arg(long, conflicts_with = "clear_depends_on")]
    depends_on: Option<String>,
    #[arg(long)]
    clear_depends_on: bool,
}

#[derive(Debug, Args)]
pub struct TaskIdArgs {
    #[arg(long)]
    task_id: String,
}

#[derive(Debug, Args)]
pub struct TaskPlanArgs {
    #[arg(long)]
    task_id: String,
    #[arg(long, required_unless_present = "unschedule", conflicts_with = "unschedule")]
    date: Option<LocalDate>,
    #[arg(long)]
    unschedule: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TaskView {
    Today,
    Slate,
    Overdue,
    All,
}

#[derive(Debug, Args)]
pub struct TaskListArgs {
    #[arg(long, value_enum, default_value_t = TaskView::Today)]
    view: TaskView,
}

#[derive(Debug, Subcommand)]
pub enum HabitCommand {
    Add(HabitAddArgs),
    Update(HabitUpdateArgs),
    /// Toggles today's completion.
    Toggle(HabitIdArgs),
    Delete(HabitIdArgs),
    List,
    Streak(HabitStreakArgs),
}

#[derive(Debug, Args)]
pub struct HabitAddArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Args)]
pub struct HabitUpdateArgs {
    #[arg(long)]
    habit_id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long, conflicts_with = "clear_notes")]
    notes: Option<String>,
    #[arg(long)]
    clear_notes: bool,
}

#[derive(Debug, Args)]
pub struct HabitIdArgs {
    #[arg(long)]
    habit_id: String,
}

#[derive(Debug, Args)]
pub struct HabitStreakArgs {
    #[arg(long)]
    habit_id: String,
    /// Last day counted; defaults to yesterday, the latest sealed day.
    #[arg(long)]
    date: Option<LocalDate>,
}

#[derive(Debug, Subcommand)]
pub enum RolloverCommand {
    Run,
    Status,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    Day(HistoryDayArgs),
    Month(HistoryMonthArgs),
    Stats,
}

#[derive(Debug, Args)]
pub struct HistoryDayArgs {
    #[arg(long)]
    date: LocalDate,
}

#[derive(Debug, Args)]
pub struct HistoryMonthArgs {
    #[arg(long)]
    year: i32,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
    month: u8,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    SetDayStart(SetDayStartArgs),
    SetAutoCarryover(SetAutoCarryoverArgs),
}

#[derive(Debug, Args)]
pub struct SetDayStartArgs {
    /// Local time in `HH:MM` form.
    value: String,
}

#[derive(Debug, Args)]
pub struct SetAutoCarryoverArgs {
    #[arg(action = clap::ArgAction::Set)]
    enabled: bool,
}

#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    List(EventsListArgs),
}

#[derive(Debug, Args)]
pub struct EventsListArgs {
    #[arg(long, default_value_t = 0)]
    after: i64,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    Take,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitListing {
    #[serde(flatten)]
    pub habit: Habit,
    pub done_today: bool,
}

/// Result of one command. List-style variants print as tables unless `--json` is set.
#[derive(Debug)]
pub enum CommandOutput {
    Value(Value),
    Tasks(Vec<Task>),
    Habits(Vec<HabitListing>),
    Events(Vec<Event>),
    Days(Vec<DaySummary>),
}

impl CommandOutput {
    pub fn to_json(&self) -> Result<Value> {
        let value = match self {
            Self::Value(value) => value.clone(),
            Self::Tasks(tasks) => serde_json::to_value(tasks)?,
            Self::Habits(habits) => serde_json::to_value(habits)?,
            Self::Events(events) => serde_json::to_value(events)?,
            Self::Days(days) => serde_json::to_value(days)?,
        };
        Ok(value)
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let output = run_command_with_db(
        &cli.db,
        cli.snapshot.as_deref(),
        cli.now.as_deref(),
        cli.command,
    )?;
    emit(&output, cli.json)
}

pub fn run_command_with_db(
    db_path: &Path,
    snapshot_path: Option<&Path>,
    now: Option<&str>,
    command: Command,
) -> Result<CommandOutput> {
    let (mut planner, init) = open_planner(db_path, snapshot_path, now)?;
    run_command(command, &mut planner, &init)
}

/// Opens the database, pins the clock, and initializes the planner, which runs
/// any pending rollover.
pub fn open_planner(
    db_path: &Path,
    snapshot_path: Option<&Path>,
    now: Option<&str>,
) -> Result<(CliPlanner, InitReport)> {
    let store = SqlitePlannerStore::open(db_path)?;
    store.migrate()?;

    let now = match now {
        Some(raw) => parse_rfc3339(raw)?,
        None => SystemClock::new().now(),
    };

    let config = PlannerConfig {
        snapshot_path: Some(
            snapshot_path.map_or_else(|| default_snapshot_path(db_path), Path::to_path_buf),
        ),
        ..PlannerConfig::default()
    };

    let mut planner = Planner::new(store, FixedClock::new(now), config);
    let init = planner.init()?;
    debug!(
        db = %db_path.display(),
        today = %init.rollover.today,
        restored_from_snapshot = init.restored_from_snapshot,
        replayed_events = init.replayed_events,
        sealed_days = init.rollover.sealed.len(),
        "planner opened"
    );
    Ok((planner, init))
}

#[must_use]
pub fn default_snapshot_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("snapshot.json")
}

pub fn run_command(
    command: Command,
    planner: &mut CliPlanner,
    init: &InitReport,
) -> Result<CommandOutput> {
    match command {
        Command::Task { command } => run_task(command, planner),
        Command::Habit { command } => run_habit(command, planner),
        Command::Rollover { command } => run_rollover(&command, planner, init),
        Command::History { command } => run_history(command, planner),
        Command::Settings { command } => run_settings(command, planner),
        Command::Events { command } => match command {
            EventsCommand::List(args) => Ok(CommandOutput::Events(
                planner.store().list_events(args.after, args.limit)?,
            )),
        },
        Command::Snapshot { command } => match command {
            SnapshotCommand::Take => {
                let last_event_id = planner.take_snapshot()?;
                if let Some(last_event_id) = last_event_id {
                    info!(last_event_id, "snapshot written");
                }
                Ok(CommandOutput::Value(json!({
                    "path": planner.config().snapshot_path,
                    "last_event_id": last_event_id,
                    "written": last_event_id.is_some(),
                })))
            }
        },
    }
}

fn run_task(command: TaskCommand, planner: &mut CliPlanner) -> Result<CommandOutput> {
    let task_id = match command {
        TaskCommand::Add(args) => {
            let scheduled_for = if args.today {
                Some(planner.logical_today())
            } else {
                args.scheduled_for
            };
            let depends_on = args.depends_on.as_deref().map(TaskId::parse).transpose()?;
            planner.create_task(&args.title, args.notes, args.due, scheduled_for, depends_on)?
        }
        TaskCommand::Update(args) => {
            let task_id = TaskId::parse(&args.task_id)?;
            let depends_on = args.depends_on.as_deref().map(TaskId::parse).transpose()?;
            planner.update_task(
                task_id,
                TaskPatch {
                    title: args.title,
                    notes: patch_arg(args.notes, args.clear_notes),
                    due_date: patch_arg(args.due, args.clear_due),
                    scheduled_for: Patch::Keep,
                    depends_on: patch_arg(depends_on, args.clear_depends_on),
                },
            )?;
            task_id
        }
        TaskCommand::Done(args) => {
            let task_id = TaskId::parse(&args.task_id)?;
            planner.toggle_task_completion(task_id)?;
            task_id
        }
        TaskCommand::Today(args) => {
            let task_id = TaskId::parse(&args.task_id)?;
            planner.toggle_task_for_today(task_id)?;
            task_id
        }
        TaskCommand::Plan(args) => {
            let task_id = TaskId::parse(&args.task_id)?;
            let date = if args.unschedule { None } else { args.date };
            planner.plan_task_for(task_id, date)?;
            task_id
        }
        TaskCommand::Skip(args) => {
            let task_id = TaskId::parse(&args.task_id)?;
            planner.skip_task_for_today(task_id)?;
            task_id
        }
        TaskCommand::Delete(args) => {
            let task_id = TaskId::parse(&args.task_id)?;
            planner.delete_task(task_id)?;
            task_id
        }
        TaskCommand::List(args) => return Ok(CommandOutput::Tasks(list_tasks(planner, args.view))),
    };

    let task = planner
        .state()
        .task(task_id)
        .ok_or_else(|| anyhow!("task {task_id} missing after write"))?;
    Ok(CommandOutput::Value(serde_json::to_value(task)?))
}

fn list_tasks(planner: &CliPlanner, view: TaskView) -> Vec<Task> {
    let today = planner.logical_today();
    let state = planner.state();
    let tasks = match view {
        TaskView::Today => state.today_tasks(today),
        TaskView::Slate => state.slate_tasks(),
        TaskView::Overdue => state.overdue_tasks(today),
        TaskView::All => state.tasks.values().collect(),
    };
    tasks.into_iter().cloned().collect()
}

fn run_habit(command: HabitCommand, planner: &mut CliPlanner) -> Result<CommandOutput> {
    let habit_id = match command {
        HabitCommand::Add(args) => planner.create_habit(&args.title, args.notes)?,
        HabitCommand::Update(args) => {
            let habit_id = HabitId::parse(&args.habit_id)?;
            planner.update_habit(
                habit_id,
                HabitPatch {
                    title: args.title,
                    notes: patch_arg(args.notes, args.clear_notes),
                },
            )?;
            habit_id
        }
        HabitCommand::Toggle(args) => {
            let habit_id = HabitId::parse(&args.habit_id)?;
            planner.toggle_habit_completion(habit_id)?;
            habit_id
        }
        HabitCommand::Delete(args) => {
            let habit_id = HabitId::parse(&args.habit_id)?;
            planner.delete_habit(habit_id)?;
            habit_id
        }
        HabitCommand::List => {
            let today = planner.logical_today();
            let state = planner.state();
            let listings = state
                .active_habits()
                .into_iter()
                .map(|habit| HabitListing {
                    habit: habit.clone(),
                    done_today: state.habit_done_on(habit.id, today),
                })
                .collect();
            return Ok(CommandOutput::Habits(listings));
        }
        HabitCommand::Streak(args) => {
            let habit_id = HabitId::parse(&args.habit_id)?;
            let today = planner.logical_today();
            let reference = args.date.unwrap_or_else(|| today.prev_day());
            let streak = planner.streak(habit_id, reference)?;
            return Ok(CommandOutput::Value(json!({
                "habit_id": habit_id,
                "reference": reference,
                "streak": streak,
                "done_today": planner.state().habit_done_on(habit_id, today),
            })));
        }
    };

    let today = planner.logical_today();
    let habit = planner
        .state()
        .habit(habit_id)
        .ok_or_else(|| anyhow!("habit {habit_id} missing after write"))?;
    let listing = HabitListing {
        habit: habit.clone(),
        done_today: planner.state().habit_done_on(habit_id, today),
    };
    Ok(CommandOutput::Value(serde_json::to_value(listing)?))
}

fn run_rollover(
    command: &RolloverCommand,
    planner: &mut CliPlanner,
    init: &InitReport,
) -> Result<CommandOutput> {
    match command {
        RolloverCommand::Run => {
            let manual = planner.run_rollover()?;
            Ok(CommandOutput::Value(json!({
                "startup": init.rollover,
                "manual": manual,
            })))
        }
        RolloverCommand::Status => Ok(CommandOutput::Value(json!({
            "today": planner.logical_today(),
            "cursor": planner.store().rollover_cursor()?,
            "last_event_id": planner.last_event_id(),
            "restored_from_snapshot": init.restored_from_snapshot,
            "replayed_events": init.replayed_events,
        }))),
    }
}

fn run_history(command: HistoryCommand, planner: &CliPlanner) -> Result<CommandOutput> {
    match command {
        HistoryCommand::Day(args) => Ok(CommandOutput::Value(serde_json::to_value(
            planner.day_record(args.date)?,
        )?)),
        HistoryCommand::Month(args) => Ok(CommandOutput::Days(
            planner.month_summary(args.year, args.month)?,
        )),
        HistoryCommand::Stats => Ok(CommandOutput::Value(serde_json::to_value(
            planner.history_stats()?,
        )?)),
    }
}

fn run_settings(command: SettingsCommand, planner: &mut CliPlanner) -> Result<CommandOutput> {
    match command {
        SettingsCommand::Show => Ok(CommandOutput::Value(json!({
            "settings": planner.settings(),
            "today": planner.logical_today(),
        }))),
        SettingsCommand::SetDayStart(args) => {
            let day_start = DayStart::parse(&args.value)?;
            let rollover = planner.set_day_start(day_start)?;
            Ok(CommandOutput::Value(json!({
                "settings": planner.settings(),
                "rollover": rollover,
            })))
        }
        SettingsCommand::SetAutoCarryover(args) => {
            planner.set_auto_carryover(args.enabled)?;
            Ok(CommandOutput::Value(json!({ "settings": planner.settings() })))
        }
    }
}

fn patch_arg<T>(value: Option<T>, clear: bool) -> Patch<T> {
    match value {
        Some(value) => Patch::Set(value),
        None if clear => Patch::Clear,
        None => Patch::Keep,
    }
}

fn emit(output: &CommandOutput, json: bool) -> Result<()> {
    match output {
        CommandOutput::Value(value) => println!("{}", serde_json::to_string_pretty(value)?),
        other if json => println!("{}", serde_json::to_string_pretty(&other.to_json()?)?),
        CommandOutput::Tasks(tasks) => print_tasks(tasks),
        CommandOutput::Habits(habits) => print_habits(habits),
        CommandOutput::Events(events) => print_events(events)?,
        CommandOutput::Days(days) => print_days(days),
    }
    Ok(())
}

fn date_cell(value: Option<LocalDate>) -> String {
    value.map_or_else(|| "-".to_string(), |date| date.to_string())
}

fn print_tasks(tasks: &[Task]) {
    println!(
        "{:<26} {:<8} {:<10} {:<10} title",
        "task_id", "status", "scheduled", "due"
    );
    println!("{}", "-".repeat(80));

    for task in tasks {
        println!(
            "{:<26} {:<8} {:<10} {:<10} {}",
            task.id,
            task.status.as_str(),
            date_cell(task.scheduled_for),
            date_cell(task.due_date),
            task.title
        );
    }
}

fn print_habits(habits: &[HabitListing]) {
    println!("{:<26} {:<5} title", "habit_id", "today");
    println!("{}", "-".repeat(60));

    for listing in habits {
        println!(
            "{:<26} {:<5} {}",
            listing.habit.id,
            if listing.done_today { "yes" } else { "no" },
            listing.habit.title
        );
    }
}

fn print_events(events: &[Event]) -> Result<()> {
    println!("{:<8} {:<32} event_type", "id", "recorded_at");
    println!("{}", "-".repeat(70));

    for event in events {
        println!(
            "{:<8} {:<32} {}",
            event.id,
            format_rfc3339(event.recorded_at)?,
            event.kind.event_type()
        );
    }
    Ok(())
}

fn print_days(days: &[DaySummary]) {
    println!(
        "{:<10} {:>7} {:>9} {:>7} {:>10} perfect",
        "date", "planned", "completed", "habits", "habits_done"
    );
    println!("{}", "-".repeat(60));

    for day in days {
        println!(
            "{:<10} {:>7} {:>9} {:>7} {:>10} {}",
            day.date,
            day.tasks_planned,
            day.tasks_completed,
            day.habits_tracked,
            day.habits_completed,
            if day.perfect_day { "yes" } else { "no" }
        );
    }
}
