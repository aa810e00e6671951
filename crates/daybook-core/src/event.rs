use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{format_rfc3339, HabitId, LocalDate, PlannerError, TaskId};

/// Id carried by events that exist only in the visible state and have not been
/// persisted yet.
pub const PROVISIONAL_EVENT_ID: i64 = 0;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EventType {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskToggledToday,
    TaskToggledDone,
    TaskCarriedOver,
    HabitCreated,
    HabitUpdated,
    HabitDeleted,
    HabitToggledToday,
}

impl EventType {
    pub const ALL: [Self; 10] = [
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::TaskToggledToday,
        Self::TaskToggledDone,
        Self::TaskCarriedOver,
        Self::HabitCreated,
        Self::HabitUpdated,
        Self::HabitDeleted,
        Self::HabitToggledToday,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::TaskUpdated => "task_updated",
            Self::TaskDeleted => "task_deleted",
            Self::TaskToggledToday => "task_toggled_today",
            Self::TaskToggledDone => "task_toggled_done",
            Self::TaskCarriedOver => "task_carried_over",
            Self::HabitCreated => "habit_created",
            Self::HabitUpdated => "habit_updated",
            Self::HabitDeleted => "habit_deleted",
            Self::HabitToggledToday => "habit_toggled_today",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// Three-way field update: leave as is, clear, or replace.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T: Clone> Patch<T> {
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn apply_to(&self, target: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Clear => *target = None,
            Self::Set(value) => *target = Some(value.clone()),
        }
    }

    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Clear, Self::Set)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<LocalDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<LocalDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<TaskId>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub notes: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub due_date: Patch<LocalDate>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub scheduled_for: Patch<LocalDate>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub depends_on: Patch<TaskId>,
}

impl TaskPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_keep()
            && self.due_date.is_keep()
            && self.scheduled_for.is_keep()
            && self.depends_on.is_keep()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdated {
    pub task_id: TaskId,
    #[serde(default)]
    pub changes: TaskPatch,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskToggledToday {
    pub task_id: TaskId,
    pub date: LocalDate,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskToggledDone {
    pub task_id: TaskId,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub on: LocalDate,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskCarriedOver {
    pub task_id: TaskId,
    pub from: LocalDate,
    pub to: LocalDate,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HabitCreated {
    pub habit_id: HabitId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HabitPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub notes: Patch<String>,
}

impl HabitPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.notes.is_keep()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HabitUpdated {
    pub habit_id: HabitId,
    #[serde(default)]
    pub changes: HabitPatch,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct HabitRef {
    pub habit_id: HabitId,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct HabitToggledToday {
    pub habit_id: HabitId,
    pub date: LocalDate,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EventKind {
    TaskCreated(TaskCreated),
    TaskUpdated(TaskUpdated),
    TaskDeleted(TaskRef),
    TaskToggledToday(TaskToggledToday),
    TaskToggledDone(TaskToggledDone),
    TaskCarriedOver(TaskCarriedOver),
    HabitCreated(HabitCreated),
    HabitUpdated(HabitUpdated),
    HabitDeleted(HabitRef),
    HabitToggledToday(HabitToggledToday),
    /// Stored type this build does not know; kept verbatim and ignored by the reducer.
    Unrecognized { event_type: String, payload: Value },
}

impl EventKind {
    #[must_use]
    pub fn known_type(&self) -> Option<EventType> {
        Some(match self {
            Self::TaskCreated(_) => EventType::TaskCreated,
            Self::TaskUpdated(_) => EventType::TaskUpdated,
            Self::TaskDeleted(_) => EventType::TaskDeleted,
            Self::TaskToggledToday(_) => EventType::TaskToggledToday,
            Self::TaskToggledDone(_) => EventType::TaskToggledDone,
            Self::TaskCarriedOver(_) => EventType::TaskCarriedOver,
            Self::HabitCreated(_) => EventType::HabitCreated,
            Self::HabitUpdated(_) => EventType::HabitUpdated,
            Self::HabitDeleted(_) => EventType::HabitDeleted,
            Self::HabitToggledToday(_) => EventType::HabitToggledToday,
            Self::Unrecognized { .. } => return None,
        })
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Unrecognized { event_type, .. } => event_type,
            known => known.known_type().map_or("", EventType::as_str),
        }
    }

    /// Encodes the variant payload for storage.
    ///
    /// # Errors
    /// Returns [`PlannerError::Validation`] if the payload cannot be encoded.
    pub fn payload_json(&self) -> Result<Value, PlannerError> {
        let encoded = match self {
            Self::TaskCreated(payload) => serde_json::to_value(payload),
            Self::TaskUpdated(payload) => serde_json::to_value(payload),
            Self::TaskDeleted(payload) => serde_json::to_value(payload),
            Self::TaskToggledToday(payload) => serde_json::to_value(payload),
            Self::TaskToggledDone(payload) => serde_json::to_value(payload),
            Self::TaskCarriedOver(payload) => serde_json::to_value(payload),
            Self::HabitCreated(payload) => serde_json::to_value(payload),
            Self::HabitUpdated(payload) => serde_json::to_value(payload),
            Self::HabitDeleted(payload) => serde_json::to_value(payload),
            Self::HabitToggledToday(payload) => serde_json::to_value(payload),
            Self::Unrecognized { payload, .. } => return Ok(payload.clone()),
        };

        encoded.map_err(|err| {
            PlannerError::Validation(format!(
                "failed to encode {} payload: {err}",
                self.event_type()
            ))
        })
    }

    /// Decodes a stored `(event_type, payload)` pair.
    ///
    /// Unknown types become [`EventKind::Unrecognized`].
    ///
    /// # Errors
    /// Returns [`PlannerError::Persistence`] when a known type carries a payload
    /// that does not match its shape.
    pub fn from_parts(event_type: &str, payload: Value) -> Result<Self, PlannerError> {
        fn decode<T: DeserializeOwned>(event_type: EventType, payload: Value) -> Result<T, PlannerError> {
            serde_json::from_value(payload).map_err(|err| {
                PlannerError::Persistence(format!(
                    "malformed {} payload: {err}",
                    event_type.as_str()
                ))
            })
        }

        let Some(known) = EventType::parse(event_type) else {
            return Ok(Self::Unrecognized {
                event_type: event_type.to_string(),
                payload,
            });
        };

        Ok(match known {
            EventType::TaskCreated => Self::TaskCreated(decode(known, payload)?),
            EventType::TaskUpdated => Self::TaskUpdated(decode(known, payload)?),
            EventType::TaskDeleted => Self::TaskDeleted(decode(known, payload)?),
            EventType::TaskToggledToday => Self::TaskToggledToday(decode(known, payload)?),
            EventType::TaskToggledDone => Self::TaskToggledDone(decode(known, payload)?),
            EventType::TaskCarriedOver => Self::TaskCarriedOver(decode(known, payload)?),
            EventType::HabitCreated => Self::HabitCreated(decode(known, payload)?),
            EventType::HabitUpdated => Self::HabitUpdated(decode(known, payload)?),
            EventType::HabitDeleted => Self::HabitDeleted(decode(known, payload)?),
            EventType::HabitToggledToday => Self::HabitToggledToday(decode(known, payload)?),
        })
    }
}

/// One persisted (or provisional) entry of the event log.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Event {
    pub id: i64,
    pub recorded_at: OffsetDateTime,
    pub kind: EventKind,
}

impl Event {
    #[must_use]
    pub fn is_provisional(&self) -> bool {
        self.id == PROVISIONAL_EVENT_ID
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let recorded_at = format_rfc3339(self.recorded_at).map_err(serde::ser::Error::custom)?;
        let payload = self.kind.payload_json().map_err(serde::ser::Error::custom)?;

        let mut record = serializer.serialize_struct("Event", 4)?;
        record.serialize_field("id", &self.id)?;
        record.serialize_field("recorded_at", &recorded_at)?;
        record.serialize_field("event_type", self.kind.event_type())?;
        record.serialize_field("payload", &payload)?;
        record.end()
    }
}
