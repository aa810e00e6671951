use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::PlannerState;
use crate::PlannerError;

pub const SNAPSHOT_CONTRACT_VERSION: &str = "planner_snapshot.v1";

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PlannerSnapshot {
    pub contract_version: String,
    pub last_event_id: i64,
    pub state: PlannerState,
}

impl PlannerSnapshot {
    #[must_use]
    pub fn new(last_event_id: i64, state: PlannerState) -> Self {
        Self {
            contract_version: SNAPSHOT_CONTRACT_VERSION.to_string(),
            last_event_id,
            state,
        }
    }
}

/// Snapshot file on disk. Only ever a replay shortcut; losing it costs a full replay.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot, `Ok(None)` when no file exists.
    ///
    /// # Errors
    /// Returns [`PlannerError::Snapshot`] when the file is unreadable, malformed, or
    /// written under another contract version.
    pub fn load(&self) -> Result<Option<PlannerSnapshot>, PlannerError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(PlannerError::Snapshot(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )))
            }
        };

        let snapshot: PlannerSnapshot = serde_json::from_str(&raw).map_err(|err| {
            PlannerError::Snapshot(format!("failed to parse {}: {err}", self.path.display()))
        })?;

        if snapshot.contract_version != SNAPSHOT_CONTRACT_VERSION {
            return Err(PlannerError::Snapshot(format!(
                "unsupported contract version {}, expected {SNAPSHOT_CONTRACT_VERSION}",
                snapshot.contract_version
            )));
        }

        Ok(Some(snapshot))
    }

    /// Writes the snapshot through a sibling temp file and a rename.
    ///
    /// # Errors
    /// Returns [`PlannerError::Snapshot`] on encode or I/O failure.
    pub fn store(&self, snapshot: &PlannerSnapshot) -> Result<(), PlannerError> {
        let encoded = serde_json::to_vec(snapshot)
            .map_err(|err| PlannerError::Snapshot(format!("failed to encode snapshot: {err}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                PlannerError::Snapshot(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, encoded).map_err(|err| {
            PlannerError::Snapshot(format!("failed to write {}: {err}", tmp_path.display()))
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|err| {
            PlannerError::Snapshot(format!(
                "failed to move snapshot into {}: {err}",
                self.path.display()
            ))
        })?;

        debug!(
            path = %self.path.display(),
            last_event_id = snapshot.last_event_id,
            "snapshot written"
        );
        Ok(())
    }

    /// # Errors
    /// Returns [`PlannerError::Snapshot`] when an existing file cannot be removed.
    pub fn clear(&self) -> Result<(), PlannerError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PlannerError::Snapshot(format!(
                "failed to remove {}: {err}",
                self.path.display()
            ))),
        }
    }
}
