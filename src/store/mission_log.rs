//! The append-only mission log: one NDJSON line per orchestrator event,
//! strictly ordered in wall-clock append order (§5 ordering guarantees).
//!
//! Grounded in `audit/logger.rs`'s `AuditRun`/`PhaseAudit` run-bookkeeping
//! and `orchestrator/state.rs`'s resume-by-last-entry query pattern,
//! generalized from a pipe-delimited text log to one JSON object per line.

use crate::errors::StoreError;
use crate::store::atomic::append_ndjson_line;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MissionEvent {
    WaveStarted { wave: u32 },
    WaveCompleted { wave: u32 },
    TaskDispatched { task_id: String },
    TaskStatus { task_id: String, detail: String },
    TaskCompleted { task_id: String, files_modified: Vec<String> },
    TaskBlocked { task_id: String, kind: String, reason: String },
    PermissionGranted { task_id: String, path: String },
    PermissionDenied { task_id: String, path: String, reason: String },
    CheckpointCreated { checkpoint_id: String, task_id: String },
    Rollback { checkpoint_id: String },
    ScarRecorded { scar_id: String, category: String },
    LoopTransition { from: String, to: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: MissionEvent,
}

pub struct MissionLog {
    path: PathBuf,
}

impl MissionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, event: MissionEvent) -> Result<(), StoreError> {
        let entry = MissionLogEntry {
            timestamp: Utc::now(),
            event,
        };
        let line = serde_json::to_string(&entry).map_err(|source| StoreError::MalformedJson {
            path: self.path.clone(),
            source,
        })?;
        append_ndjson_line(&self.path, &line)
    }

    pub fn read_all(&self) -> Result<Vec<MissionLogEntry>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::ReadFailed {
            path: self.path.clone(),
            source,
        })?;
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l).map_err(|source| StoreError::MalformedJson {
                    path: self.path.clone(),
                    source,
                })
            })
            .collect()
    }

    /// The last entry recorded for a given task, used on Scheduler resume
    /// to determine whether a `running` task actually completed.
    pub fn last_for_task(&self, task_id: &str) -> Result<Option<MissionLogEntry>, StoreError> {
        let all = self.read_all()?;
        Ok(all
            .into_iter()
            .filter(|e| entry_task_id(&e.event).is_some_and(|id| id == task_id))
            .last())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn entry_task_id(event: &MissionEvent) -> Option<&str> {
    match event {
        MissionEvent::TaskDispatched { task_id }
        | MissionEvent::TaskStatus { task_id, .. }
        | MissionEvent::TaskCompleted { task_id, .. }
        | MissionEvent::TaskBlocked { task_id, .. }
        | MissionEvent::PermissionGranted { task_id, .. }
        | MissionEvent::PermissionDenied { task_id, .. } => Some(task_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_read_all_preserves_order() {
        let dir = tempdir().unwrap();
        let log = MissionLog::new(dir.path().join("mission-log.ndjson"));
        log.append(MissionEvent::WaveStarted { wave: 1 }).unwrap();
        log.append(MissionEvent::WaveCompleted { wave: 1 }).unwrap();
        let all = log.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(matches!(all[0].event, MissionEvent::WaveStarted { wave: 1 }));
        assert!(matches!(all[1].event, MissionEvent::WaveCompleted { wave: 1 }));
    }

    #[test]
    fn read_all_on_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = MissionLog::new(dir.path().join("missing.ndjson"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn last_for_task_filters_by_task_id() {
        let dir = tempdir().unwrap();
        let log = MissionLog::new(dir.path().join("mission-log.ndjson"));
        log.append(MissionEvent::TaskDispatched {
            task_id: "t1".into(),
        })
        .unwrap();
        log.append(MissionEvent::TaskCompleted {
            task_id: "t1".into(),
            files_modified: vec!["a.rs".into()],
        })
        .unwrap();
        log.append(MissionEvent::TaskDispatched {
            task_id: "t2".into(),
        })
        .unwrap();

        let last = log.last_for_task("t1").unwrap().unwrap();
        assert!(matches!(last.event, MissionEvent::TaskCompleted { .. }));
    }
}
