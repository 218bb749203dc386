//! Checkpoint: a pre-task snapshot record (version-control ref + optional
//! workspace snapshot + reason).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub task_id: String,
    /// Commit hash on the private checkpoint reference namespace.
    pub vcs_ref: String,
    pub snapshot_path: Option<String>,
    pub reason: String,
}

impl Checkpoint {
    pub fn new(task_id: impl Into<String>, vcs_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            task_id: task_id.into(),
            vcs_ref: vcs_ref.into(),
            snapshot_path: None,
            reason: reason.into(),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    pub fn younger_than_24h(&self) -> bool {
        self.age() < chrono::Duration::hours(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_checkpoint_is_younger_than_24h() {
        let c = Checkpoint::new("t1", "deadbeef", "pre-task");
        assert!(c.younger_than_24h());
    }

    #[test]
    fn checkpoint_ids_are_unique() {
        let a = Checkpoint::new("t1", "x", "r");
        let b = Checkpoint::new("t1", "x", "r");
        assert_ne!(a.id, b.id);
    }
}
