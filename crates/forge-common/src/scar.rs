//! Scar: a permanent record of a failure with exactly one derived
//! prevention rule. Scars are immutable once created and accumulate
//! monotonically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScarCategory {
    Implementation,
    Architecture,
    Testing,
    Tooling,
    External,
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scar {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: ScarCategory,
    pub description: String,
    pub root_cause: String,
    pub resolution: String,
    pub prevention_rule: String,
    /// A provisional scar is written on verification rejection before
    /// UNIFY promotes it; a promoted scar is `provisional = false`.
    #[serde(default)]
    pub provisional: bool,
    /// Checkpoint this scar's rollback targeted, if any — a checkpoint
    /// referenced here is never evicted while the scar is "open" (i.e.
    /// still provisional).
    #[serde(default)]
    pub checkpoint_id: Option<String>,
}

impl Scar {
    pub fn new(
        category: ScarCategory,
        description: impl Into<String>,
        root_cause: impl Into<String>,
        resolution: impl Into<String>,
        prevention_rule: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category,
            description: description.into(),
            root_cause: root_cause.into(),
            resolution: resolution.into(),
            prevention_rule: prevention_rule.into(),
            provisional: false,
            checkpoint_id: None,
        }
    }

    pub fn provisional(mut self, checkpoint_id: Option<String>) -> Self {
        self.provisional = true;
        self.checkpoint_id = checkpoint_id;
        self
    }

    pub fn promote(&mut self) {
        self.provisional = false;
    }

    pub fn is_open(&self) -> bool {
        self.provisional
    }
}
