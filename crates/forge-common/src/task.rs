//! TaskNode and TaskGraph: the plan's unit of work and its wave-ordered
//! arrangement.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a task within a `TaskGraph`'s flat node list. The graph is
/// stored as an arena (`Vec<TaskNode>`) addressed by these indices, never
/// by pointer, per the "arbitrary graphs" design note.
pub type TaskIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn requires_checkpoint(self) -> bool {
        matches!(self, RiskTier::High | RiskTier::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TddMode {
    Hard,
    Standard,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Blocked,
    Deferred,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Deferred)
    }
}

/// A single unit of work in a plan's task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub description: String,
    pub wave: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Declared files this task may touch; capped at 6 paths.
    pub declared_files: Vec<String>,
    pub risk_tier: RiskTier,
    pub tdd_mode: TddMode,
    /// Required when `tdd_mode == Skip` (see DESIGN.md open-question
    /// resolution); a skip without justification is rewritten to Standard
    /// by `TaskNode::normalize`.
    #[serde(default)]
    pub skip_justification: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default)]
    pub failure_count: u8,
    /// Version-control ref recorded immediately before this task's most
    /// recent dispatch; spot-check and rollback always diff against this,
    /// never against `HEAD`.
    #[serde(default)]
    pub pre_run_ref: Option<String>,
    #[serde(default)]
    pub deviations: Vec<String>,
    #[serde(default)]
    pub deferred_items: Vec<String>,
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

impl TaskNode {
    pub const MAX_DECLARED_FILES: usize = 6;

    /// Enforce the skip/justification rule from spec.md's open questions:
    /// a `skip` TDD mode without a justification string is demoted to
    /// `standard`.
    pub fn normalize(mut self) -> Self {
        if self.tdd_mode == TddMode::Skip && self.skip_justification.is_none() {
            self.tdd_mode = TddMode::Standard;
        }
        self
    }

    pub fn mark_failed(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.status = if self.failure_count >= 3 {
            TaskStatus::Blocked
        } else {
            TaskStatus::Failed
        };
    }

    pub fn is_three_consecutive_failures(&self) -> bool {
        self.status == TaskStatus::Blocked && self.failure_count >= 3
    }
}

/// Ordered collection of `TaskNode`s for a single plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraph {
    pub phase: String,
    pub plan_number: u32,
    pub wave_count: u32,
    pub nodes: Vec<TaskNode>,
}

impl TaskGraph {
    pub fn new(phase: impl Into<String>, plan_number: u32, nodes: Vec<TaskNode>) -> Self {
        let wave_count = nodes.iter().map(|n| n.wave).max().unwrap_or(0) + 1;
        Self {
            phase: phase.into(),
            plan_number,
            wave_count,
            nodes,
        }
    }

    pub fn find(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<TaskIndex> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn nodes_in_wave(&self, wave: u32) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter().filter(move |n| n.wave == wave)
    }

    pub fn nodes_by_id(&self) -> HashMap<&str, &TaskNode> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    pub fn all_terminal(&self) -> bool {
        self.nodes.iter().all(|n| {
            n.status.is_terminal()
                || n.status == TaskStatus::Blocked && n.is_three_consecutive_failures()
        })
    }

    pub fn all_success(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| n.status == TaskStatus::Completed || n.status == TaskStatus::Deferred)
    }
}
