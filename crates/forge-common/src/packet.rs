//! ContextPacket: the fixed 14-slot bundle a worker subprocess receives.
//!
//! Built immediately before dispatch, never persisted long term. Slots are
//! grouped as identity / why / what / how / constraints / tooling per
//! §4.2 of the specification; the struct fields below are named after the
//! slots, one field per slot, so a reviewer can check 14 fields against
//! the 14 named slots directly.

use crate::task::{RiskTier, TddMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPacket {
    // identity
    pub task_id: String,
    pub tdd_mode: TddMode,
    pub risk_tier: RiskTier,

    // why
    pub mission_context: String,
    pub phase_objective: String,

    // what
    pub files: Vec<String>,
    pub files_content: BTreeMap<String, String>,
    pub acceptance_criteria: String,

    // how
    pub architecture_slice: String,
    pub contracts_slice: String,
    pub dependency_symbols: String,
    pub tests_slice: String,
    pub wave_context: String,

    // constraints
    pub scars_digest: String,
    pub state_digest: String,
    pub boundaries: Vec<String>,

    // tooling
    pub tooling: ToolingCommands,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolingCommands {
    pub test: Option<String>,
    pub lint: Option<String>,
    pub typecheck: Option<String>,
    pub format_check: Option<String>,
    pub build: Option<String>,
}

impl ContextPacket {
    pub const MISSION_CONTEXT_LINE_CAP: usize = 20;
    pub const PHASE_OBJECTIVE_LINE_CAP: usize = 15;
    pub const ACCEPTANCE_CRITERIA_LINE_CAP: usize = 50;
    pub const WAVE_CONTEXT_LINE_CAP: usize = 30;
    pub const SCARS_DIGEST_LINE_CAP: usize = 30;
    pub const STATE_DIGEST_LINE_CAP: usize = 150;

    /// Invariant check used by tests and by the Builder itself: `files`
    /// must equal the task's declared list verbatim and every path must
    /// have a `filesContent` entry.
    pub fn is_narrow_for(&self, declared_files: &[String]) -> bool {
        self.files == declared_files
            && declared_files
                .iter()
                .all(|f| self.files_content.contains_key(f))
    }

    pub fn within_line_caps(&self) -> bool {
        line_count(&self.mission_context) <= Self::MISSION_CONTEXT_LINE_CAP
            && line_count(&self.phase_objective) <= Self::PHASE_OBJECTIVE_LINE_CAP
            && line_count(&self.acceptance_criteria) <= Self::ACCEPTANCE_CRITERIA_LINE_CAP
            && line_count(&self.wave_context) <= Self::WAVE_CONTEXT_LINE_CAP
            && line_count(&self.scars_digest) <= Self::SCARS_DIGEST_LINE_CAP
            && line_count(&self.state_digest) <= Self::STATE_DIGEST_LINE_CAP
    }
}

fn line_count(s: &str) -> usize {
    if s.is_empty() {
        0
    } else {
        s.lines().count()
    }
}
