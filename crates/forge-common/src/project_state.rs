//! ProjectState: current phase, the four-phase loop position, blockers,
//! scar/rule counters and the session-continuity triple.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the four loop phases' ternary marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMark {
    NotStarted,
    Active,
    Complete,
}

impl Default for LoopMark {
    fn default() -> Self {
        LoopMark::NotStarted
    }
}

impl LoopMark {
    pub fn symbol(self) -> char {
        match self {
            LoopMark::NotStarted => '·',
            LoopMark::Active => '…',
            LoopMark::Complete => '✓',
        }
    }
}

/// The four-mark loop position: plan, execute, verify, unify.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LoopPosition {
    pub plan: LoopMark,
    pub execute: LoopMark,
    pub verify: LoopMark,
    pub unify: LoopMark,
}

impl LoopPosition {
    pub fn display(&self) -> String {
        [self.plan, self.execute, self.verify, self.unify]
            .iter()
            .map(|m| m.symbol())
            .collect()
    }

    pub fn all_complete(&self) -> bool {
        matches!(
            (self.plan, self.execute, self.verify, self.unify),
            (
                LoopMark::Complete,
                LoopMark::Complete,
                LoopMark::Complete,
                LoopMark::Complete
            )
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    pub phase_name: String,
    pub loop_position: LoopPosition,
    #[serde(default)]
    pub active_blockers: Vec<String>,
    #[serde(default)]
    pub scar_count: u32,
    #[serde(default)]
    pub active_rule_count: u32,
    pub last_session_timestamp: DateTime<Utc>,
    pub next_action: String,
    pub handoff_file: Option<String>,
}

impl ProjectState {
    pub fn new(phase_name: impl Into<String>) -> Self {
        Self {
            phase_name: phase_name.into(),
            loop_position: LoopPosition::default(),
            active_blockers: Vec::new(),
            scar_count: 0,
            active_rule_count: 0,
            last_session_timestamp: Utc::now(),
            next_action: "plan".to_string(),
            handoff_file: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_session_timestamp = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_four_marks() {
        let mut p = LoopPosition::default();
        p.plan = LoopMark::Complete;
        p.execute = LoopMark::Active;
        assert_eq!(p.display().chars().count(), 4);
    }

    #[test]
    fn all_complete_requires_all_four() {
        let mut p = LoopPosition::default();
        assert!(!p.all_complete());
        p.plan = LoopMark::Complete;
        p.execute = LoopMark::Complete;
        p.verify = LoopMark::Complete;
        p.unify = LoopMark::Complete;
        assert!(p.all_complete());
    }

    #[test]
    fn new_project_state_starts_at_plan() {
        let s = ProjectState::new("auth");
        assert_eq!(s.next_action, "plan");
        assert_eq!(s.scar_count, 0);
    }
}
