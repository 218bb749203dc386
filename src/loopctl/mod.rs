//! Loop Controller (C8): the four-phase PLAN -> EXECUTE -> VERIFY -> UNIFY
//! state machine and the tri-kind checkpoint frame for human-in-the-loop
//! pauses.
//!
//! The checkpoint frame is grounded in `gates/mod.rs`'s `ApprovalGate`
//! (`Select::with_theme(&ColorfulTheme::default())` prompt pattern),
//! generalized from that module's binary approve/reject/abort gate to the
//! spec's three checkpoint kinds, each with its own default selection.

use crate::dispatch::protocol::BlockedKind;
use crate::errors::LoopError;
use crate::store::WorkspaceStore;
use dialoguer::{theme::ColorfulTheme, Select};
use forge_common::project_state::{LoopMark, LoopPosition};
use forge_common::task::TaskGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Planning,
    Execute,
    Verify,
    Unify,
}

/// The three checkpoint kinds from §7's tri-kind frame. `GenericBlock`
/// (a worker simply stuck, not asking for a human decision) is handled
/// separately by the Scheduler and never reaches this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    /// 90% of pauses: a visual/behavioural check. Default-approves when
    /// auto-advance is on.
    Verify,
    /// 9%: pick among enumerated options. Defaults to the first option.
    Decide,
    /// 1%: authentication or similarly irreversible gate. Always pauses,
    /// even under auto-advance.
    Act,
}

impl CheckpointKind {
    pub fn from_blocked_kind(kind: BlockedKind) -> Option<Self> {
        match kind {
            BlockedKind::CheckpointHumanVerify => Some(Self::Verify),
            BlockedKind::CheckpointDecision => Some(Self::Decide),
            BlockedKind::CheckpointHumanAction => Some(Self::Act),
            BlockedKind::GenericBlock => None,
        }
    }
}

pub struct CheckpointFrame {
    pub kind: CheckpointKind,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointResolution {
    Approved,
    Selected(String),
    Aborted,
}

/// Present a checkpoint frame. Under auto-advance, `Verify` frames
/// default-approve without prompting and `Decide` frames default to their
/// first option without prompting; `Act` frames always prompt regardless
/// of auto-advance, since authentication gates cannot be automated.
pub fn present_checkpoint(
    frame: &CheckpointFrame,
    auto_advance: bool,
) -> std::io::Result<CheckpointResolution> {
    match frame.kind {
        CheckpointKind::Verify if auto_advance => return Ok(CheckpointResolution::Approved),
        CheckpointKind::Decide if auto_advance => {
            let first = frame.options.first().cloned().unwrap_or_default();
            return Ok(CheckpointResolution::Selected(first));
        }
        _ => {}
    }

    let mut display_options = frame.options.clone();
    if display_options.is_empty() {
        display_options.push("Approve".to_string());
    }
    display_options.push("Abort".to_string());

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(&frame.prompt)
        .items(&display_options)
        .default(0)
        .interact()?;

    if selection == display_options.len() - 1 {
        return Ok(CheckpointResolution::Aborted);
    }
    if frame.options.is_empty() {
        Ok(CheckpointResolution::Approved)
    } else {
        Ok(CheckpointResolution::Selected(display_options[selection].clone()))
    }
}

pub struct LoopController<'a> {
    store: &'a WorkspaceStore,
}

impl<'a> LoopController<'a> {
    pub fn new(store: &'a WorkspaceStore) -> Self {
        Self { store }
    }

    /// §4.4 transition guard for planning -> execute: the plan must be
    /// valid (wave-disjoint, acyclic, known dependencies — checked by the
    /// Wave Scheduler) and, if any task is high/critical risk, the
    /// checkpoint-before flag must be set.
    pub fn validate_for_execute(
        &self,
        graph: &TaskGraph,
        checkpoint_before_flag: bool,
    ) -> Result<(), LoopError> {
        let mut scheduler_graph = graph.clone();
        crate::dag::WaveScheduler::new(&mut scheduler_graph).validate()?;

        let has_high_risk = graph
            .nodes
            .iter()
            .any(|n| n.risk_tier.requires_checkpoint());
        if has_high_risk && !checkpoint_before_flag {
            return Err(LoopError::InvalidPlan {
                reason: "plan has a high/critical risk task but checkpoints.beforeHighRisk is unset"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Advance the loop-position marks (§3 `LoopPosition`) for `phase`,
    /// persisting through the Workspace Store.
    pub fn mark_phase(&self, phase: LoopPhase, mark: LoopMark) -> Result<(), LoopError> {
        let mut state = self.store.read_project_state()?;
        set_mark(&mut state.loop_position, phase, mark);
        state.touch();
        self.store.write_project_state(&state)?;
        Ok(())
    }

    /// Whether the loop should advance from `from` to the next phase
    /// automatically, per `pipeline.auto_advance`.
    pub fn should_auto_advance(&self, auto_advance: bool, from: LoopPhase) -> bool {
        auto_advance && from != LoopPhase::Unify
    }

    pub fn next_phase(phase: LoopPhase) -> LoopPhase {
        match phase {
            LoopPhase::Planning => LoopPhase::Execute,
            LoopPhase::Execute => LoopPhase::Verify,
            LoopPhase::Verify => LoopPhase::Unify,
            LoopPhase::Unify => LoopPhase::Planning,
        }
    }
}

fn set_mark(position: &mut LoopPosition, phase: LoopPhase, mark: LoopMark) {
    match phase {
        LoopPhase::Planning => position.plan = mark,
        LoopPhase::Execute => position.execute = mark,
        LoopPhase::Verify => position.verify = mark,
        LoopPhase::Unify => position.unify = mark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::task::{RiskTier, TaskNode, TaskStatus, TddMode};
    use tempfile::tempdir;

    fn node(id: &str, risk: RiskTier) -> TaskNode {
        TaskNode {
            id: id.to_string(),
            description: "d".into(),
            wave: 0,
            dependencies: vec![],
            declared_files: vec!["a.rs".into()],
            risk_tier: risk,
            tdd_mode: TddMode::Standard,
            skip_justification: None,
            acceptance_criteria: vec![],
            status: TaskStatus::Pending,
            failure_count: 0,
            pre_run_ref: None,
            deviations: vec![],
            deferred_items: vec![],
        }
    }

    #[test]
    fn checkpoint_kind_maps_from_blocked_kind() {
        assert_eq!(
            CheckpointKind::from_blocked_kind(BlockedKind::CheckpointDecision),
            Some(CheckpointKind::Decide)
        );
        assert_eq!(CheckpointKind::from_blocked_kind(BlockedKind::GenericBlock), None);
    }

    #[test]
    fn validate_for_execute_requires_checkpoint_flag_for_high_risk() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path());
        store.initialise("demo").unwrap();
        let controller = LoopController::new(&store);
        let graph = TaskGraph::new("p", 1, vec![node("t1", RiskTier::High)]);
        assert!(controller.validate_for_execute(&graph, false).is_err());
        assert!(controller.validate_for_execute(&graph, true).is_ok());
    }

    #[test]
    fn next_phase_cycles_through_all_four() {
        assert_eq!(LoopController::next_phase(LoopPhase::Planning), LoopPhase::Execute);
        assert_eq!(LoopController::next_phase(LoopPhase::Execute), LoopPhase::Verify);
        assert_eq!(LoopController::next_phase(LoopPhase::Verify), LoopPhase::Unify);
        assert_eq!(LoopController::next_phase(LoopPhase::Unify), LoopPhase::Planning);
    }

    #[test]
    fn mark_phase_persists_through_store() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path());
        store.initialise("demo").unwrap();
        let controller = LoopController::new(&store);
        controller.mark_phase(LoopPhase::Planning, LoopMark::Complete).unwrap();
        let state = store.read_project_state().unwrap();
        assert_eq!(state.loop_position.plan, LoopMark::Complete);
    }
}
