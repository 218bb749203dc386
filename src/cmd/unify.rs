//! `forge unify`: promote provisional scars, prune stale checkpoints, and
//! close out the loop position for the current plan.

use crate::checkpoint::CheckpointManager;
use crate::cmd::open_store_with_settings;
use crate::loopctl::{LoopController, LoopPhase};
use crate::scars::ScarRegistry;
use anyhow::{anyhow, Context, Result};
use forge_common::project_state::LoopMark;
use std::path::Path;

pub fn cmd_unify(project_root: &Path, workspace: Option<&Path>, settings: Option<&Path>) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let settings = store.read_settings().context("failed to read settings")?;
    let graph = store
        .read_task_graph()?
        .ok_or_else(|| anyhow!("no task graph found; nothing to unify"))?;

    if !graph.all_success() {
        anyhow::bail!("not every task in the plan is completed or deferred; rerun `forge execute`");
    }

    let controller = LoopController::new(&store);
    controller.mark_phase(LoopPhase::Unify, LoopMark::Active)?;

    let registry = ScarRegistry::new(&store);
    registry.promote_all()?;

    if let Ok(mgr) = CheckpointManager::open(project_root) {
        let checkpoints = read_all_checkpoints(&store);
        let open_ids = registry.open_checkpoint_ids()?;
        let evicted = mgr.prune(&checkpoints, settings.checkpoints.max_retained, &open_ids)?;
        if !evicted.is_empty() {
            println!("pruned {} stale checkpoint(s)", evicted.len());
        }
    }

    controller.mark_phase(LoopPhase::Unify, LoopMark::Complete)?;

    let mut state = store.read_project_state()?;
    state.phase_name = graph.phase.clone();
    state.next_action = "plan".to_string();
    state.touch();
    store.write_project_state(&state)?;

    println!("plan {} #{} unified", graph.phase, graph.plan_number);
    Ok(())
}

fn read_all_checkpoints(store: &crate::store::WorkspaceStore) -> Vec<forge_common::Checkpoint> {
    let dir = store.layout.checkpoints_dir();
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .filter_map(|e| crate::store::atomic::read_json(&e.path()).ok())
        .collect()
}
