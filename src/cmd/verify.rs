//! `forge verify`: run the eight-rung Verification Ladder against the
//! current task graph and persist the resulting report.

use crate::checkpoint::CheckpointManager;
use crate::cmd::open_store_with_settings;
use crate::loopctl::{LoopController, LoopPhase};
use crate::plan;
use crate::verify::{self, BrowserRequirement, LadderInputs};
use anyhow::{anyhow, Context, Result};
use forge_common::project_state::LoopMark;
use std::path::Path;

pub async fn cmd_verify(project_root: &Path, workspace: Option<&Path>, settings: Option<&Path>) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let settings = store.read_settings().context("failed to read settings")?;
    let graph = store
        .read_task_graph()?
        .ok_or_else(|| anyhow!("no task graph found; run `forge plan` and `forge execute` first"))?;

    let controller = LoopController::new(&store);
    controller.mark_phase(LoopPhase::Verify, LoopMark::Active)?;

    let changed_files = match CheckpointManager::open(project_root) {
        Ok(mgr) => graph
            .nodes
            .iter()
            .filter_map(|n| n.pre_run_ref.as_deref())
            .flat_map(|pre_run_ref| mgr.changed_files_since(pre_run_ref).unwrap_or_default())
            .collect(),
        Err(_) => Vec::new(),
    };

    let truths = read_must_haves(&store, &graph.phase, graph.plan_number);

    let inputs = LadderInputs {
        project_root,
        settings: &settings,
        graph: &graph,
        changed_files,
        truths,
        browser: BrowserRequirement {
            required: settings.browser.enabled,
            available: settings.browser.enabled && settings.browser.mcp_path.is_some(),
        },
    };

    let report = verify::run(inputs).await?;

    let report_path = store.layout.verification_report_file(&graph.phase, graph.plan_number);
    crate::store::atomic::write_json_atomic(&report_path, &report)?;

    controller.mark_phase(
        LoopPhase::Verify,
        if report.merge_approved {
            LoopMark::Complete
        } else {
            LoopMark::Active
        },
    )?;

    println!(
        "verification {}: {} gap(s), report at {}",
        if report.merge_approved { "PASSED" } else { "FAILED" },
        report.gaps.len(),
        report_path.display()
    );
    for gap in &report.gaps {
        println!("  - {}: {}", gap.truth, gap.reason);
    }

    if !report.merge_approved {
        anyhow::bail!("verification ladder did not approve this plan for merge");
    }
    Ok(())
}

fn read_must_haves(
    store: &crate::store::WorkspaceStore,
    phase: &str,
    plan_number: u32,
) -> Vec<(String, String)> {
    let path = store.layout.plan_file(phase, plan_number);
    let Ok(markdown) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let Ok(doc) = plan::parse(&markdown) else {
        return Vec::new();
    };
    doc.front_matter
        .must_haves
        .into_iter()
        .map(|m| (m.truth, m.artefact))
        .collect()
}
