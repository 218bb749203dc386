//! `forge plan <phase>`: dispatch an architect worker to write a plan
//! document, then parse and validate it into a `TaskGraph`.

use crate::cmd::open_store_with_settings;
use crate::dag::WaveScheduler;
use crate::dispatch::{resolve_adapter, DenyAll, WorkerDispatcher, WorkerOutcome};
use crate::errors::LoopError;
use crate::loopctl::{LoopController, LoopPhase};
use crate::plan;
use crate::store::mission_log::MissionEvent;
use anyhow::{anyhow, Context, Result};
use forge_common::project_state::LoopMark;
use std::path::Path;
use std::time::Duration;

pub async fn cmd_plan(
    project_root: &Path,
    workspace: Option<&Path>,
    settings: Option<&Path>,
    phase: &str,
    plan_number: u32,
    runtime: &str,
) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let settings = store.read_settings().context("failed to read settings")?;
    let state = store.read_project_state()?;

    let plan_file = store.layout.plan_file(phase, plan_number);
    std::fs::create_dir_all(
        plan_file
            .parent()
            .ok_or_else(|| anyhow!("plan file has no parent directory"))?,
    )?;

    let adapter = resolve_adapter(runtime, settings.browser.enabled)
        .ok_or_else(|| anyhow!("unknown runtime adapter: {runtime}"))?;
    let (command, args) = adapter.command();

    let prompt = render_planning_prompt(phase, plan_number, &plan_file, &state.next_action);

    let dispatcher = WorkerDispatcher::new(Duration::from_secs(900));
    let outcome = dispatcher
        .run(&command, &args, &prompt, &mut DenyAll)
        .await
        .context("planning worker dispatch failed")?;

    match outcome {
        WorkerOutcome::Complete(body) => {
            println!("planner reported completion: {}", body.summary);
        }
        WorkerOutcome::Blocked(body) => {
            return Err(anyhow!("planner blocked: {}", body.reason));
        }
        other => {
            return Err(anyhow!("planner did not complete normally: {other:?}"));
        }
    }

    let markdown = std::fs::read_to_string(&plan_file)
        .with_context(|| format!("planner did not write {}", plan_file.display()))?;
    let doc = plan::parse(&markdown)?;
    let graph = doc.front_matter.to_graph();

    let mut validation_graph = graph.clone();
    WaveScheduler::new(&mut validation_graph)
        .validate()
        .map_err(LoopError::from)?;

    store.write_task_graph(&graph)?;

    let controller = LoopController::new(&store);
    controller.mark_phase(LoopPhase::Planning, LoopMark::Complete)?;
    store.mission_log().append(MissionEvent::LoopTransition {
        from: "planning".to_string(),
        to: "execute".to_string(),
    })?;

    println!(
        "Plan {} #{} written to {} ({} tasks across {} waves)",
        phase,
        plan_number,
        plan_file.display(),
        graph.nodes.len(),
        graph.wave_count
    );
    Ok(())
}

fn render_planning_prompt(phase: &str, plan_number: u32, plan_file: &Path, next_action: &str) -> String {
    format!(
        "You are the architect for phase '{phase}', plan #{plan_number} (current state: {next_action}).\n\n\
         Decompose the phase's objective into tasks assigned to dependency waves, each task \
         declaring at most 6 files it may touch, a risk tier (low/medium/high/critical), a TDD \
         mode (hard/standard/skip, with a justification string if skip), and acceptance criteria.\n\n\
         Write the plan as a Markdown document to {} with a leading YAML front-matter block \
         (delimited by '---' lines) carrying: phase, plan_number, status, risk_tier, tdd_mode, \
         review_tier, browser_required, checkpoint_before, wave_count, must_haves, and tasks — \
         followed by a rendered acceptance-criteria table, one section per task, a Boundaries \
         section, and a Verification section.\n\n\
         Two tasks in the same wave must never declare the same file. Report progress with \
         <<STATUS>> and finish with <<COMPLETE>> once the plan file is written.\n",
        plan_file.display()
    )
}
