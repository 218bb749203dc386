//! `forge execute`: drive the current task graph wave by wave through the
//! Worker Dispatcher, honouring file-disjointness, the three-consecutive-
//! failures rule, and checkpoint frames for blocked tasks.

use crate::checkpoint::CheckpointManager;
use crate::cmd::open_store_with_settings;
use crate::context::builder::load_inputs_from_store;
use crate::context::{BuilderInputs, ContextPacketBuilder};
use crate::dag::WaveScheduler;
use crate::dispatch::protocol::{BlockedKind, PermissionDecision, PermissionRequestBody};
use crate::dispatch::{resolve_adapter, PermissionResolver, WorkerDispatcher, WorkerOutcome};
use crate::errors::LoopError;
use crate::loopctl::{present_checkpoint, CheckpointFrame, CheckpointKind, CheckpointResolution, LoopController, LoopPhase};
use crate::scars::ScarRegistry;
use crate::store::mission_log::MissionEvent;
use anyhow::{anyhow, Context, Result};
use forge_common::project_state::LoopMark;
use forge_common::task::TaskGraph;
use std::path::Path;
use std::time::Duration;

/// Grants any request whose path falls within the dispatching task's
/// declared files or architecture slice boundaries; denies everything
/// else. Constructed fresh per task dispatch.
struct BoundaryResolver<'a> {
    declared_files: &'a [String],
    boundaries: &'a [String],
}

impl<'a> PermissionResolver for BoundaryResolver<'a> {
    fn resolve(&mut self, request: &PermissionRequestBody) -> PermissionDecision {
        let within_declared = self.declared_files.iter().any(|f| f == &request.path);
        let within_boundary = self
            .boundaries
            .iter()
            .any(|b| request.path == *b || request.path.starts_with(&format!("{b}/")));
        if within_declared || !within_boundary {
            PermissionDecision::Grant {
                content: String::new(),
            }
        } else {
            PermissionDecision::Deny {
                reason: format!("{} falls within an explicit boundary", request.path),
            }
        }
    }
}

pub async fn cmd_execute(
    project_root: &Path,
    workspace: Option<&Path>,
    settings: Option<&Path>,
    runtime: &str,
    auto_advance: bool,
) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let settings = store.read_settings().context("failed to read settings")?;
    let mut graph = store
        .read_task_graph()?
        .ok_or_else(|| anyhow!("no task graph found; run `forge plan` first"))?;

    let controller = LoopController::new(&store);
    controller.validate_for_execute(&graph, settings.checkpoints.before_high_risk)?;
    controller.mark_phase(LoopPhase::Execute, LoopMark::Active)?;

    let adapter = resolve_adapter(runtime, settings.browser.enabled)
        .ok_or_else(|| anyhow!("unknown runtime adapter: {runtime}"))?;
    let (command, args) = adapter.command();

    let checkpoint_mgr = CheckpointManager::open(project_root).ok();
    let dispatcher = WorkerDispatcher::new(Duration::from_secs(1800));
    let builder_inputs = load_inputs_from_store(&store);
    let mission_log = store.mission_log();

    {
        let mut scheduler = WaveScheduler::new(&mut graph);
        scheduler.reconcile_resumed(checkpoint_mgr.as_ref());
        scheduler.validate().map_err(LoopError::from)?;
    }

    for wave in 0..graph.wave_count {
        mission_log.append(MissionEvent::WaveStarted { wave })?;

        loop {
            let ready_ids: Vec<String> = {
                let scheduler = WaveScheduler::new(&mut graph);
                scheduler.ready_in_wave(wave).into_iter().map(|n| n.id.clone()).collect()
            };
            if ready_ids.is_empty() {
                break;
            }

            for task_id in ready_ids {
                dispatch_one_task(
                    &task_id,
                    &mut graph,
                    &store,
                    &builder_inputs,
                    &command,
                    &args,
                    &dispatcher,
                    checkpoint_mgr.as_ref(),
                    auto_advance,
                )
                .await?;
                store.write_task_graph(&graph)?;
            }

            let complete = WaveScheduler::new(&mut graph).wave_is_complete(wave);
            if complete {
                break;
            }
        }

        mission_log.append(MissionEvent::WaveCompleted { wave })?;
        if !graph.nodes_in_wave(wave).all(|n| n.status.is_terminal()) {
            println!("wave {wave} has blocked tasks; halting execute");
            controller.mark_phase(LoopPhase::Execute, LoopMark::Active)?;
            return Ok(());
        }
    }

    store.write_task_graph(&graph)?;
    controller.mark_phase(LoopPhase::Execute, LoopMark::Complete)?;
    println!("all {} waves dispatched", graph.wave_count);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_one_task(
    task_id: &str,
    graph: &mut TaskGraph,
    store: &crate::store::WorkspaceStore,
    builder_inputs: &BuilderInputs,
    command: &str,
    args: &[String],
    dispatcher: &WorkerDispatcher,
    checkpoint_mgr: Option<&CheckpointManager>,
    auto_advance: bool,
) -> Result<()> {
    let task = graph
        .find(task_id)
        .ok_or_else(|| anyhow!("task {task_id} vanished from the graph"))?
        .clone();

    let mut inputs = builder_inputs.clone();
    inputs.acceptance_criteria = task.acceptance_criteria.join("\n");
    inputs.phase_objective = format!("Complete task {}: {}", task.id, task.description);

    let settings = store.read_settings()?;
    let builder = ContextPacketBuilder::new(store.layout.root.parent().unwrap_or(&store.layout.root), inputs, settings);
    let packet = builder.build(&task, graph)?;

    let mut pre_run_ref: Option<String> = None;
    if let Some(mgr) = checkpoint_mgr {
        if let Ok(checkpoint) = mgr.create(task_id, "pre-dispatch snapshot") {
            crate::store::atomic::write_json_atomic(
                &store.layout.checkpoint_file(&checkpoint.id),
                &checkpoint,
            )?;
            store.mission_log().append(MissionEvent::CheckpointCreated {
                checkpoint_id: checkpoint.id.clone(),
                task_id: task_id.to_string(),
            })?;
            pre_run_ref = Some(checkpoint.vcs_ref.clone());
            if let Some(n) = graph.find_mut(task_id) {
                n.pre_run_ref = Some(checkpoint.vcs_ref.clone());
            }
        }
    }

    {
        let mut scheduler = WaveScheduler::new(graph);
        scheduler.mark_running(task_id);
    }
    store.mission_log().append(MissionEvent::TaskDispatched {
        task_id: task_id.to_string(),
    })?;

    let prompt = render_task_prompt(&packet);
    let mut resolver = BoundaryResolver {
        declared_files: &task.declared_files,
        boundaries: &packet.boundaries,
    };

    // A checkpoint resolved as "resume" goes back around this loop and
    // re-dispatches the same task rather than being marked completed —
    // the worker hadn't finished, it had only paused at a human gate.
    loop {
        let outcome = dispatcher.run(command, args, &prompt, &mut resolver).await;

        match outcome {
            Ok(WorkerOutcome::Complete(body)) => {
                let spot_check_passed = match (checkpoint_mgr, pre_run_ref.as_deref()) {
                    (Some(mgr), Some(pre_run_ref)) => {
                        mgr.spot_check(pre_run_ref, &body.files_modified).unwrap_or(false)
                    }
                    _ => true,
                };
                if spot_check_passed {
                    let mut scheduler = WaveScheduler::new(graph);
                    scheduler.mark_completed(task_id);
                    store.mission_log().append(MissionEvent::TaskCompleted {
                        task_id: task_id.to_string(),
                        files_modified: body.files_modified,
                    })?;
                    if let Some(n) = graph.find_mut(task_id) {
                        n.deviations = body.deviations;
                        n.deferred_items = body.deferred;
                    }
                } else {
                    store.mission_log().append(MissionEvent::TaskBlocked {
                        task_id: task_id.to_string(),
                        kind: "SpotCheckFailed".to_string(),
                        reason: "worker reported completion the spot-check could not confirm".to_string(),
                    })?;
                    record_failure(graph, store, task_id)?;
                }
                break;
            }
            Ok(WorkerOutcome::Blocked(body)) => {
                store.mission_log().append(MissionEvent::TaskBlocked {
                    task_id: task_id.to_string(),
                    kind: format!("{:?}", body.kind),
                    reason: body.reason.clone(),
                })?;
                if let Some(kind) = CheckpointKind::from_blocked_kind(body.kind) {
                    let frame = CheckpointFrame {
                        kind,
                        prompt: format!("task {task_id}: {}", body.reason),
                        options: body.options.clone(),
                    };
                    match present_checkpoint(&frame, auto_advance)? {
                        CheckpointResolution::Aborted => {
                            record_failure(graph, store, task_id)?;
                            break;
                        }
                        _ => continue,
                    }
                } else {
                    record_failure(graph, store, task_id)?;
                    break;
                }
            }
            Ok(WorkerOutcome::PermissionRequest(_)) => {
                record_failure(graph, store, task_id)?;
                break;
            }
            Ok(WorkerOutcome::Timeout) | Ok(WorkerOutcome::Crash { .. }) | Err(_) => {
                record_failure(graph, store, task_id)?;
                break;
            }
        }
    }

    Ok(())
}

fn record_failure(graph: &mut TaskGraph, store: &crate::store::WorkspaceStore, task_id: &str) -> Result<()> {
    let three_strikes = {
        let mut scheduler = WaveScheduler::new(graph);
        scheduler.mark_failed(task_id)
    };
    if three_strikes.is_err() {
        let registry = ScarRegistry::new(store);
        registry.record_escalation(
            task_id,
            "three consecutive dispatch failures",
            format!("review task {task_id}'s declared files and acceptance criteria before retrying"),
        )?;
    }
    Ok(())
}

fn render_task_prompt(packet: &forge_common::packet::ContextPacket) -> String {
    let mut out = String::new();
    out.push_str(&format!("Task: {}\n", packet.task_id));
    out.push_str(&format!("Objective: {}\n\n", packet.phase_objective));
    out.push_str("Declared files (touch only these):\n");
    for f in &packet.files {
        out.push_str(&format!("- {f}\n"));
    }
    out.push_str(&format!("\nAcceptance criteria:\n{}\n", packet.acceptance_criteria));
    if !packet.scars_digest.is_empty() {
        out.push_str(&format!("\nPrevention rules from past failures:\n{}\n", packet.scars_digest));
    }
    out.push_str(
        "\nReport progress with <<STATUS>>, finish with <<COMPLETE>>, stop with <<BLOCKED>> \
         if you cannot proceed, and request permission with <<PERMISSION_REQUEST>> before \
         touching a file outside your declared list.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_resolver_grants_declared_file() {
        let declared = vec!["src/a.rs".to_string()];
        let boundaries = vec!["src/billing".to_string()];
        let mut resolver = BoundaryResolver {
            declared_files: &declared,
            boundaries: &boundaries,
        };
        let decision = resolver.resolve(&PermissionRequestBody {
            path: "src/a.rs".to_string(),
            reason: "need it".to_string(),
        });
        assert!(matches!(decision, PermissionDecision::Grant { .. }));
    }

    #[test]
    fn boundary_resolver_denies_path_inside_boundary() {
        let declared = vec!["src/a.rs".to_string()];
        let boundaries = vec!["src/billing".to_string()];
        let mut resolver = BoundaryResolver {
            declared_files: &declared,
            boundaries: &boundaries,
        };
        let decision = resolver.resolve(&PermissionRequestBody {
            path: "src/billing/invoice.rs".to_string(),
            reason: "need it".to_string(),
        });
        assert!(matches!(decision, PermissionDecision::Deny { .. }));
    }
}
