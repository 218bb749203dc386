//! `forge recover`: interactive rollback to a prior checkpoint.

use crate::checkpoint::CheckpointManager;
use crate::cmd::open_store_with_settings;
use crate::scars::ScarRegistry;
use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::Path;

pub fn cmd_recover(
    project_root: &Path,
    workspace: Option<&Path>,
    settings: Option<&Path>,
    checkpoint_id: &str,
    assume_yes: bool,
) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let mgr = CheckpointManager::open(project_root).context("failed to open git repository")?;

    let checkpoint_path = store.layout.checkpoint_file(checkpoint_id);
    let checkpoint: forge_common::Checkpoint = crate::store::atomic::read_json(&checkpoint_path)
        .with_context(|| format!("unknown checkpoint {checkpoint_id}"))?;

    if !assume_yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Roll back to checkpoint {} (task {}, {})? This quarantines the current diff.",
                checkpoint.id, checkpoint.task_id, checkpoint.reason
            ))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;
        if !confirmed {
            println!("recover aborted");
            return Ok(());
        }
    }

    let quarantine_dir = mgr.rollback(&checkpoint, &store)?;

    let registry = ScarRegistry::new(&store);
    registry.record_rollback(
        format!("manual recovery to checkpoint {}", checkpoint.id),
        "operator-initiated rollback",
        "review the quarantined diff before re-attempting this task",
        checkpoint.id.clone(),
    )?;

    if let Some(mut graph) = store.read_task_graph()? {
        if let Some(n) = graph.find_mut(&checkpoint.task_id) {
            n.status = forge_common::task::TaskStatus::Pending;
        }
        store.write_task_graph(&graph)?;
    }

    println!(
        "rolled back to checkpoint {}; quarantined diff at {}",
        checkpoint.id,
        quarantine_dir.display()
    );
    Ok(())
}
