//! `forge run`: chain plan -> execute -> verify -> unify automatically,
//! pausing at checkpoints per `pipeline.auto_advance`.

use crate::cmd::{cmd_execute, cmd_plan, cmd_unify, cmd_verify, open_store_with_settings};
use anyhow::Result;
use std::path::Path;

pub async fn cmd_run(
    project_root: &Path,
    workspace: Option<&Path>,
    settings: Option<&Path>,
    phase: &str,
    plan_number: u32,
    runtime: &str,
) -> Result<()> {
    let store = open_store_with_settings(project_root, workspace, settings);
    let workspace_settings = store.read_settings()?;
    let auto_advance = workspace_settings.pipeline.auto_advance;

    println!("== plan ==");
    cmd_plan(project_root, workspace, settings, phase, plan_number, runtime).await?;

    if !auto_advance {
        println!("pipeline.auto_advance is off; stopping after plan. Run `forge execute` to continue.");
        return Ok(());
    }

    println!("== execute ==");
    cmd_execute(project_root, workspace, settings, runtime, auto_advance).await?;

    println!("== verify ==");
    cmd_verify(project_root, workspace, settings).await?;

    println!("== unify ==");
    cmd_unify(project_root, workspace, settings)?;

    Ok(())
}
