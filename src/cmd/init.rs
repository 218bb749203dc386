//! `forge init`: materialise the numbered workspace skeleton and default
//! settings for a new or existing project directory.

use crate::cmd::open_store_with_settings;
use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_init(
    project_root: &Path,
    workspace: Option<&Path>,
    settings: Option<&Path>,
    project_name: &str,
) -> Result<()> {
    if git2::Repository::open(project_root).is_err() {
        println!(
            "warning: {} is not a git repository; checkpoints require a version-control backend",
            project_root.display()
        );
    }

    let store = open_store_with_settings(project_root, workspace, settings);
    store
        .initialise(project_name)
        .context("failed to initialise workspace skeleton")?;

    println!(
        "Initialised workspace at {}",
        store.layout.root.display()
    );
    Ok(())
}
