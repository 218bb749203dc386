//! CLI command implementations: one module per top-level subcommand.
//!
//! Each handler opens its own `WorkspaceStore` and returns `anyhow::Result`
//! so `main.rs` can downcast against the typed error enums from `errors.rs`
//! to pick an exit code.

pub mod doctor;
pub mod execute;
pub mod init;
pub mod plan;
pub mod recover;
pub mod run;
pub mod scars;
pub mod status;
pub mod unify;
pub mod verify;

pub use doctor::cmd_doctor;
pub use execute::cmd_execute;
pub use init::cmd_init;
pub use plan::cmd_plan;
pub use recover::cmd_recover;
pub use run::cmd_run;
pub use scars::cmd_scars;
pub use status::cmd_status;
pub use unify::cmd_unify;
pub use verify::cmd_verify;

use crate::store::WorkspaceStore;
use std::path::{Path, PathBuf};

/// Default workspace directory name, relative to the project root.
pub const DEFAULT_WORKSPACE_DIR: &str = ".nexus";

pub fn workspace_path(project_root: &Path, workspace: Option<&Path>) -> PathBuf {
    match workspace {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => project_root.join(p),
        None => project_root.join(DEFAULT_WORKSPACE_DIR),
    }
}

pub fn open_store(project_root: &Path, workspace: Option<&Path>) -> WorkspaceStore {
    open_store_with_settings(project_root, workspace, None)
}

/// As `open_store`, but honouring `--settings <path>` when the caller's
/// workspace layout should read/write the governance settings file
/// somewhere other than `01-governance/settings.json`.
pub fn open_store_with_settings(
    project_root: &Path,
    workspace: Option<&Path>,
    settings_override: Option<&Path>,
) -> WorkspaceStore {
    let root = workspace_path(project_root, workspace);
    let layout = match settings_override {
        Some(p) => crate::store::layout::WorkspaceLayout::new(root).with_settings_override(p),
        None => crate::store::layout::WorkspaceLayout::new(root),
    };
    WorkspaceStore { layout }
}
