//! The numbered-section workspace layout (`.nexus/` by default).

use std::path::{Path, PathBuf};

/// Path handles for the nine numbered sections and the files within them
/// that the rest of the engine reads and writes.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    settings_override: Option<PathBuf>,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings_override: None,
        }
    }

    /// Read/write the settings file at an explicit path instead of the
    /// default `01-governance/settings.json` (CLI `--settings <path>`).
    pub fn with_settings_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_override = Some(path.into());
        self
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn mission_dir(&self) -> PathBuf {
        self.root.join("00-mission")
    }

    pub fn governance_dir(&self) -> PathBuf {
        self.root.join("01-governance")
    }

    pub fn architecture_dir(&self) -> PathBuf {
        self.root.join("02-architecture")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("03-index")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root.join("04-plans")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join("05-runtime")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("06-checkpoints")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("07-artifacts")
    }

    pub fn browser_automation_dir(&self) -> PathBuf {
        self.root.join("08-browser-automation")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.settings_override
            .clone()
            .unwrap_or_else(|| self.governance_dir().join("settings.json"))
    }

    pub fn state_file(&self) -> PathBuf {
        self.governance_dir().join("state.md")
    }

    pub fn scars_file(&self) -> PathBuf {
        self.governance_dir().join("scars.json")
    }

    pub fn active_rules_file(&self) -> PathBuf {
        self.governance_dir().join("active-rules.json")
    }

    pub fn modules_file(&self) -> PathBuf {
        self.architecture_dir().join("modules.json")
    }

    pub fn dependencies_file(&self) -> PathBuf {
        self.architecture_dir().join("dependencies.json")
    }

    pub fn api_contracts_file(&self) -> PathBuf {
        self.architecture_dir().join("api-contracts.json")
    }

    pub fn index_files_file(&self) -> PathBuf {
        self.index_dir().join("files.json")
    }

    pub fn symbols_file(&self) -> PathBuf {
        self.index_dir().join("symbols.json")
    }

    pub fn test_map_file(&self) -> PathBuf {
        self.index_dir().join("test-map.json")
    }

    pub fn plan_dir(&self, phase: &str, plan_number: u32) -> PathBuf {
        self.plans_dir().join(format!("{phase}-{plan_number:02}"))
    }

    pub fn plan_file(&self, phase: &str, plan_number: u32) -> PathBuf {
        self.plan_dir(phase, plan_number).join("plan.md")
    }

    pub fn summary_file(&self, phase: &str, plan_number: u32) -> PathBuf {
        self.plan_dir(phase, plan_number).join("summary.md")
    }

    pub fn verification_report_file(&self, phase: &str, plan_number: u32) -> PathBuf {
        self.plan_dir(phase, plan_number)
            .join("verification-report.json")
    }

    pub fn task_graph_file(&self) -> PathBuf {
        self.runtime_dir().join("task-graph.json")
    }

    pub fn mission_log_file(&self) -> PathBuf {
        self.runtime_dir().join("mission-log.ndjson")
    }

    pub fn checkpoint_file(&self, id: &str) -> PathBuf {
        self.checkpoints_dir().join(format!("checkpoint-{id}.json"))
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.checkpoints_dir().join("snapshots")
    }

    pub fn handoff_file(&self) -> PathBuf {
        self.mission_dir().join("handoff.md")
    }

    /// Every directory the skeleton must contain, in creation order.
    pub fn all_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.mission_dir(),
            self.governance_dir(),
            self.architecture_dir(),
            self.index_dir(),
            self.plans_dir(),
            self.runtime_dir(),
            self.checkpoints_dir(),
            self.snapshots_dir(),
            self.artifacts_dir(),
            self.browser_automation_dir(),
        ]
    }
}

impl AsRef<Path> for WorkspaceLayout {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_derives_paths_under_root() {
        let layout = WorkspaceLayout::new("/tmp/project/.nexus");
        assert_eq!(
            layout.settings_file(),
            PathBuf::from("/tmp/project/.nexus/01-governance/settings.json")
        );
        assert_eq!(
            layout.mission_log_file(),
            PathBuf::from("/tmp/project/.nexus/05-runtime/mission-log.ndjson")
        );
    }

    #[test]
    fn all_dirs_covers_nine_sections_plus_snapshots() {
        let layout = WorkspaceLayout::new("/tmp/x");
        assert_eq!(layout.all_dirs().len(), 10);
    }

    #[test]
    fn settings_override_replaces_default_path() {
        let layout = WorkspaceLayout::new("/tmp/x").with_settings_override("/etc/forge/settings.json");
        assert_eq!(layout.settings_file(), PathBuf::from("/etc/forge/settings.json"));
    }

    #[test]
    fn plan_dir_combines_phase_and_number() {
        let layout = WorkspaceLayout::new("/tmp/x");
        assert_eq!(
            layout.plan_dir("auth", 1),
            PathBuf::from("/tmp/x/04-plans/auth-01")
        );
    }
}
