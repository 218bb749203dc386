//! The workspace settings file (`01-governance/settings.json`).
//!
//! JSON, not TOML — per §6 of the specification — but the layered
//! defaults-plus-overrides shape is carried straight over from the
//! teacher's `forge_config.rs` (`DefaultsConfig`/`PhaseOverride`/
//! `PhasesConfig`), which did the equivalent for `.forge/forge.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyLevel {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    #[serde(default = "default_true")]
    pub parallelization: bool,
    #[serde(default = "default_max_parallel_workers")]
    pub max_parallel_workers: usize,
    /// Seconds an auto-advance transition pauses for human cancellation.
    #[serde(default = "default_advance_pause_secs")]
    pub advance_pause_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_parallel_workers() -> usize {
    5
}

fn default_advance_pause_secs() -> u64 {
    5
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            auto_advance: default_true(),
            parallelization: default_true(),
            max_parallel_workers: default_max_parallel_workers(),
            advance_pause_secs: default_advance_pause_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomySection {
    #[serde(default)]
    pub default: AutonomyLevel,
    #[serde(default)]
    pub overrides: HashMap<String, AutonomyLevel>,
}

impl Default for AutonomySection {
    fn default() -> Self {
        Self {
            default: AutonomyLevel::default(),
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TddDefault {
    Hard,
    #[default]
    Standard,
    Skip,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TddSection {
    #[serde(default)]
    pub default: TddDefault,
    #[serde(default)]
    pub overrides: HashMap<String, TddDefault>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsSection {
    pub test: Option<String>,
    pub lint: Option<String>,
    pub typecheck: Option<String>,
    pub format_check: Option<String>,
    pub build: Option<String>,
    pub integration: Option<String>,
    pub e2e: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserSection {
    #[serde(default)]
    pub enabled: bool,
    pub mcp_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointsSection {
    #[serde(default = "default_true")]
    pub before_high_risk: bool,
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
}

fn default_max_retained() -> usize {
    10
}

impl Default for CheckpointsSection {
    fn default() -> Self {
        Self {
            before_high_risk: default_true(),
            max_retained: default_max_retained(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsSection {
    #[serde(default)]
    pub on_high_risk: bool,
    #[serde(default)]
    pub on_critical_risk: bool,
    #[serde(default)]
    pub on_scar: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub autonomy: AutonomySection,
    #[serde(default)]
    pub tdd: TddSection,
    #[serde(default)]
    pub commands: CommandsSection,
    #[serde(default)]
    pub browser: BrowserSection,
    #[serde(default)]
    pub checkpoints: CheckpointsSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
    #[serde(default)]
    pub required_skills: HashMap<String, Vec<String>>,
}

impl Settings {
    pub fn tooling_commands(&self) -> forge_common::packet::ToolingCommands {
        forge_common::packet::ToolingCommands {
            test: self.commands.test.clone(),
            lint: self.commands.lint.clone(),
            typecheck: self.commands.typecheck.clone(),
            format_check: self.commands.format_check.clone(),
            build: self.commands.build.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_has_five_worker_ceiling() {
        let s = Settings::default();
        assert_eq!(s.pipeline.max_parallel_workers, 5);
        assert_eq!(s.checkpoints.max_retained, 10);
        assert!(s.pipeline.auto_advance);
    }

    #[test]
    fn settings_round_trip_json() {
        let s = Settings::default();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pipeline.max_parallel_workers, s.pipeline.max_parallel_workers);
    }

    #[test]
    fn tooling_commands_carries_through_unset_fields() {
        let mut s = Settings::default();
        s.commands.test = Some("cargo test".to_string());
        let tooling = s.tooling_commands();
        assert_eq!(tooling.test.as_deref(), Some("cargo test"));
        assert_eq!(tooling.lint, None);
    }
}
