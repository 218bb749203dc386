//! Context Packet Builder (C2).
//!
//! Builder-style assembly grounded in `swarm/context.rs`'s `SwarmContext`,
//! generalized from "within-phase swarm delegation bundle" to the spec's
//! strict 14-slot, narrowness-invariant `ContextPacket`. Implements the
//! 13-step algorithm verbatim from §4.2.

use crate::context::index_types::{ContractsMap, ModuleMap, SymbolIndex, TestMap};
use crate::errors::PacketError;
use crate::settings::Settings;
use crate::store::WorkspaceStore;
use forge_common::packet::ContextPacket;
use forge_common::task::{TaskGraph, TaskNode, TaskStatus};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Everything the Builder reads that isn't the task graph itself. All
/// fields default to empty so a brand-new project (no indexer output yet)
/// still builds a packet with empty slices, per §4.2's contract.
#[derive(Debug, Clone, Default)]
pub struct BuilderInputs {
    pub modules: ModuleMap,
    pub contracts: ContractsMap,
    pub symbols: SymbolIndex,
    pub tests: TestMap,
    pub mission_context: String,
    pub phase_objective: String,
    pub acceptance_criteria: String,
    pub boundaries: Vec<String>,
    pub scars_digest: String,
    pub state_digest: String,
    /// True once the codebase indexer has run at least once; a brand-new
    /// project is permitted empty slices even though this is false.
    pub index_present: bool,
    pub is_brand_new_project: bool,
}

pub struct ContextPacketBuilder<'a> {
    project_root: &'a Path,
    inputs: BuilderInputs,
    settings: Settings,
}

impl<'a> ContextPacketBuilder<'a> {
    pub fn new(project_root: &'a Path, inputs: BuilderInputs, settings: Settings) -> Self {
        Self {
            project_root,
            inputs,
            settings,
        }
    }

    /// Build a packet for `task` within `graph`. Step numbers below are
    /// the step numbers from §4.2.
    pub fn build(&self, task: &TaskNode, graph: &TaskGraph) -> Result<ContextPacket, PacketError> {
        if task.declared_files.len() > TaskNode::MAX_DECLARED_FILES {
            return Err(PacketError::TooManyDeclaredFiles {
                task_id: task.id.clone(),
                count: task.declared_files.len(),
            });
        }
        if !self.inputs.index_present && !self.inputs.is_brand_new_project {
            return Err(PacketError::MissingIndex {
                task_id: task.id.clone(),
            });
        }

        // Step 1: files
        let files = task.declared_files.clone();

        // Step 2: filesContent
        let files_content = self.read_files_content(&files);

        // Step 3: architectureSlice
        let architecture_slice = self
            .inputs
            .modules
            .intersecting(&files)
            .iter()
            .map(|m| format!("{}: {}", m.name, m.summary))
            .collect::<Vec<_>>()
            .join("\n");

        // Step 4: contractsSlice
        let contracts_slice = self
            .inputs
            .contracts
            .intersecting(&files)
            .iter()
            .map(|c| format!("{}: {}", c.name, c.shape))
            .collect::<Vec<_>>()
            .join("\n");

        // Step 5: dependencySymbols (depth-1 hint only, never transitive)
        let dependency_symbols = self.dependency_symbols(&files);

        // Step 6: testsSlice
        let tests_slice = files
            .iter()
            .filter_map(|f| self.inputs.tests.map.get(f))
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        // Step 7: waveContext, truncated to 30 lines preferring recent waves
        let wave_context = build_wave_context(graph, task.wave);

        // Step 8: scarsDigest, truncated to 30 lines
        let scars_digest = truncate_lines(&self.inputs.scars_digest, ContextPacket::SCARS_DIGEST_LINE_CAP);

        // Step 9: stateDigest, first 150 lines
        let state_digest = truncate_lines(&self.inputs.state_digest, ContextPacket::STATE_DIGEST_LINE_CAP);

        // Step 10: boundaries
        let boundaries = self.inputs.boundaries.clone();

        // Step 11: missionContext / phaseObjective / acceptanceCriteria
        let mission_context = truncate_lines(
            &self.inputs.mission_context,
            ContextPacket::MISSION_CONTEXT_LINE_CAP,
        );
        let phase_objective = truncate_lines(
            &self.inputs.phase_objective,
            ContextPacket::PHASE_OBJECTIVE_LINE_CAP,
        );
        let acceptance_criteria = truncate_lines(
            &self.inputs.acceptance_criteria,
            ContextPacket::ACCEPTANCE_CRITERIA_LINE_CAP,
        );

        // Step 12: identity - task_id/tdd_mode/risk_tier taken from task
        // Step 13: tooling
        let tooling = self.settings.tooling_commands();

        Ok(ContextPacket {
            task_id: task.id.clone(),
            tdd_mode: task.tdd_mode,
            risk_tier: task.risk_tier,
            mission_context,
            phase_objective,
            files,
            files_content,
            acceptance_criteria,
            architecture_slice,
            contracts_slice,
            dependency_symbols,
            tests_slice,
            wave_context,
            scars_digest,
            state_digest,
            boundaries,
            tooling,
        })
    }

    fn read_files_content(&self, files: &[String]) -> BTreeMap<String, String> {
        files
            .iter()
            .map(|f| {
                let content = fs::read_to_string(self.project_root.join(f)).unwrap_or_default();
                (f.clone(), content)
            })
            .collect()
    }

    fn dependency_symbols(&self, files: &[String]) -> String {
        let mut lines = Vec::new();
        for f in files {
            let Some(imports) = self.inputs.symbols.imports.get(f) else {
                continue;
            };
            for imported in imports {
                if files.contains(imported) {
                    continue;
                }
                if let Some(exports) = self.inputs.symbols.exports.get(imported) {
                    lines.push(format!("{imported}: {}", exports.join(", ")));
                }
            }
        }
        lines.join("\n")
    }
}

fn build_wave_context(graph: &TaskGraph, current_wave: u32) -> String {
    let mut completed: Vec<&TaskNode> = graph
        .nodes
        .iter()
        .filter(|n| n.wave < current_wave && n.status == TaskStatus::Completed)
        .collect();
    completed.sort_by(|a, b| b.wave.cmp(&a.wave));

    let mut lines = Vec::new();
    for n in completed {
        if lines.len() >= ContextPacket::WAVE_CONTEXT_LINE_CAP {
            break;
        }
        lines.push(format!(
            "Wave {} | {}: {}; files: {}",
            n.wave,
            n.id,
            n.description,
            n.declared_files.join(", ")
        ));
    }
    lines.join("\n")
}

fn truncate_lines(s: &str, cap: usize) -> String {
    s.lines().take(cap).collect::<Vec<_>>().join("\n")
}

/// Load `BuilderInputs` from the Workspace Store's index/architecture
/// files, tolerating their absence (brand-new project).
pub fn load_inputs_from_store(store: &WorkspaceStore) -> BuilderInputs {
    let modules = crate::store::atomic::read_json(&store.layout.modules_file()).unwrap_or_default();
    let contracts =
        crate::store::atomic::read_json(&store.layout.api_contracts_file()).unwrap_or_default();
    let symbols = crate::store::atomic::read_json(&store.layout.symbols_file()).unwrap_or_default();
    let tests = crate::store::atomic::read_json(&store.layout.test_map_file()).unwrap_or_default();
    let index_present = store.layout.modules_file().exists();

    BuilderInputs {
        modules,
        contracts,
        symbols,
        tests,
        index_present,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::task::{RiskTier, TddMode};
    use tempfile::tempdir;

    fn task(id: &str, wave: u32, files: &[&str]) -> TaskNode {
        TaskNode {
            id: id.into(),
            description: "desc".into(),
            wave,
            dependencies: vec![],
            declared_files: files.iter().map(|s| s.to_string()).collect(),
            risk_tier: RiskTier::Low,
            tdd_mode: TddMode::Standard,
            skip_justification: None,
            acceptance_criteria: vec![],
            status: TaskStatus::Pending,
            failure_count: 0,
            pre_run_ref: None,
            deviations: vec![],
            deferred_items: vec![],
        }
    }

    #[test]
    fn build_respects_narrowness_invariant() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let builder = ContextPacketBuilder::new(
            dir.path(),
            BuilderInputs {
                is_brand_new_project: true,
                ..Default::default()
            },
            Settings::default(),
        );
        let t = task("t1", 0, &["a.rs"]);
        let graph = TaskGraph::new("auth", 1, vec![t.clone()]);
        let pk = builder.build(&t, &graph).unwrap();
        assert!(pk.is_narrow_for(&t.declared_files));
        assert_eq!(pk.files_content.get("a.rs").unwrap(), "fn a() {}");
    }

    #[test]
    fn build_errors_on_missing_index_for_existing_project() {
        let dir = tempdir().unwrap();
        let builder = ContextPacketBuilder::new(dir.path(), BuilderInputs::default(), Settings::default());
        let t = task("t1", 0, &["a.rs"]);
        let graph = TaskGraph::new("auth", 1, vec![t.clone()]);
        assert!(matches!(
            builder.build(&t, &graph),
            Err(PacketError::MissingIndex { .. })
        ));
    }

    #[test]
    fn build_errors_when_too_many_declared_files() {
        let dir = tempdir().unwrap();
        let builder = ContextPacketBuilder::new(
            dir.path(),
            BuilderInputs {
                is_brand_new_project: true,
                ..Default::default()
            },
            Settings::default(),
        );
        let t = task("t1", 0, &["a", "b", "c", "d", "e", "f", "g"]);
        let graph = TaskGraph::new("auth", 1, vec![t.clone()]);
        assert!(matches!(
            builder.build(&t, &graph),
            Err(PacketError::TooManyDeclaredFiles { .. })
        ));
    }

    #[test]
    fn wave_context_prefers_recent_waves_and_truncates() {
        let mut nodes = Vec::new();
        for w in 0..40u32 {
            let mut n = task(&format!("t{w}"), w, &["f.rs"]);
            n.status = TaskStatus::Completed;
            nodes.push(n);
        }
        let graph = TaskGraph::new("auth", 1, nodes);
        let ctx = build_wave_context(&graph, 40);
        assert_eq!(ctx.lines().count(), ContextPacket::WAVE_CONTEXT_LINE_CAP);
        assert!(ctx.starts_with("Wave 39"));
    }

    #[test]
    fn missing_symbol_index_yields_empty_slot_but_proceeds() {
        let dir = tempdir().unwrap();
        let builder = ContextPacketBuilder::new(
            dir.path(),
            BuilderInputs {
                is_brand_new_project: true,
                ..Default::default()
            },
            Settings::default(),
        );
        let t = task("t1", 0, &["a.rs"]);
        let graph = TaskGraph::new("auth", 1, vec![t.clone()]);
        let pk = builder.build(&t, &graph).unwrap();
        assert_eq!(pk.dependency_symbols, "");
    }
}
