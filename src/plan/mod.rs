//! Plan document (C4 input): the Markdown-with-YAML-front-matter file that
//! `04-plans/<phase>-<NN>/plan.md` holds. The front matter is the parser's
//! source of truth for the task graph; the Markdown body is a rendered,
//! human-facing view (acceptance-criteria table, task sections, boundaries,
//! verification) regenerated from the same data on every `render`.
//!
//! Teacher's `phase.rs` loads phases from plain JSON, so it has nothing to
//! adapt here; this parser is a fresh pattern, grounded in the same
//! `serde_yaml` dependency the teacher's `Cargo.toml` already carries (then
//! unused) plus its string-splitting style of reading structured files
//! (`phase.rs`'s line-oriented parsing of promise markers).

use crate::errors::PlanError;
use forge_common::task::{RiskTier, TaskGraph, TaskNode, TaskStatus, TddMode};
use serde::{Deserialize, Serialize};

const FRONT_MATTER_DELIM: &str = "---";

/// One `{truth, artefact}` pair from the front matter's must-haves list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MustHave {
    pub truth: String,
    pub artefact: String,
    #[serde(default)]
    pub key_links: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    Approved,
    InProgress,
    Verified,
    Unified,
}

/// The YAML front matter block: everything the engine needs to reconstruct
/// a `TaskGraph` without re-parsing the Markdown body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFrontMatter {
    pub phase: String,
    pub plan_number: u32,
    pub status: PlanStatus,
    pub risk_tier: RiskTier,
    pub tdd_mode: TddMode,
    pub review_tier: String,
    pub browser_required: bool,
    pub checkpoint_before: bool,
    pub wave_count: u32,
    pub must_haves: Vec<MustHave>,
    pub tasks: Vec<PlanTask>,
}

/// One task section's front-matter fields. `action` and the acceptance
/// criteria reference live in the rendered body only and are not needed to
/// reconstruct the graph, so they are not duplicated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: String,
    pub description: String,
    pub wave: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub declared_files: Vec<String>,
    pub risk_tier: RiskTier,
    pub tdd_mode: TddMode,
    #[serde(default)]
    pub skip_justification: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

pub struct PlanDocument {
    pub front_matter: PlanFrontMatter,
    pub boundaries: Vec<String>,
    pub verification_notes: String,
}

impl PlanFrontMatter {
    pub fn from_graph(graph: &TaskGraph, must_haves: Vec<MustHave>, checkpoint_before: bool) -> Self {
        let risk_tier = graph
            .nodes
            .iter()
            .map(|n| n.risk_tier)
            .max_by_key(|r| *r as u8)
            .unwrap_or(RiskTier::Low);
        let browser_required = must_haves
            .iter()
            .any(|m| m.truth.to_lowercase().contains("browser"));
        PlanFrontMatter {
            phase: graph.phase.clone(),
            plan_number: graph.plan_number,
            status: PlanStatus::Draft,
            risk_tier,
            tdd_mode: TddMode::Standard,
            review_tier: "standard".to_string(),
            browser_required,
            checkpoint_before,
            wave_count: graph.wave_count,
            must_haves,
            tasks: graph.nodes.iter().map(PlanTask::from_node).collect(),
        }
    }

    pub fn to_graph(&self) -> TaskGraph {
        let nodes = self
            .tasks
            .iter()
            .map(PlanTask::to_node)
            .map(TaskNode::normalize)
            .collect();
        TaskGraph::new(self.phase.clone(), self.plan_number, nodes)
    }
}

impl PlanTask {
    fn from_node(node: &TaskNode) -> Self {
        PlanTask {
            id: node.id.clone(),
            description: node.description.clone(),
            wave: node.wave,
            dependencies: node.dependencies.clone(),
            declared_files: node.declared_files.clone(),
            risk_tier: node.risk_tier,
            tdd_mode: node.tdd_mode,
            skip_justification: node.skip_justification.clone(),
            acceptance_criteria: node.acceptance_criteria.clone(),
        }
    }

    fn to_node(&self) -> TaskNode {
        TaskNode {
            id: self.id.clone(),
            description: self.description.clone(),
            wave: self.wave,
            dependencies: self.dependencies.clone(),
            declared_files: self.declared_files.clone(),
            risk_tier: self.risk_tier,
            tdd_mode: self.tdd_mode,
            skip_justification: self.skip_justification.clone(),
            acceptance_criteria: self.acceptance_criteria.clone(),
            status: TaskStatus::Pending,
            failure_count: 0,
            pre_run_ref: None,
            deviations: vec![],
            deferred_items: vec![],
        }
    }
}

/// Render a plan document to Markdown: `---\n<yaml>\n---\n` front matter
/// followed by an acceptance-criteria table, one section per task,
/// a boundaries section and a verification section.
pub fn render(doc: &PlanDocument) -> Result<String, PlanError> {
    let yaml = serde_yaml::to_string(&doc.front_matter).map_err(PlanError::Yaml)?;
    let mut body = String::new();
    body.push_str(FRONT_MATTER_DELIM);
    body.push('\n');
    body.push_str(&yaml);
    body.push_str(FRONT_MATTER_DELIM);
    body.push_str("\n\n");

    body.push_str(&format!("# Plan: {} #{}\n\n", doc.front_matter.phase, doc.front_matter.plan_number));

    body.push_str("## Acceptance Criteria\n\n| Truth | Artefact |\n|---|---|\n");
    for m in &doc.front_matter.must_haves {
        body.push_str(&format!("| {} | {} |\n", m.truth, m.artefact));
    }
    body.push('\n');

    for task in &doc.front_matter.tasks {
        body.push_str(&format!("## Task {}\n\n", task.id));
        body.push_str(&format!("- wave: {}\n", task.wave));
        body.push_str(&format!("- dependencies: {}\n", task.dependencies.join(", ")));
        body.push_str(&format!("- risk: {:?}\n", task.risk_tier));
        body.push_str(&format!("- tdd-mode: {:?}\n", task.tdd_mode));
        body.push_str(&format!("- files-modified: {}\n", task.declared_files.join(", ")));
        body.push_str(&format!("\n{}\n\n", task.description));
        if !task.acceptance_criteria.is_empty() {
            body.push_str("Acceptance criteria:\n");
            for ac in &task.acceptance_criteria {
                body.push_str(&format!("- {ac}\n"));
            }
            body.push('\n');
        }
    }

    body.push_str("## Boundaries\n\n");
    for b in &doc.boundaries {
        body.push_str(&format!("- {b}\n"));
    }
    body.push_str("\n## Verification\n\n");
    body.push_str(&doc.verification_notes);
    body.push('\n');

    Ok(body)
}

/// Parse a plan document, taking only the front matter as authoritative.
/// The body is never re-parsed — it is rendered output, not input.
pub fn parse(markdown: &str) -> Result<PlanDocument, PlanError> {
    let trimmed = markdown.trim_start();
    if !trimmed.starts_with(FRONT_MATTER_DELIM) {
        return Err(PlanError::MissingFrontMatter);
    }
    let rest = &trimmed[FRONT_MATTER_DELIM.len()..];
    let end = rest.find(FRONT_MATTER_DELIM).ok_or(PlanError::MissingFrontMatter)?;
    let yaml_block = &rest[..end];
    let body = &rest[end + FRONT_MATTER_DELIM.len()..];

    let front_matter: PlanFrontMatter = serde_yaml::from_str(yaml_block).map_err(PlanError::Yaml)?;

    let boundaries = extract_section(body, "## Boundaries");
    let verification_notes = extract_section(body, "## Verification").join("\n");

    Ok(PlanDocument {
        front_matter,
        boundaries,
        verification_notes,
    })
}

/// Pull the non-empty, non-heading lines under a `## <heading>` section
/// until the next `## ` heading or end of document.
fn extract_section(body: &str, heading: &str) -> Vec<String> {
    let mut lines = body.lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next() {
        if line.trim() == heading {
            for next in lines.by_ref() {
                if next.starts_with("## ") {
                    break;
                }
                let trimmed = next.trim_start_matches('-').trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> TaskGraph {
        let node = TaskNode {
            id: "t1".into(),
            description: "wire up the login form".into(),
            wave: 0,
            dependencies: vec![],
            declared_files: vec!["src/auth.rs".into()],
            risk_tier: RiskTier::Medium,
            tdd_mode: TddMode::Standard,
            skip_justification: None,
            acceptance_criteria: vec!["login returns a session token".into()],
            status: TaskStatus::Pending,
            failure_count: 0,
            pre_run_ref: None,
            deviations: vec![],
            deferred_items: vec![],
        };
        TaskGraph::new("auth", 1, vec![node])
    }

    #[test]
    fn render_then_parse_round_trips_the_task_graph() {
        let graph = sample_graph();
        let must_haves = vec![MustHave {
            truth: "session token is issued on login".into(),
            artefact: "src/auth.rs".into(),
            key_links: vec![],
        }];
        let front_matter = PlanFrontMatter::from_graph(&graph, must_haves, true);
        let doc = PlanDocument {
            front_matter,
            boundaries: vec!["no changes to the billing module".into()],
            verification_notes: "run the auth test suite before promoting".into(),
        };

        let rendered = render(&doc).unwrap();
        assert!(rendered.starts_with("---\n"));

        let parsed = parse(&rendered).unwrap();
        assert_eq!(parsed.front_matter.phase, "auth");
        assert_eq!(parsed.front_matter.tasks.len(), 1);
        assert_eq!(parsed.boundaries, vec!["no changes to the billing module".to_string()]);

        let rebuilt = parsed.front_matter.to_graph();
        assert_eq!(rebuilt.nodes[0].id, "t1");
        assert_eq!(rebuilt.nodes[0].declared_files, vec!["src/auth.rs".to_string()]);
    }

    #[test]
    fn parse_rejects_markdown_without_front_matter() {
        let err = parse("# Just a heading\n\nNo front matter here.").unwrap_err();
        assert!(matches!(err, PlanError::MissingFrontMatter));
    }

    #[test]
    fn checkpoint_before_flag_survives_round_trip() {
        let graph = sample_graph();
        let front_matter = PlanFrontMatter::from_graph(&graph, vec![], true);
        let doc = PlanDocument {
            front_matter,
            boundaries: vec![],
            verification_notes: String::new(),
        };
        let rendered = render(&doc).unwrap();
        let parsed = parse(&rendered).unwrap();
        assert!(parsed.front_matter.checkpoint_before);
    }
}
