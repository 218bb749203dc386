//! External-Agent Adapters (C9): one adapter per worker runtime, supplying
//! the invocation command, a pre-dispatch config file if the runtime wants
//! one, and a runtime-specific prompt fragment. Grounded in the teacher's
//! `factory/claude.rs`/`factory/codex.rs` pair of per-runtime launchers,
//! generalized behind a single trait instead of a hardcoded match.

use forge_common::packet::ContextPacket;
use std::path::Path;

/// A runtime the Worker Dispatcher can launch a task against.
pub trait RuntimeAdapter: Send + Sync {
    /// Name used in mission log entries and CLI `--runtime` selection.
    fn name(&self) -> &'static str;

    /// Program and arguments to spawn. The packet is not embedded in argv;
    /// it is written to stdin as the rendered prompt by the dispatcher.
    fn command(&self) -> (String, Vec<String>);

    /// Render the full prompt text sent over stdin, including any
    /// runtime-specific framing the worker needs to honour the tagged
    /// message protocol.
    fn render_prompt(&self, packet: &ContextPacket) -> String {
        let mut out = String::new();
        out.push_str("You are a worker executing exactly one declared task.\n\n");
        out.push_str(&format!("Task: {}\n", packet.task_id));
        if !packet.mission_context.is_empty() {
            out.push_str("Mission:\n");
            out.push_str(&packet.mission_context);
            out.push('\n');
        }
        out.push_str("Objective:\n");
        out.push_str(&packet.phase_objective);
        out.push_str("\n\nAcceptance criteria:\n");
        out.push_str(&packet.acceptance_criteria);
        out.push_str("\n\nDeclared files:\n");
        for f in &packet.files {
            out.push_str(&format!("- {f}\n"));
        }
        if !packet.boundaries.is_empty() {
            out.push_str("\nBoundaries (do not touch):\n");
            for b in &packet.boundaries {
                out.push_str(&format!("- {b}\n"));
            }
        }
        if self.browser_automation_enabled() {
            out.push_str("\n");
            out.push_str(&self.browser_prompt_fragment());
        }
        out.push_str(
            "\nReport progress with <<STATUS>>, finish with <<COMPLETE>>, \
             stop with <<BLOCKED>> if you cannot proceed, and request \
             permission with <<PERMISSION_REQUEST>> before touching a file \
             outside your declared list. Each tag pairs with a matching \
             closing tag and a JSON body.\n",
        );
        out
    }

    /// Optional pre-dispatch config file this runtime expects on disk
    /// (e.g. a tool-permissions manifest) before it is launched. Returns
    /// `None` when the runtime needs no such file.
    fn pre_dispatch_config(&self, _workspace_root: &Path) -> Option<(String, String)> {
        None
    }

    /// Whether this adapter should append the browser-automation prompt
    /// fragment (only meaningful when settings.browser.enabled is true;
    /// the caller gates on that before rendering).
    fn browser_automation_enabled(&self) -> bool {
        false
    }

    fn browser_prompt_fragment(&self) -> String {
        String::new()
    }
}

/// Claude Code CLI adapter, grounded in `factory/claude.rs`.
pub struct ClaudeCodeAdapter {
    pub browser_enabled: bool,
}

impl RuntimeAdapter for ClaudeCodeAdapter {
    fn name(&self) -> &'static str {
        "claude-code"
    }

    fn command(&self) -> (String, Vec<String>) {
        (
            "claude".to_string(),
            vec!["--print".to_string(), "--output-format".to_string(), "text".to_string()],
        )
    }

    fn browser_automation_enabled(&self) -> bool {
        self.browser_enabled
    }

    fn browser_prompt_fragment(&self) -> String {
        "A browser automation MCP server is available; use it to drive the \
         running application for any UI-facing verification steps."
            .to_string()
    }
}

/// Codex CLI adapter, grounded in `factory/codex.rs`.
pub struct CodexAdapter;

impl RuntimeAdapter for CodexAdapter {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn command(&self) -> (String, Vec<String>) {
        ("codex".to_string(), vec!["exec".to_string()])
    }

    fn pre_dispatch_config(&self, workspace_root: &Path) -> Option<(String, String)> {
        let path = workspace_root.join(".codex-sandbox.json");
        Some((
            path.to_string_lossy().to_string(),
            "{\"sandbox_mode\":\"workspace-write\"}".to_string(),
        ))
    }
}

/// Resolve an adapter by the name used in `settings.json` / CLI flags.
pub fn resolve(name: &str, browser_enabled: bool) -> Option<Box<dyn RuntimeAdapter>> {
    match name {
        "claude-code" => Some(Box::new(ClaudeCodeAdapter { browser_enabled })),
        "codex" => Some(Box::new(CodexAdapter)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::packet::ContextPacket;
    use forge_common::task::{RiskTier, TddMode};
    use std::collections::BTreeMap;

    fn packet() -> ContextPacket {
        ContextPacket {
            task_id: "t1".into(),
            tdd_mode: TddMode::Standard,
            risk_tier: RiskTier::Low,
            mission_context: "build auth".into(),
            phase_objective: "add login".into(),
            files: vec!["src/auth.rs".into()],
            files_content: BTreeMap::new(),
            acceptance_criteria: "login works".into(),
            architecture_slice: String::new(),
            contracts_slice: String::new(),
            dependency_symbols: String::new(),
            tests_slice: String::new(),
            wave_context: String::new(),
            scars_digest: String::new(),
            state_digest: String::new(),
            boundaries: vec!["src/payments/".into()],
            tooling: Default::default(),
        }
    }

    #[test]
    fn claude_adapter_without_browser_omits_fragment() {
        let adapter = ClaudeCodeAdapter { browser_enabled: false };
        let prompt = adapter.render_prompt(&packet());
        assert!(!prompt.contains("browser automation"));
    }

    #[test]
    fn claude_adapter_with_browser_includes_fragment() {
        let adapter = ClaudeCodeAdapter { browser_enabled: true };
        let prompt = adapter.render_prompt(&packet());
        assert!(prompt.contains("browser automation"));
    }

    #[test]
    fn codex_adapter_supplies_sandbox_config() {
        let adapter = CodexAdapter;
        let (path, contents) = adapter.pre_dispatch_config(Path::new("/tmp/proj")).unwrap();
        assert!(path.ends_with(".codex-sandbox.json"));
        assert!(contents.contains("workspace-write"));
    }

    #[test]
    fn resolve_unknown_runtime_returns_none() {
        assert!(resolve("unknown-thing", false).is_none());
    }

    #[test]
    fn rendered_prompt_lists_boundaries_and_files() {
        let adapter = CodexAdapter;
        let prompt = adapter.render_prompt(&packet());
        assert!(prompt.contains("src/auth.rs"));
        assert!(prompt.contains("src/payments/"));
    }
}
