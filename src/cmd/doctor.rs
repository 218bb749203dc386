//! `forge doctor`: read-only environment audit. Never mutates the
//! workspace; reports what would stop `plan`/`execute`/`verify` from
//! running so a human can fix it before the loop starts.

use crate::cmd::{open_store_with_settings, workspace_path};
use crate::dispatch::resolve_adapter;
use anyhow::Result;
use std::path::Path;

pub struct DoctorFinding {
    pub ok: bool,
    pub label: String,
    pub detail: String,
}

pub fn cmd_doctor(
    project_root: &Path,
    workspace: Option<&Path>,
    settings: Option<&Path>,
) -> Result<Vec<DoctorFinding>> {
    let mut findings = Vec::new();

    findings.push(check_git(project_root));
    findings.push(check_workspace(project_root, workspace));

    let store = open_store_with_settings(project_root, workspace, settings);
    let settings = store.read_settings().unwrap_or_default();

    findings.push(check_binary_on_path("claude"));
    findings.push(check_binary_on_path("codex"));

    for (label, cmd) in [
        ("test", &settings.commands.test),
        ("lint", &settings.commands.lint),
        ("typecheck", &settings.commands.typecheck),
        ("format_check", &settings.commands.format_check),
        ("build", &settings.commands.build),
    ] {
        findings.push(check_command_configured(label, cmd.as_deref()));
    }

    if settings.browser.enabled {
        findings.push(check_browser_mcp(settings.browser.mcp_path.as_deref()));
    }

    findings.push(check_adapter_resolves("claude-code"));
    findings.push(check_adapter_resolves("codex"));

    for f in &findings {
        let marker = if f.ok { "ok" } else { "MISSING" };
        println!("[{marker}] {}: {}", f.label, f.detail);
    }

    Ok(findings)
}

fn check_git(project_root: &Path) -> DoctorFinding {
    match git2::Repository::open(project_root) {
        Ok(_) => DoctorFinding {
            ok: true,
            label: "version-control".into(),
            detail: "git repository found".into(),
        },
        Err(e) => DoctorFinding {
            ok: false,
            label: "version-control".into(),
            detail: format!("no git repository at {}: {e}", project_root.display()),
        },
    }
}

fn check_workspace(project_root: &Path, workspace: Option<&Path>) -> DoctorFinding {
    let path = workspace_path(project_root, workspace);
    if path.is_dir() {
        DoctorFinding {
            ok: true,
            label: "workspace".into(),
            detail: format!("{} exists", path.display()),
        }
    } else {
        DoctorFinding {
            ok: false,
            label: "workspace".into(),
            detail: format!("{} absent; run `forge init`", path.display()),
        }
    }
}

fn check_binary_on_path(name: &str) -> DoctorFinding {
    let found = std::env::var_os("PATH")
        .map(|path| {
            std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
        })
        .unwrap_or(false);
    DoctorFinding {
        ok: found,
        label: format!("runtime:{name}"),
        detail: if found {
            format!("{name} found on PATH")
        } else {
            format!("{name} not found on PATH")
        },
    }
}

fn check_command_configured(label: &str, cmd: Option<&str>) -> DoctorFinding {
    match cmd {
        Some(c) => DoctorFinding {
            ok: true,
            label: format!("command:{label}"),
            detail: c.to_string(),
        },
        None => DoctorFinding {
            ok: false,
            label: format!("command:{label}"),
            detail: "not configured; the corresponding verification rung will be skipped".into(),
        },
    }
}

fn check_browser_mcp(mcp_path: Option<&str>) -> DoctorFinding {
    match mcp_path {
        Some(p) if Path::new(p).exists() => DoctorFinding {
            ok: true,
            label: "browser-mcp".into(),
            detail: p.to_string(),
        },
        Some(p) => DoctorFinding {
            ok: false,
            label: "browser-mcp".into(),
            detail: format!("{p} configured but not found on disk"),
        },
        None => DoctorFinding {
            ok: false,
            label: "browser-mcp".into(),
            detail: "browser.enabled is true but no mcpPath configured".into(),
        },
    }
}

fn check_adapter_resolves(name: &str) -> DoctorFinding {
    let ok = resolve_adapter(name, false).is_some();
    DoctorFinding {
        ok,
        label: format!("adapter:{name}"),
        detail: if ok {
            "known runtime adapter".into()
        } else {
            "no adapter registered for this runtime name".into()
        },
    }
}
