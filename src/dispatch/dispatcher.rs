//! Worker Dispatcher (C3): spawns a worker subprocess, streams stdout,
//! parses tagged messages, enforces timeouts.
//!
//! Grounded in `orchestrator/runner.rs`'s `ClaudeRunner::run_iteration`
//! (subprocess spawn / stdin-write / stdout-stream pattern) and the
//! `tokio::select!` event loop from `swarm/executor.rs`'s
//! `SwarmExecutor::execute`, with the HTTP callback-server arm removed —
//! §1's non-goal rules out any network protocol for worker coordination,
//! so suspension/resume for permission requests happens purely over the
//! subprocess's stdin/stdout pipes.

use crate::dispatch::protocol::{
    BlockedBody, CompleteBody, PermissionRequestBody, StreamingTagParser, WorkerMessage,
};
use crate::errors::DispatchError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{self, Instant};

/// Terminal result of a dispatch.
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Complete(CompleteBody),
    Blocked(BlockedBody),
    /// Returned only when no `PermissionResolver` was supplied; the
    /// default dispatch path resolves permission requests internally and
    /// never surfaces this to the caller (see DESIGN.md).
    PermissionRequest(PermissionRequestBody),
    Timeout,
    Crash { status: String },
}

#[derive(Debug, Clone)]
pub enum PermissionDecision {
    Grant { content: String },
    Deny { reason: String },
}

/// Consulted synchronously whenever a `PERMISSION_REQUEST` tag arrives.
/// The Wave Scheduler implements this by checking the request path
/// against boundaries and the architecture slice (§4.4).
pub trait PermissionResolver {
    fn resolve(&mut self, request: &PermissionRequestBody) -> PermissionDecision;
}

/// A resolver that denies every request; used when permission requests
/// are not expected (e.g. validator dispatches).
pub struct DenyAll;
impl PermissionResolver for DenyAll {
    fn resolve(&mut self, request: &PermissionRequestBody) -> PermissionDecision {
        PermissionDecision::Deny {
            reason: format!("no resolver configured for request on {}", request.path),
        }
    }
}

pub struct WorkerDispatcher {
    pub budget: Duration,
    pub grace_period: Duration,
}

impl WorkerDispatcher {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            grace_period: Duration::from_secs(5),
        }
    }

    /// Spawn `command` with `args`, write `prompt` to stdin, then drive the
    /// stdout stream through the streaming parser until a terminal tag,
    /// timeout, or process exit.
    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        prompt: &str,
        resolver: &mut dyn PermissionResolver,
    ) -> Result<WorkerOutcome, DispatchError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(DispatchError::SpawnFailed)?;

        {
            let stdin = child.stdin.as_mut().ok_or(DispatchError::StdinClosed)?;
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(DispatchError::SpawnFailed)?;
        }

        let stdout = child.stdout.take().expect("piped stdout");
        let mut lines = BufReader::new(stdout).lines();
        let mut parser = StreamingTagParser::new();
        let deadline = Instant::now() + self.budget;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line.map_err(DispatchError::SpawnFailed)? {
                        Some(line) => {
                            if let Some(msg) = parser.feed_line(&line)? {
                                match msg {
                                    WorkerMessage::Status(_) => continue,
                                    WorkerMessage::Complete(c) => {
                                        wait_for_exit(&mut child).await;
                                        return Ok(WorkerOutcome::Complete(c));
                                    }
                                    WorkerMessage::Blocked(b) => {
                                        wait_for_exit(&mut child).await;
                                        return Ok(WorkerOutcome::Blocked(b));
                                    }
                                    WorkerMessage::PermissionRequest(req) => {
                                        let decision = resolver.resolve(&req);
                                        self.write_decision(&mut child, &decision).await?;
                                    }
                                }
                            }
                        }
                        None => {
                            // stdout closed; stream ended without a terminal tag.
                            parser.finish()?;
                            let status = wait_for_exit(&mut child).await;
                            return Ok(WorkerOutcome::Crash { status });
                        }
                    }
                }
                _ = time::sleep_until(deadline) => {
                    let _ = child.start_kill();
                    let _ = time::timeout(self.grace_period, child.wait()).await;
                    let _ = child.kill().await;
                    return Ok(WorkerOutcome::Timeout);
                }
            }
        }
    }

    async fn write_decision(
        &self,
        child: &mut Child,
        decision: &PermissionDecision,
    ) -> Result<(), DispatchError> {
        let payload = match decision {
            PermissionDecision::Grant { content } => {
                serde_json::json!({"granted": true, "content": content})
            }
            PermissionDecision::Deny { reason } => {
                serde_json::json!({"granted": false, "reason": reason})
            }
        };
        let stdin = child.stdin.as_mut().ok_or(DispatchError::StdinClosed)?;
        let line = format!("{payload}\n");
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(DispatchError::SpawnFailed)
    }
}

async fn wait_for_exit(child: &mut Child) -> String {
    match child.wait().await {
        Ok(status) => status.to_string(),
        Err(e) => format!("wait failed: {e}"),
    }
}
