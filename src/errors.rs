//! Typed error hierarchy for the orchestration engine.
//!
//! One enum per component boundary (C1-C8), wired with `#[source]`/`#[from]`
//! so call sites can match on a specific failure while `anyhow::Context`
//! still gives a readable chain at the CLI surface.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the Workspace Store (C1): atomic writes, the numbered
/// skeleton, and the mission log.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workspace root {path} is absent; run `forge init` first")]
    WorkspaceAbsent { path: PathBuf },

    #[error("failed to atomically write {path}: {source}")]
    AtomicWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed governance file {path}: {source}")]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the Context Packet Builder (C2).
#[derive(Debug, Error)]
pub enum PacketError {
    #[error(
        "missing index files for task {task_id}; codebase indexer has not run on an existing project"
    )]
    MissingIndex { task_id: String },

    #[error("task {task_id} declares {count} files, exceeding the 6-path cap")]
    TooManyDeclaredFiles { task_id: String, count: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the Worker Dispatcher (C3): subprocess spawn and the
/// tagged-message protocol.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn worker subprocess: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("worker stdin closed before prompt could be written")]
    StdinClosed,

    #[error("unbalanced tag {tag} at end of stream")]
    UnbalancedTag { tag: String },

    #[error("malformed JSON body in <<{tag}>>: {source}")]
    MalformedBody {
        tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("worker exceeded its wall-clock budget of {budget_secs}s")]
    Timeout { budget_secs: u64 },

    #[error("worker exited without a terminal tag (exit status: {status})")]
    Crash { status: String },

    #[error("unescaped \">>\" inside <<{tag}>> body; workers must escape it before sending")]
    UnescapedClosingSequence { tag: String },
}

/// Errors from the Wave Scheduler (C4).
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("wave {wave} violates file-disjointness: {task_a} and {task_b} both declare {file}")]
    WaveFileCollision {
        wave: u32,
        task_a: String,
        task_b: String,
        file: String,
    },

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("dependency cycle detected involving task {task}")]
    CycleDetected { task: String },

    #[error(
        "task {task} (wave {task_wave}) depends on {dependency} (wave {dependency_wave}); \
         dependencies must land in a strictly earlier wave"
    )]
    DependencyWaveViolation {
        task: String,
        task_wave: u32,
        dependency: String,
        dependency_wave: u32,
    },

    #[error("task {task} reached the three-consecutive-failures limit")]
    ThreeConsecutiveFailures { task: String },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Errors from the Verification Ladder (C5).
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("rung '{rung}' command failed to execute: {source}")]
    CommandFailed {
        rung: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fail-fast rung '{rung}' reported a violation; ladder halted")]
    FailFastHalt { rung: String },
}

/// Errors from the Checkpoint Manager (C6).
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("git operation failed: {0}")]
    Git(#[source] git2::Error),

    #[error("checkpoint {id} not found")]
    NotFound { id: String },

    #[error("refusing to evict checkpoint {id}: referenced by an open scar")]
    ReferencedByOpenScar { id: String },

    #[error("refusing to evict checkpoint {id}: created less than 24h ago")]
    TooRecent { id: String },
}

impl From<git2::Error> for CheckpointError {
    fn from(e: git2::Error) -> Self {
        CheckpointError::Git(e)
    }
}

/// Errors from the plan document parser.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan file has no YAML front matter (expected a leading '---' block)")]
    MissingFrontMatter,

    #[error("malformed plan front matter: {0}")]
    Yaml(#[source] serde_yaml::Error),
}

/// Errors from the Loop Controller (C8).
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("plan is invalid for execute transition: {reason}")]
    InvalidPlan { reason: String },

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_workspace_absent_carries_path() {
        let err = StoreError::WorkspaceAbsent {
            path: PathBuf::from(".nexus"),
        };
        assert!(err.to_string().contains(".nexus"));
    }

    #[test]
    fn dispatch_error_unbalanced_tag_is_matchable() {
        let err = DispatchError::UnbalancedTag {
            tag: "STATUS".to_string(),
        };
        match &err {
            DispatchError::UnbalancedTag { tag } => assert_eq!(tag, "STATUS"),
            _ => panic!("expected UnbalancedTag"),
        }
    }

    #[test]
    fn scheduler_error_converts_from_dispatch_error() {
        let inner = DispatchError::StdinClosed;
        let sched_err: SchedulerError = inner.into();
        assert!(matches!(sched_err, SchedulerError::Dispatch(_)));
    }

    #[test]
    fn scheduler_error_wave_collision_message() {
        let err = SchedulerError::WaveFileCollision {
            wave: 1,
            task_a: "t1".into(),
            task_b: "t2".into(),
            file: "src/a.rs".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("t1") && msg.contains("t2") && msg.contains("src/a.rs"));
    }

    #[test]
    fn loop_error_converts_from_scheduler_error() {
        let inner = SchedulerError::CycleDetected {
            task: "t1".to_string(),
        };
        let loop_err: LoopError = inner.into();
        assert!(matches!(loop_err, LoopError::Scheduler(_)));
    }

    #[test]
    fn checkpoint_error_not_found_is_matchable() {
        let err = CheckpointError::NotFound {
            id: "cp-1".to_string(),
        };
        assert!(matches!(err, CheckpointError::NotFound { .. }));
        assert!(err.to_string().contains("cp-1"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::Other(anyhow::anyhow!("x")));
        assert_std_error(&DispatchError::StdinClosed);
        assert_std_error(&SchedulerError::ThreeConsecutiveFailures {
            task: "t".into(),
        });
        assert_std_error(&VerificationError::FailFastHalt {
            rung: "physicality".into(),
        });
    }
}
