//! Worker Dispatcher (C3) and External-Agent Adapters (C9).

pub mod adapters;
pub mod dispatcher;
pub mod protocol;

pub use adapters::{resolve as resolve_adapter, RuntimeAdapter};
pub use dispatcher::{DenyAll, PermissionDecision, PermissionResolver, WorkerDispatcher, WorkerOutcome};
pub use protocol::{BlockedBody, BlockedKind, CompleteBody, PermissionRequestBody, StreamingTagParser, WorkerMessage};
