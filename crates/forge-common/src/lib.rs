//! Shared domain types for the forge orchestration engine.
//!
//! These types are the on-disk and in-memory shape of everything the
//! Workspace Store persists: task graphs, context packets, checkpoints,
//! scars, project state, verification reports and mailbox messages. They
//! carry no behaviour beyond small invariant-checking constructors; the
//! components that mutate them live in the `forge` binary crate.

pub mod checkpoint;
pub mod mailbox;
pub mod packet;
pub mod project_state;
pub mod scar;
pub mod task;
pub mod verification;

pub use checkpoint::Checkpoint;
pub use mailbox::{MailboxMessage, MailboxMessageType};
pub use packet::ContextPacket;
pub use project_state::{LoopMark, LoopPosition, ProjectState};
pub use scar::{Scar, ScarCategory};
pub use task::{RiskTier, TaskGraph, TaskNode, TaskStatus, TddMode};
pub use verification::{RungOutcome, VerificationGap, VerificationReport};
