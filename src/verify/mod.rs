//! Verification Ladder (C5): eight sequential rungs run against modified
//! files and the task graph, producing a single `VerificationReport`.

pub mod ladder;
pub mod rungs;

pub use ladder::{run, BrowserRequirement, LadderInputs, Truth};
