//! Context Packet Builder (C2): assembles a fixed-shape 14-slot bundle for
//! a single task from index files and prior-wave results.

pub mod builder;
pub mod index_types;

pub use builder::{BuilderInputs, ContextPacketBuilder};
