//! Wave Scheduler (C4): validates a task graph's wave assignment and drives
//! dispatch wave by wave, respecting dependency completion, per-wave file
//! disjointness, and the three-consecutive-failures rule.

mod scheduler;

pub use scheduler::WaveScheduler;
