//! Periodic driver for verification cycles.
//!
//! Runs one cycle on startup (optionally), then one per interval, plus any
//! cycles requested through a [`TriggerHandle`]. Cycles never overlap.

pub mod runner;

pub use runner::{
    CycleRunner, Scheduler, SchedulerHandle, SchedulerPhase, TriggerHandle, TriggerOutcome,
};
