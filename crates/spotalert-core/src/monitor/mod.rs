//! Monitoring loop for SpotAlert
//!
//! Drives the price source, the threshold evaluator and the alert sink on a
//! fixed cadence and writes one status line per event.

mod poll_loop;
pub mod status;

pub use poll_loop::{CycleOutcome, LoopState, PollLoop, RunSummary};
