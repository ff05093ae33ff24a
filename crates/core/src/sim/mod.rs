//! Simulation harness around the controller core.
//!
//! Provides the caller-side request queues, a behavioural SDRAM device that
//! checks the command stream, a synthetic workload and the simulator loop tying
//! them together.

/// Behavioural SDRAM device model.
pub mod dram;
/// Bounded per-bank request queues.
pub mod queue;
/// Controller + queues + device simulation loop.
pub mod simulator;
/// Synthetic traffic generator.
pub mod workload;

pub use dram::{DramModel, TimingViolation};
pub use queue::BankQueues;
pub use simulator::{CompletionRecord, Simulator};
pub use workload::{Pattern, Workload};
