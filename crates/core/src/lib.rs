//! Cycle-accurate SDRAM controller scheduling core.
//!
//! This crate turns bank-addressed read/write requests into a legal, timing-compliant
//! DRAM command stream. It provides:
//! 1. **Timing:** A validated timing model derived from the configuration (burst length, alignment, tRP/tRCD/tRAS/...).
//! 2. **Controller:** One bank machine per bank, a periodic refresher and the single-issue command multiplexer.
//! 3. **Data path:** DFI frames per cycle and fixed-latency read/write completions.
//! 4. **Simulation:** Request queues, a behavioural device model that checks timing, and a workload generator.
//! 5. **Statistics:** Bandwidth counters and a sectioned simulation report.
//!
//! ```
//! use dramctl_core::{Config, Simulator};
//! use dramctl_core::common::{Payload, Request, RequestTag};
//!
//! let mut config = Config::default();
//! config.controller.with_refresh = false;
//! let mut sim = Simulator::new(&config).unwrap();
//! sim.submit(Request::write(0, 5, 0, Payload::splat(7, 2), RequestTag(0))).unwrap();
//! sim.submit(Request::read(0, 5, 0, RequestTag(1))).unwrap();
//! assert!(sim.run_until_idle(1_000).is_some());
//! assert!(sim.violations().is_empty());
//! ```

/// Common types (requests, commands, DFI frames, errors).
pub mod common;
/// Controller configuration (defaults, enums, hierarchical settings).
pub mod config;
/// Scheduling core: bank machines, refresher, multiplexer, data path.
pub mod controller;
/// Request queues, device model, workload and simulation loop.
pub mod sim;
/// Bandwidth counters and simulation statistics.
pub mod stats;
/// Validated timing model and address slicing.
pub mod timing;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The scheduling core; construct with `Controller::new`.
pub use crate::controller::Controller;
/// Controller plus queues and device model; construct with `Simulator::new`.
pub use crate::sim::Simulator;
/// Validated timing constants; construct with `TimingModel::new`.
pub use crate::timing::TimingModel;
