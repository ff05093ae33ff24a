//! # Unit Components
//!
//! This module organizes the controller tests by concern: configuration and
//! validation, concrete command-sequence scenarios, arbitration policies,
//! randomized properties and whole-system simulation runs.

/// Configuration defaults, JSON loading and validation errors.
pub mod config;



/// Concrete command sequences for small request streams.
pub mod scenarios;

/// End-to-end runs of synthetic workloads through the simulator.
pub mod simulation;
