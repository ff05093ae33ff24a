//! Simulator: owns the controller, its request queues and the device model side by side.
//!
//! Each [`Simulator::tick`] presents the device's read data to the controller,
//! evaluates one controller cycle and lets the device sample the resulting DFI
//! frame. Issued commands and completions are recorded for inspection.

use std::collections::HashMap;

use tracing::warn;

use crate::common::command::{Completion, PhysicalCommand};
use crate::common::error::{ConfigError, SubmitError};
use crate::common::request::{Opcode, Request, RequestTag};
use crate::config::Config;
use crate::controller::{Controller, CycleOutput};
use crate::sim::dram::{DramModel, TimingViolation};
use crate::sim::queue::BankQueues;
use crate::stats::SimStats;

/// A completion together with the cycle it was raised on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    /// Cycle the completion was raised.
    pub cycle: u64,
    /// The completion.
    pub completion: Completion,
}

/// Top-level simulator: controller, queues and device model.
#[derive(Debug, Clone)]
pub struct Simulator {
    controller: Controller,
    queues: BankQueues,
    dram: DramModel,
    trace: Vec<PhysicalCommand>,
    completions: Vec<CompletionRecord>,
    submitted: HashMap<RequestTag, (u64, Opcode)>,
    stats: SimStats,
}

impl Simulator {
    /// Creates a simulator for `config`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] raised while validating `config`.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let controller = Controller::new(config)?;
        let timing = controller.timing();
        let queues = BankQueues::new(timing.nbanks(), timing.req_queue_size());
        let dram = DramModel::new(timing);
        Ok(Self {
            controller,
            queues,
            dram,
            trace: Vec::new(),
            completions: Vec::new(),
            submitted: HashMap::new(),
            stats: SimStats::default(),
        })
    }

    /// Queues `request` for its bank.
    ///
    /// # Errors
    ///
    /// Hands the request back, wrapped in a [`SubmitError`], if its bank, row or
    /// column lies outside the geometry, if its tag belongs to a request that
    /// has not completed yet, or if its bank queue is full.
    pub fn submit(&mut self, request: Request) -> Result<(), SubmitError> {
        let cycle = self.controller.cycle();
        let timing = self.controller.timing();
        let in_range = request.bank < timing.nbanks()
            && timing.slicer().contains(request.row, request.column);
        if !in_range {
            warn!(cycle, %request, "request outside bank geometry");
            return Err(SubmitError::OutOfRange(request));
        }
        if self.submitted.contains_key(&request.tag) {
            warn!(cycle, %request, "tag already in flight");
            return Err(SubmitError::DuplicateTag(request));
        }
        let tag = request.tag;
        let opcode = request.opcode;
        match self.queues.push(request) {
            Ok(()) => {
                let _ = self.submitted.insert(tag, (cycle, opcode));
                Ok(())
            }
            Err(request) => {
                self.stats.queue_rejections += 1;
                warn!(cycle, %request, "bank queue full");
                Err(SubmitError::QueueFull(request))
            }
        }
    }

    /// Whether `bank` can take another request.
    pub fn has_room(&self, bank: usize) -> bool {
        self.queues.has_room(bank)
    }

    /// Advances one clock cycle.
    pub fn tick(&mut self) -> CycleOutput {
        let cycle = self.controller.cycle();
        let rddata = self.dram.rddata(cycle);
        let output = self.controller.tick(&mut self.queues, rddata);
        let violations_before = self.dram.violations().len();
        self.dram.observe(&output.frame, cycle);
        self.stats.timing_violations += (self.dram.violations().len() - violations_before) as u64;

        if let Some(command) = output.command() {
            self.stats.record_command(command.kind);
            self.trace.push(*command);
        }
        for completion in &output.completions {
            if let Some((submitted, opcode)) = self.submitted.remove(&completion.tag()) {
                match opcode {
                    Opcode::Read => {
                        self.stats.reads_completed += 1;
                        self.stats.read_latency_total += cycle - submitted;
                    }
                    Opcode::Write => self.stats.writes_completed += 1,
                }
            }
            self.completions.push(CompletionRecord {
                cycle,
                completion: completion.clone(),
            });
        }

        self.stats.cycles = cycle + 1;
        let banks = self.controller.banks();
        self.stats.row_hits = banks.iter().map(|b| b.row_hits()).sum();
        self.stats.row_misses = banks.iter().map(|b| b.row_misses()).sum();
        self.stats.row_empty = banks.iter().map(|b| b.row_empty()).sum();
        output
    }

    /// Runs exactly `cycles` cycles.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            let _ = self.tick();
        }
    }

    /// Ticks until every queued request has completed, or `max_cycles` elapse.
    ///
    /// Returns the number of cycles run, or `None` if the limit was hit first.
    pub fn run_until_idle(&mut self, max_cycles: u64) -> Option<u64> {
        for n in 0..max_cycles {
            if self.is_idle() {
                return Some(n);
            }
            let _ = self.tick();
        }
        self.is_idle().then_some(max_cycles)
    }

    /// Whether no request is queued, sequencing or waiting for data.
    pub fn is_idle(&self) -> bool {
        self.queues.is_empty() && self.controller.is_idle()
    }

    /// The controller under simulation.
    pub const fn controller(&self) -> &Controller {
        &self.controller
    }

    /// The device model.
    pub const fn dram(&self) -> &DramModel {
        &self.dram
    }

    /// Every command issued so far, in order.
    pub fn trace(&self) -> &[PhysicalCommand] {
        &self.trace
    }

    /// Every completion raised so far, in order.
    pub fn completions(&self) -> &[CompletionRecord] {
        &self.completions
    }

    /// Timing violations reported by the device model.
    pub fn violations(&self) -> &[TimingViolation] {
        self.dram.violations()
    }

    /// Accumulated statistics.
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }
}
