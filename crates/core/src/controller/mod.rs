//! DRAM controller scheduling core.
//!
//! The [`Controller`] owns one [`Refresher`], one [`BankMachine`] per bank and one
//! [`Multiplexer`]. Every call to [`Controller::tick`] evaluates one clock cycle:
//! 1. **Accept:** idle bank machines pull their next request from the [`RequestQueue`].
//! 2. **Intents:** every engine states the single command it could issue now.
//! 3. **Grant:** the multiplexer selects at most one intent for the command bus.
//! 4. **Update:** all engines observe the granted command and count down their timers.
//!
//! Intents are computed from registered state only, so the order in which banks
//! are evaluated within a cycle never matters.

use std::collections::VecDeque;

use crate::common::command::{Completion, DfiFrame, PhysicalCommand};
use crate::common::error::ConfigError;
use crate::common::request::{Payload, Request};
use crate::config::Config;
use crate::stats::BandwidthCounters;
use crate::timing::TimingModel;

/// Per-bank command sequencer.
pub mod bank_machine;
/// Cycle countdown shared by every timing constraint.
pub mod countdown;
/// Fixed-latency read/write data attribution.
pub mod datapath;
/// Command bus arbiter.
pub mod multiplexer;
/// Periodic refresh generator.
pub mod refresher;

pub use bank_machine::{BankMachine, BankPhase, BankState, BankView};
pub use multiplexer::{Direction, Multiplexer};
pub use refresher::{RefreshState, Refresher};

/// Source of pending requests, one FIFO per bank.
///
/// Owned by the caller; bank machines take from it only when they are idle.
pub trait RequestQueue {
    /// Removes and returns the oldest pending request for `bank`.
    fn pop_request(&mut self, bank: usize) -> Option<Request>;
}

impl RequestQueue for Vec<VecDeque<Request>> {
    fn pop_request(&mut self, bank: usize) -> Option<Request> {
        self.get_mut(bank).and_then(VecDeque::pop_front)
    }
}

/// Everything the controller drives in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutput {
    /// Cycle this output belongs to.
    pub cycle: u64,
    /// DFI frame, carrying the granted command if any.
    pub frame: DfiFrame,
    /// Data-path completions raised this cycle.
    pub completions: Vec<Completion>,
}

impl CycleOutput {
    /// The command granted this cycle.
    pub const fn command(&self) -> Option<&PhysicalCommand> {
        self.frame.command.as_ref()
    }
}

/// Scheduling core of a synchronous DRAM controller.
#[derive(Debug, Clone)]
pub struct Controller {
    timing: TimingModel,
    refresher: Refresher,
    banks: Vec<BankMachine>,
    multiplexer: Multiplexer,
    cycle: u64,
}

impl Controller {
    /// Validates `config` and builds the controller in its reset state.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] raised while deriving the [`TimingModel`].
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::from_timing(TimingModel::new(config)?))
    }

    /// Builds the controller from an already validated timing model.
    pub fn from_timing(timing: TimingModel) -> Self {
        let banks = (0..timing.nbanks())
            .map(|index| BankMachine::new(index, &timing))
            .collect();
        Self {
            refresher: Refresher::new(&timing),
            multiplexer: Multiplexer::new(&timing),
            banks,
            timing,
            cycle: 0,
        }
    }

    /// Evaluates one clock cycle.
    ///
    /// `rddata` is the read data the PHY presents this cycle, if any.
    pub fn tick<Q: RequestQueue + ?Sized>(
        &mut self,
        queue: &mut Q,
        rddata: Option<Payload>,
    ) -> CycleOutput {
        let cycle = self.cycle;

        for bank in &mut self.banks {
            bank.accept(queue);
        }
        let intents: Vec<_> = self.banks.iter().map(BankMachine::intent).collect();
        let views: Vec<_> = self.banks.iter().map(BankMachine::view).collect();

        let command = self
            .multiplexer
            .arbitrate(&self.refresher, &intents, &views)
            .map(|intent| self.multiplexer.issue(&intent, &views, cycle));

        let mut serviced = None;
        for bank in &mut self.banks {
            if let Some(request) = bank.step(command.as_ref()) {
                serviced = Some(request);
            }
        }
        self.refresher.step(command.map(|c| c.kind), cycle);
        let (frame, completions) = self.multiplexer.commit(
            command.as_ref(),
            serviced,
            &intents,
            &views,
            rddata,
            cycle,
        );

        self.cycle += 1;
        CycleOutput {
            cycle,
            frame,
            completions,
        }
    }

    /// Next cycle to be evaluated.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Derived timing constants.
    pub const fn timing(&self) -> &TimingModel {
        &self.timing
    }

    /// The refresh engine.
    pub const fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// Refresh engine state.
    pub const fn refresh_state(&self) -> RefreshState {
        self.refresher.state()
    }

    /// The bank machines, indexed by bank.
    pub fn banks(&self) -> &[BankMachine] {
        &self.banks
    }

    /// Row-buffer state of `bank`, or `None` if out of range.
    pub fn bank_state(&self, bank: usize) -> Option<BankState> {
        self.banks.get(bank).map(BankMachine::state)
    }

    /// The command bus arbiter.
    pub const fn multiplexer(&self) -> &Multiplexer {
        &self.multiplexer
    }

    /// Bandwidth counters, when enabled.
    pub const fn bandwidth(&self) -> Option<&BandwidthCounters> {
        self.multiplexer.bandwidth()
    }

    /// Whether no request is in flight in any bank or in the data path.
    pub fn is_idle(&self) -> bool {
        self.banks.iter().all(BankMachine::is_idle) && !self.multiplexer.datapath_busy()
    }
}
