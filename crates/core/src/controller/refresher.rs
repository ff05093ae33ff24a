//! Periodic refresh generator.
//!
//! The refresher owns the refresh countdown and the refresh sequence. When the
//! countdown expires it takes the command bus away from the bank machines and runs:
//!
//! `PRECHARGE ALL --(tRP)--> REFRESH --(tRFC)--> idle`
//!
//! The countdown is reseeded on every refresh command with
//! `tREFI - refresh_lead`, where the lead covers the longest wait for the
//! precharge-all grant plus tRP. Two consecutive refresh commands are therefore
//! never more than tREFI cycles apart.

use tracing::debug;

use crate::common::command::{CommandIntent, CommandKind, IntentSource};
use crate::controller::countdown::Countdown;
use crate::timing::TimingModel;

/// Externally visible refresher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Counting down to the next refresh; the bus belongs to the bank machines.
    Idle,
    /// A refresh sequence has started and is waiting for, or issuing, its commands.
    Requesting,
    /// The refresh command was issued; the bus is blocked for tRFC.
    Recovering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    PrechargeAll,
    Precharging,
    Refresh,
    Recovering,
}

/// Periodic refresh engine with unconditional bus priority.
#[derive(Debug, Clone)]
pub struct Refresher {
    enabled: bool,
    phase: Phase,
    due: Countdown,
    sequence: Countdown,
    period: u32,
    t_rp: u32,
    t_rfc: u32,
    refreshes: u64,
    last_refresh: Option<u64>,
}

impl Refresher {
    /// Creates a refresher for the given timing model.
    ///
    /// The first refresh request is raised `refresh_period` cycles after reset.
    pub fn new(timing: &TimingModel) -> Self {
        let period = timing.refresh_period();
        Self {
            enabled: timing.with_refresh(),
            phase: Phase::Idle,
            due: Countdown::armed(period),
            sequence: Countdown::new(),
            period,
            t_rp: timing.t_rp(),
            t_rfc: timing.t_rfc(),
            refreshes: 0,
            last_refresh: None,
        }
    }

    /// Current state of the refresh engine.
    pub const fn state(&self) -> RefreshState {
        match self.phase {
            Phase::Idle => RefreshState::Idle,
            Phase::PrechargeAll | Phase::Precharging | Phase::Refresh => RefreshState::Requesting,
            Phase::Recovering => RefreshState::Recovering,
        }
    }

    /// Whether the bank machines are locked out of the command bus this cycle.
    #[inline]
    pub fn blocks_bus(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// The command the refresher wants to issue this cycle, if any.
    pub const fn intent(&self) -> Option<CommandIntent> {
        let kind = match self.phase {
            Phase::PrechargeAll => CommandKind::PrechargeAll,
            Phase::Refresh => CommandKind::Refresh,
            Phase::Idle | Phase::Precharging | Phase::Recovering => return None,
        };
        Some(CommandIntent {
            source: IntentSource::Refresher,
            kind,
            bank: 0,
            row: 0,
            column: 0,
            tag: None,
            row_hit: false,
        })
    }

    /// Number of refresh commands issued so far.
    pub const fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Cycle of the most recent refresh command.
    pub const fn last_refresh(&self) -> Option<u64> {
        self.last_refresh
    }

    /// Cycles until the next refresh request is raised.
    pub const fn cycles_until_due(&self) -> u32 {
        self.due.remaining()
    }

    /// End-of-cycle update given the command granted on `cycle`.
    pub fn step(&mut self, granted: Option<CommandKind>, cycle: u64) {
        if !self.enabled {
            return;
        }

        let mut sequence_trigger = None;
        let mut due_trigger = None;
        match (self.phase, granted) {
            (Phase::PrechargeAll, Some(CommandKind::PrechargeAll)) => {
                self.phase = Phase::Precharging;
                sequence_trigger = Some(self.t_rp);
            }
            (Phase::Refresh, Some(CommandKind::Refresh)) => {
                self.phase = Phase::Recovering;
                sequence_trigger = Some(self.t_rfc);
                due_trigger = Some(self.period);
                self.refreshes += 1;
                if let Some(prev) = self.last_refresh {
                    debug!(cycle, since_last = cycle - prev, "refresh issued");
                } else {
                    debug!(cycle, "first refresh issued");
                }
                self.last_refresh = Some(cycle);
            }
            _ => {}
        }

        self.sequence.step(sequence_trigger);
        self.due.step(due_trigger);

        match self.phase {
            Phase::Precharging if self.sequence.ready() => self.phase = Phase::Refresh,
            Phase::Recovering if self.sequence.ready() => self.phase = Phase::Idle,
            _ => {}
        }
        if self.phase == Phase::Idle && self.due.ready() {
            debug!(cycle, "refresh due, requesting bus");
            self.phase = Phase::PrechargeAll;
        }
    }
}
