//! Behavioural SDRAM device model.
//!
//! The model sits on the far side of the DFI. It only sees what a real device
//! sees: the command strobes, bank and address of the command phase, and the
//! write data slots. It provides:
//! 1. **Storage:** burst payloads keyed by `(bank, row, column)`.
//! 2. **Read data:** returned to the controller `read_latency` cycles after the read command.
//! 3. **Timing checks:** tRCD, tRAS, tRP, tRRD, tRFC, write recovery and row
//!    legality, recorded as [`TimingViolation`] values.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::{trace, warn};

use crate::common::command::{CommandKind, DfiFrame, PRECHARGE_ALL_BIT};
use crate::common::request::Payload;
use crate::timing::TimingModel;

/// A command the device received earlier than its timing allows, or in the wrong state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingViolation {
    /// Column command before tRCD elapsed since the activate.
    #[error("cycle {cycle}: {kind} to bank {bank} {elapsed} cycles after ACT (tRCD = {required})")]
    ActivateToColumn {
        /// Cycle of the offending command.
        cycle: u64,
        /// Offending command.
        kind: CommandKind,
        /// Target bank.
        bank: usize,
        /// Cycles since the activate.
        elapsed: u64,
        /// Required spacing.
        required: u32,
    },
    /// Precharge before tRAS elapsed since the activate.
    #[error("cycle {cycle}: {kind} to bank {bank} {elapsed} cycles after ACT (tRAS = {required})")]
    ActivateToPrecharge {
        /// Cycle of the offending command.
        cycle: u64,
        /// Offending command.
        kind: CommandKind,
        /// Target bank.
        bank: usize,
        /// Cycles since the activate.
        elapsed: u64,
        /// Required spacing.
        required: u32,
    },
    /// Precharge before write recovery completed.
    #[error("cycle {cycle}: {kind} to bank {bank} {elapsed} cycles after WR (need {required})")]
    WriteRecovery {
        /// Cycle of the offending command.
        cycle: u64,
        /// Offending command.
        kind: CommandKind,
        /// Target bank.
        bank: usize,
        /// Cycles since the write.
        elapsed: u64,
        /// Required spacing.
        required: u32,
    },
    /// Activate or refresh before tRP elapsed since the precharge.
    #[error("cycle {cycle}: {kind} to bank {bank} {elapsed} cycles after PRE (tRP = {required})")]
    PrechargeToActivate {
        /// Cycle of the offending command.
        cycle: u64,
        /// Offending command.
        kind: CommandKind,
        /// Target bank.
        bank: usize,
        /// Cycles since the precharge.
        elapsed: u64,
        /// Required spacing.
        required: u32,
    },
    /// Two activates closer than tRRD.
    #[error("cycle {cycle}: ACT {elapsed} cycles after previous ACT (tRRD = {required})")]
    ActivateSpacing {
        /// Cycle of the offending command.
        cycle: u64,
        /// Cycles since the previous activate.
        elapsed: u64,
        /// Required spacing.
        required: u32,
    },
    /// Any command inside the refresh recovery window.
    #[error("cycle {cycle}: {kind} {elapsed} cycles after REF (tRFC = {required})")]
    RefreshRecovery {
        /// Cycle of the offending command.
        cycle: u64,
        /// Offending command.
        kind: CommandKind,
        /// Cycles since the refresh.
        elapsed: u64,
        /// Required spacing.
        required: u32,
    },
    /// Activate or refresh while a row is open.
    #[error("cycle {cycle}: {kind} while bank {bank} has an open row")]
    BankOpen {
        /// Cycle of the offending command.
        cycle: u64,
        /// Offending command.
        kind: CommandKind,
        /// Open bank.
        bank: usize,
    },
    /// Column command to a bank with no open row.
    #[error("cycle {cycle}: {kind} to bank {bank} with no open row")]
    RowNotOpen {
        /// Cycle of the offending command.
        cycle: u64,
        /// Offending command.
        kind: CommandKind,
        /// Target bank.
        bank: usize,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct BankTiming {
    open_row: Option<u32>,
    activated_at: Option<u64>,
    precharged_at: Option<u64>,
    written_at: Option<u64>,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    due: u64,
    key: (usize, u32, u32),
}

/// Cycle-level SDRAM device driven by DFI frames.
#[derive(Debug, Clone)]
pub struct DramModel {
    nphases: usize,
    cmd_phase: usize,
    address_align: u32,
    data_mask: u64,
    read_latency: u64,
    write_latency: u64,
    t_rcd: u32,
    t_ras: u32,
    t_rp: u32,
    t_rrd: u32,
    t_rfc: u32,
    write_to_precharge: u32,

    banks: Vec<BankTiming>,
    last_activate: Option<u64>,
    last_refresh: Option<u64>,
    storage: HashMap<(usize, u32, u32), Payload>,
    reads: VecDeque<(u64, Payload)>,
    writes: VecDeque<PendingWrite>,
    violations: Vec<TimingViolation>,
}

impl DramModel {
    /// Creates a device with every bank precharged and all storage zero.
    pub fn new(timing: &TimingModel) -> Self {
        let bits = timing.dfi_databits();
        Self {
            nphases: timing.nphases(),
            cmd_phase: timing.cmd_phase(),
            address_align: timing.address_align(),
            data_mask: if bits >= 64 { u64::MAX } else { (1 << bits) - 1 },
            read_latency: u64::from(timing.phy_read_latency()),
            write_latency: u64::from(timing.phy_write_latency()),
            t_rcd: timing.t_rcd(),
            t_ras: timing.t_ras(),
            t_rp: timing.t_rp(),
            t_rrd: timing.t_rrd(),
            t_rfc: timing.t_rfc(),
            write_to_precharge: timing.write_to_precharge(),
            banks: vec![BankTiming::default(); timing.nbanks()],
            last_activate: None,
            last_refresh: None,
            storage: HashMap::new(),
            reads: VecDeque::new(),
            writes: VecDeque::new(),
            violations: Vec::new(),
        }
    }

    /// Read data the device presents on `cycle`, if a read burst is due.
    pub fn rddata(&mut self, cycle: u64) -> Option<Payload> {
        if self.reads.front().is_some_and(|(due, _)| *due <= cycle) {
            return self.reads.pop_front().map(|(_, data)| data);
        }
        None
    }

    /// Samples the DFI frame driven on `cycle`.
    pub fn observe(&mut self, frame: &DfiFrame, cycle: u64) {
        if let Some(phase) = frame.phases.get(self.cmd_phase) {
            let a10 = phase.address & PRECHARGE_ALL_BIT != 0;
            if let Some(kind) = phase.signals.decode(a10) {
                self.command(kind, phase.bank, phase.address, cycle);
            }
        }

        if self.writes.front().is_some_and(|w| w.due <= cycle) {
            if let Some(write) = self.writes.pop_front() {
                match frame.write_data() {
                    Some(data) => {
                        let masked = Payload(data.0.iter().map(|w| w & self.data_mask).collect());
                        let _ = self.storage.insert(write.key, masked);
                    }
                    None => warn!(cycle, bank = write.key.0, "write burst without data"),
                }
            }
        }
    }

    /// Stored burst at `(bank, row, column)`, zero if never written.
    pub fn peek(&self, bank: usize, row: u32, column: u32) -> Payload {
        self.storage
            .get(&(bank, row, column))
            .cloned()
            .unwrap_or_else(|| Payload::zeroed(self.nphases))
    }

    /// Open row of `bank` as the device sees it.
    pub fn open_row(&self, bank: usize) -> Option<u32> {
        self.banks.get(bank).and_then(|b| b.open_row)
    }

    /// Violations recorded so far.
    pub fn violations(&self) -> &[TimingViolation] {
        &self.violations
    }

    fn command(&mut self, kind: CommandKind, bank: usize, address: u32, cycle: u64) {
        trace!(cycle, %kind, bank, address, "dram command");
        if let Some(at) = self.last_refresh {
            let elapsed = cycle - at;
            if elapsed < u64::from(self.t_rfc) {
                self.violations.push(TimingViolation::RefreshRecovery {
                    cycle,
                    kind,
                    elapsed,
                    required: self.t_rfc,
                });
            }
        }

        match kind {
            CommandKind::Activate => self.activate(bank, address, cycle),
            CommandKind::Precharge => self.precharge(kind, bank, cycle),
            CommandKind::PrechargeAll => {
                for index in 0..self.banks.len() {
                    self.precharge(kind, index, cycle);
                }
            }
            CommandKind::Read | CommandKind::Write => {
                self.column(kind, bank, address >> self.address_align, cycle);
            }
            CommandKind::Refresh => {
                for index in 0..self.banks.len() {
                    let state = self.banks[index];
                    if state.open_row.is_some() {
                        self.violations.push(TimingViolation::BankOpen {
                            cycle,
                            kind,
                            bank: index,
                        });
                    }
                    self.check_precharged(kind, index, state, cycle);
                }
                self.last_refresh = Some(cycle);
            }
        }
    }

    fn activate(&mut self, bank: usize, row: u32, cycle: u64) {
        let Some(state) = self.banks.get(bank).copied() else {
            return;
        };
        if state.open_row.is_some() {
            self.violations.push(TimingViolation::BankOpen {
                cycle,
                kind: CommandKind::Activate,
                bank,
            });
        }
        self.check_precharged(CommandKind::Activate, bank, state, cycle);
        if let Some(at) = self.last_activate {
            let elapsed = cycle - at;
            if elapsed < u64::from(self.t_rrd) {
                self.violations.push(TimingViolation::ActivateSpacing {
                    cycle,
                    elapsed,
                    required: self.t_rrd,
                });
            }
        }
        self.last_activate = Some(cycle);
        self.banks[bank] = BankTiming {
            open_row: Some(row),
            activated_at: Some(cycle),
            ..state
        };
    }

    fn precharge(&mut self, kind: CommandKind, bank: usize, cycle: u64) {
        let Some(state) = self.banks.get(bank).copied() else {
            return;
        };
        if state.open_row.is_none() {
            return;
        }
        if let Some(at) = state.activated_at {
            let elapsed = cycle - at;
            if elapsed < u64::from(self.t_ras) {
                self.violations.push(TimingViolation::ActivateToPrecharge {
                    cycle,
                    kind,
                    bank,
                    elapsed,
                    required: self.t_ras,
                });
            }
        }
        if let Some(at) = state.written_at {
            let elapsed = cycle - at;
            if elapsed < u64::from(self.write_to_precharge) {
                self.violations.push(TimingViolation::WriteRecovery {
                    cycle,
                    kind,
                    bank,
                    elapsed,
                    required: self.write_to_precharge,
                });
            }
        }
        self.banks[bank] = BankTiming {
            open_row: None,
            precharged_at: Some(cycle),
            ..state
        };
    }

    fn column(&mut self, kind: CommandKind, bank: usize, column: u32, cycle: u64) {
        let Some(state) = self.banks.get(bank).copied() else {
            return;
        };
        let Some(row) = state.open_row else {
            self.violations
                .push(TimingViolation::RowNotOpen { cycle, kind, bank });
            return;
        };
        if let Some(at) = state.activated_at {
            let elapsed = cycle - at;
            if elapsed < u64::from(self.t_rcd) {
                self.violations.push(TimingViolation::ActivateToColumn {
                    cycle,
                    kind,
                    bank,
                    elapsed,
                    required: self.t_rcd,
                });
            }
        }

        let key = (bank, row, column);
        if kind == CommandKind::Read {
            let data = self.peek(bank, row, column);
            self.reads.push_back((cycle + self.read_latency, data));
        } else {
            self.writes.push_back(PendingWrite {
                due: cycle + self.write_latency,
                key,
            });
            self.banks[bank].written_at = Some(cycle);
        }
    }

    fn check_precharged(&mut self, kind: CommandKind, bank: usize, state: BankTiming, cycle: u64) {
        if let Some(at) = state.precharged_at {
            let elapsed = cycle - at;
            if elapsed < u64::from(self.t_rp) {
                self.violations.push(TimingViolation::PrechargeToActivate {
                    cycle,
                    kind,
                    bank,
                    elapsed,
                    required: self.t_rp,
                });
            }
        }
    }
}
