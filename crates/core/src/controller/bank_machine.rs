//! Per-bank command sequencer.
//!
//! One [`BankMachine`] exists per bank. It takes one request at a time from its
//! bank's queue and emits the shortest legal command sequence for it:
//! 1. **Row hit:** the column command alone.
//! 2. **Closed bank:** activate, then the column command after tRCD.
//! 3. **Row conflict:** precharge (after tRAS and write recovery), activate after tRP,
//!    then the column command after tRCD.
//!
//! The machine never pipelines commands of two requests: the next request is
//! accepted only after the column command of the current one has been granted.
//! It also snoops precharge-all on the bus and closes itself, so a refresh never
//! drops an in-flight request; the request is simply re-sequenced afterwards.

use std::fmt;

use tracing::{trace, warn};

use crate::common::command::{CommandIntent, CommandKind, IntentSource, PhysicalCommand};
use crate::common::request::{Opcode, Request};
use crate::controller::RequestQueue;
use crate::controller::countdown::Countdown;
use crate::timing::{AddressSlicer, TimingModel};

/// Row-buffer state of a bank as sequenced by its machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankPhase {
    /// No row open; an activate is legal.
    Closed,
    /// Activate issued; waiting tRCD before column commands.
    Activating {
        /// Row being opened.
        row: u32,
    },
    /// Row open and ready for column commands.
    Open {
        /// Open row.
        row: u32,
    },
    /// Precharge issued; waiting tRP before the next activate.
    Precharging,
}

impl fmt::Display for BankPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Activating { row } => write!(f, "activating({row:#x})"),
            Self::Open { row } => write!(f, "open({row:#x})"),
            Self::Precharging => f.write_str("precharging"),
        }
    }
}

/// Read-only summary of a bank's row buffer.
///
/// `open_row` is `Some` exactly when `is_open` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankState {
    /// A row is open (or being opened).
    pub is_open: bool,
    /// The open row.
    pub open_row: Option<u32>,
    /// A precharge is in progress.
    pub pending_precharge: bool,
}

impl From<BankPhase> for BankState {
    fn from(phase: BankPhase) -> Self {
        match phase {
            BankPhase::Closed => Self {
                is_open: false,
                open_row: None,
                pending_precharge: false,
            },
            BankPhase::Activating { row } | BankPhase::Open { row } => Self {
                is_open: true,
                open_row: Some(row),
                pending_precharge: false,
            },
            BankPhase::Precharging => Self {
                is_open: false,
                open_row: None,
                pending_precharge: true,
            },
        }
    }
}

/// What the multiplexer may observe of a bank machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankView {
    /// Row-buffer state.
    pub state: BankState,
    /// Direction of the in-flight request, if any.
    pub pending: Option<Opcode>,
    /// tRAS and write recovery allow a precharge this cycle.
    pub precharge_ready: bool,
}

/// Sequencer for one bank.
#[derive(Debug, Clone)]
pub struct BankMachine {
    index: usize,
    phase: BankPhase,
    current: Option<Request>,
    act_to_col: Countdown,
    act_to_pre: Countdown,
    write_to_pre: Countdown,
    pre_to_act: Countdown,
    t_rcd: u32,
    t_ras: u32,
    t_rp: u32,
    write_to_precharge: u32,
    slicer: AddressSlicer,
    row_hits: u64,
    row_misses: u64,
    row_empty: u64,
}

impl BankMachine {
    /// Creates the machine for bank `index` with every row closed.
    pub const fn new(index: usize, timing: &TimingModel) -> Self {
        Self {
            index,
            phase: BankPhase::Closed,
            current: None,
            act_to_col: Countdown::new(),
            act_to_pre: Countdown::new(),
            write_to_pre: Countdown::new(),
            pre_to_act: Countdown::new(),
            t_rcd: timing.t_rcd(),
            t_ras: timing.t_ras(),
            t_rp: timing.t_rp(),
            write_to_precharge: timing.write_to_precharge(),
            slicer: timing.slicer(),
            row_hits: 0,
            row_misses: 0,
            row_empty: 0,
        }
    }

    /// Bank index.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Current sequencing phase.
    pub const fn phase(&self) -> BankPhase {
        self.phase
    }

    /// Row-buffer state.
    pub fn state(&self) -> BankState {
        self.phase.into()
    }

    /// The request being sequenced, if any.
    pub const fn current(&self) -> Option<&Request> {
        self.current.as_ref()
    }

    /// Whether the machine holds no request.
    pub const fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Whether tRAS and write recovery allow closing the row this cycle.
    #[inline]
    pub const fn precharge_ready(&self) -> bool {
        self.act_to_pre.ready() && self.write_to_pre.ready()
    }

    /// Requests accepted while their row was already open.
    pub const fn row_hits(&self) -> u64 {
        self.row_hits
    }

    /// Requests accepted while another row was open.
    pub const fn row_misses(&self) -> u64 {
        self.row_misses
    }

    /// Requests accepted while the bank was closed.
    pub const fn row_empty(&self) -> u64 {
        self.row_empty
    }

    /// Snapshot for the multiplexer.
    pub fn view(&self) -> BankView {
        BankView {
            state: self.state(),
            pending: self.current.as_ref().map(|r| r.opcode),
            precharge_ready: self.precharge_ready(),
        }
    }

    /// Takes the next request from the bank's queue if no request is in flight.
    ///
    /// A row or column outside the bank is truncated to the geometry, so the
    /// command bus never carries address bits beyond the row and column widths.
    pub fn accept<Q: RequestQueue + ?Sized>(&mut self, queue: &mut Q) {
        if self.current.is_some() {
            return;
        }
        let Some(mut request) = queue.pop_request(self.index) else {
            return;
        };
        if !self.slicer.contains(request.row, request.column) {
            warn!(
                bank = self.index,
                %request,
                "request outside bank geometry, address truncated"
            );
            let addr = self.slicer.encode(request.row, request.column);
            request.row = self.slicer.row(addr);
            request.column = self.slicer.column(addr);
        }
        match self.state().open_row {
            Some(row) if row == request.row => self.row_hits += 1,
            Some(_) => self.row_misses += 1,
            None => self.row_empty += 1,
        }
        trace!(bank = self.index, phase = %self.phase, %request, "accepted");
        self.current = Some(request);
    }

    /// The single command legal for this bank this cycle, if any.
    pub fn intent(&self) -> Option<CommandIntent> {
        let request = self.current.as_ref()?;
        let intent = |kind: CommandKind, row_hit: bool| CommandIntent {
            source: IntentSource::Bank(self.index),
            kind,
            bank: self.index,
            row: request.row,
            column: request.column,
            tag: Some(request.tag),
            row_hit,
        };
        match self.phase {
            BankPhase::Closed => Some(intent(CommandKind::Activate, false)),
            BankPhase::Activating { .. } | BankPhase::Precharging => None,
            BankPhase::Open { row } if row == request.row => {
                let kind = match request.opcode {
                    Opcode::Read => CommandKind::Read,
                    Opcode::Write => CommandKind::Write,
                };
                Some(intent(kind, true))
            }
            BankPhase::Open { .. } => self
                .precharge_ready()
                .then(|| intent(CommandKind::Precharge, false)),
        }
    }

    /// End-of-cycle update given the command on the bus this cycle.
    ///
    /// Returns the request whose column command was just granted.
    pub fn step(&mut self, command: Option<&PhysicalCommand>) -> Option<Request> {
        let mut serviced = None;
        let mut act_to_col = None;
        let mut act_to_pre = None;
        let mut write_to_pre = None;
        let mut pre_to_act = None;

        if let Some(cmd) = command {
            match cmd.kind {
                CommandKind::PrechargeAll => {
                    if self.phase != BankPhase::Closed {
                        self.phase = BankPhase::Precharging;
                        pre_to_act = Some(self.t_rp);
                    }
                }
                CommandKind::Refresh => {}
                _ if cmd.bank != self.index => {}
                CommandKind::Activate => {
                    self.phase = BankPhase::Activating { row: cmd.row };
                    act_to_col = Some(self.t_rcd);
                    act_to_pre = Some(self.t_ras);
                }
                CommandKind::Precharge => {
                    self.phase = BankPhase::Precharging;
                    pre_to_act = Some(self.t_rp);
                }
                CommandKind::Read | CommandKind::Write => {
                    if cmd.kind == CommandKind::Write {
                        write_to_pre = Some(self.write_to_precharge);
                    }
                    serviced = self.current.take();
                }
            }
        }

        self.act_to_col.step(act_to_col);
        self.act_to_pre.step(act_to_pre);
        self.write_to_pre.step(write_to_pre);
        self.pre_to_act.step(pre_to_act);

        let before = self.phase;
        match self.phase {
            BankPhase::Activating { row } if self.act_to_col.ready() => {
                self.phase = BankPhase::Open { row };
            }
            BankPhase::Precharging if self.pre_to_act.ready() => self.phase = BankPhase::Closed,
            _ => {}
        }
        if before != self.phase {
            trace!(bank = self.index, from = %before, to = %self.phase, "bank phase");
        }
        serviced
    }
}
