//! DRAM Command Types.
//!
//! This module defines what flows from the controller engines to the physical interface:
//! 1. **Intents:** Per-cycle command requests from the refresher and each bank machine.
//! 2. **Physical Commands:** The single command granted onto the command bus each cycle.
//! 3. **DFI Frames:** Per-phase control strobes and data slots driven to the PHY.
//! 4. **Completions:** Data-path events raised after the fixed read/write latency.

use std::fmt;

use super::request::{Payload, RequestTag};

/// Address bit that selects "all banks" on a precharge command.
pub const PRECHARGE_ALL_BIT: u32 = 1 << 10;

/// Kind of command driven onto the command bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Open a row in a bank.
    Activate,
    /// Close the open row of one bank.
    Precharge,
    /// Close the open rows of every bank (A10 high).
    PrechargeAll,
    /// Column read from the open row.
    Read,
    /// Column write to the open row.
    Write,
    /// Auto-refresh; all banks must be precharged.
    Refresh,
}

impl CommandKind {
    /// Returns `true` for column commands (read or write).
    #[inline]
    pub const fn is_column(self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }

    /// Returns the active-low `(ras_n, cas_n, we_n)` strobes encoding this command.
    pub const fn strobes(self) -> ControlSignals {
        let (ras_n, cas_n, we_n) = match self {
            Self::Activate => (false, true, true),
            Self::Precharge | Self::PrechargeAll => (false, true, false),
            Self::Read => (true, false, true),
            Self::Write => (true, false, false),
            Self::Refresh => (false, false, true),
        };
        ControlSignals {
            cs_n: false,
            ras_n,
            cas_n,
            we_n,
        }
    }

    /// Short mnemonic used in traces.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Activate => "ACT",
            Self::Precharge => "PRE",
            Self::PrechargeAll => "PREA",
            Self::Read => "RD",
            Self::Write => "WR",
            Self::Refresh => "REF",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Active-low command strobes of one DFI phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ControlSignals {
    /// Chip select; high deselects the device.
    pub cs_n: bool,
    /// Row address strobe.
    pub ras_n: bool,
    /// Column address strobe.
    pub cas_n: bool,
    /// Write enable.
    pub we_n: bool,
}

impl ControlSignals {
    /// No-operation strobes (selected, all strobes high).
    pub const NOP: Self = Self {
        cs_n: false,
        ras_n: true,
        cas_n: true,
        we_n: true,
    };

    /// Decodes the strobes back into a command kind.
    ///
    /// `a10` distinguishes precharge-all from single-bank precharge.
    /// Returns `None` for NOP or a deselected device.
    pub const fn decode(self, a10: bool) -> Option<CommandKind> {
        if self.cs_n {
            return None;
        }
        match (self.ras_n, self.cas_n, self.we_n) {
            (false, true, true) => Some(CommandKind::Activate),
            (false, true, false) if a10 => Some(CommandKind::PrechargeAll),
            (false, true, false) => Some(CommandKind::Precharge),
            (true, false, true) => Some(CommandKind::Read),
            (true, false, false) => Some(CommandKind::Write),
            (false, false, true) => Some(CommandKind::Refresh),
            _ => None,
        }
    }
}

impl Default for ControlSignals {
    fn default() -> Self {
        Self::NOP
    }
}

/// Which engine asserted an intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntentSource {
    /// The periodic refresher.
    Refresher,
    /// The bank machine with the given index.
    Bank(usize),
}

/// A command one engine would like to issue this cycle.
///
/// Recomputed every cycle from registered state and never stored across cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandIntent {
    /// Engine asserting the intent.
    pub source: IntentSource,
    /// Command to issue.
    pub kind: CommandKind,
    /// Target bank (ignored for all-bank commands).
    pub bank: usize,
    /// Target row.
    pub row: u32,
    /// Burst-granular column (column commands only).
    pub column: u32,
    /// Request being serviced, if any.
    pub tag: Option<RequestTag>,
    /// Arbitration hint: the command hits the bank's open row.
    pub row_hit: bool,
}

/// The single command granted onto the command bus in one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicalCommand {
    /// Cycle the command was issued on.
    pub cycle: u64,
    /// Command kind.
    pub kind: CommandKind,
    /// Bank select.
    pub bank: usize,
    /// Row the command targets (the open row for column commands).
    pub row: u32,
    /// Burst-granular column (column commands only).
    pub column: u32,
    /// Value driven on the DRAM address bus.
    pub address: u32,
    /// Request being serviced, if any.
    pub tag: Option<RequestTag>,
}

impl PhysicalCommand {
    /// Active-low strobes encoding this command.
    #[inline]
    pub const fn signals(&self) -> ControlSignals {
        self.kind.strobes()
    }
}

impl fmt::Display for PhysicalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CommandKind::Activate => {
                write!(f, "@{} ACT b{} r{:#x}", self.cycle, self.bank, self.row)
            }
            CommandKind::Read | CommandKind::Write => write!(
                f,
                "@{} {} b{} r{:#x} c{:#x}",
                self.cycle, self.kind, self.bank, self.row, self.column
            ),
            CommandKind::Precharge => write!(f, "@{} PRE b{}", self.cycle, self.bank),
            CommandKind::PrechargeAll | CommandKind::Refresh => {
                write!(f, "@{} {}", self.cycle, self.kind)
            }
        }
    }
}

/// One phase of a DFI frame.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DfiPhase {
    /// Command strobes.
    pub signals: ControlSignals,
    /// Bank select.
    pub bank: usize,
    /// Address bus value.
    pub address: u32,
    /// Read data enable.
    pub rddata_en: bool,
    /// Write data enable.
    pub wrdata_en: bool,
    /// Write data slot, driven `write_latency` cycles after the write command.
    pub wrdata: Option<u64>,
}

/// Everything driven to the PHY in one controller cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfiFrame {
    /// Per-phase strobes and data slots.
    pub phases: Vec<DfiPhase>,
    /// The command carried by this frame, if any.
    pub command: Option<PhysicalCommand>,
}

impl DfiFrame {
    /// Creates an idle frame of `nphases` NOP phases.
    pub fn idle(nphases: usize) -> Self {
        Self {
            phases: vec![DfiPhase::default(); nphases],
            command: None,
        }
    }

    /// Reassembles the write data carried across all phases, if any phase has a slot.
    pub fn write_data(&self) -> Option<Payload> {
        if self.phases.iter().all(|p| p.wrdata.is_none()) {
            return None;
        }
        Some(Payload(
            self.phases.iter().map(|p| p.wrdata.unwrap_or(0)).collect(),
        ))
    }
}

/// Data-path event raised after the fixed read or write latency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Read data for a request, valid this cycle.
    Read {
        /// Request identifier.
        tag: RequestTag,
        /// Bank the request targeted.
        bank: usize,
        /// Data returned by the device.
        data: Payload,
        /// Cycle the read command was granted.
        granted_at: u64,
    },
    /// Write data for a request has been driven to the device.
    Write {
        /// Request identifier.
        tag: RequestTag,
        /// Bank the request targeted.
        bank: usize,
        /// Cycle the write command was granted.
        granted_at: u64,
    },
}

impl Completion {
    /// Request identifier of this completion.
    pub const fn tag(&self) -> RequestTag {
        match self {
            Self::Read { tag, .. } | Self::Write { tag, .. } => *tag,
        }
    }

    /// Cycle the originating column command was granted.
    pub const fn granted_at(&self) -> u64 {
        match self {
            Self::Read { granted_at, .. } | Self::Write { granted_at, .. } => *granted_at,
        }
    }
}
