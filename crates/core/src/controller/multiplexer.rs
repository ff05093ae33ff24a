//! Command bus arbiter.
//!
//! The [`Multiplexer`] is the only writer to the command bus. Each cycle it:
//! 1. **Arbitrates:** picks at most one intent from the refresher and the bank machines.
//! 2. **Issues:** turns the winner into a [`PhysicalCommand`] with its bus address.
//! 3. **Commits:** updates the bus-wide countdowns, the policy state and the
//!    round-robin pointer, builds the DFI frame and feeds the data path.
//!
//! While the refresher holds the bus no bank intent is ever granted. Otherwise a
//! bank intent is eligible only when the bus-wide constraints allow it: tRRD
//! between any two activates, tCCD between column commands and the write-to-read
//! turnaround after a write.

#[cfg(feature = "command-log")]
use tracing::trace;
use tracing::{debug, warn};

use crate::common::command::{
    CommandIntent, CommandKind, Completion, DfiFrame, PRECHARGE_ALL_BIT, PhysicalCommand,
};
use crate::common::request::{Opcode, Payload, Request};
use crate::config::ArbitrationPolicy;
use crate::controller::bank_machine::BankView;
use crate::controller::countdown::Countdown;
use crate::controller::datapath::DataPath;
use crate::controller::refresher::Refresher;
use crate::stats::BandwidthCounters;
use crate::timing::{AddressSlicer, TimingModel};

/// Data direction currently favoured by [`ArbitrationPolicy::ReadWriteBudget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reads are granted; writes wait.
    Reading,
    /// Writes are granted; reads wait.
    Writing,
}

impl Direction {
    const fn allows(self, kind: CommandKind) -> bool {
        match kind {
            CommandKind::Read => matches!(self, Self::Reading),
            CommandKind::Write => matches!(self, Self::Writing),
            _ => true,
        }
    }
}

/// Single-issue command bus arbiter.
#[derive(Debug, Clone)]
pub struct Multiplexer {
    policy: ArbitrationPolicy,
    nbanks: usize,
    nphases: usize,
    cmd_phase: usize,
    rdphase: usize,
    wrphase: usize,
    slicer: AddressSlicer,

    last_grant: usize,
    activate_spacing: Countdown,
    column_spacing: Countdown,
    write_to_read: Countdown,
    t_rrd: u32,
    t_ccd: u32,
    write_to_read_delay: u32,

    direction: Direction,
    direction_cycles: u32,
    read_time: u32,
    write_time: u32,
    bypassed: Vec<u32>,
    bypass_limit: u32,

    datapath: DataPath,
    bandwidth: Option<BandwidthCounters>,
}

impl Multiplexer {
    /// Creates an arbiter whose round-robin order starts at bank 0.
    pub fn new(timing: &TimingModel) -> Self {
        let nbanks = timing.nbanks();
        Self {
            policy: timing.policy(),
            nbanks,
            nphases: timing.nphases(),
            cmd_phase: timing.cmd_phase(),
            rdphase: timing.rdphase(),
            wrphase: timing.wrphase(),
            slicer: timing.slicer(),
            last_grant: nbanks - 1,
            activate_spacing: Countdown::new(),
            column_spacing: Countdown::new(),
            write_to_read: Countdown::new(),
            t_rrd: timing.t_rrd(),
            t_ccd: timing.t_ccd(),
            write_to_read_delay: timing.write_to_read(),
            direction: Direction::Reading,
            direction_cycles: 0,
            read_time: timing.read_time(),
            write_time: timing.write_time(),
            bypassed: vec![0; nbanks],
            bypass_limit: timing.row_hit_bypass_limit(),
            datapath: DataPath::new(
                timing.phy_read_latency(),
                timing.phy_write_latency(),
                timing.nphases(),
            ),
            bandwidth: timing
                .with_bandwidth()
                .then(|| BandwidthCounters::new(timing.bandwidth_period())),
        }
    }

    /// Arbitration policy in use.
    pub const fn policy(&self) -> ArbitrationPolicy {
        self.policy
    }

    /// Direction favoured by the read/write budget policy.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Bandwidth counters, when enabled.
    pub const fn bandwidth(&self) -> Option<&BandwidthCounters> {
        self.bandwidth.as_ref()
    }

    /// Whether grants are still waiting for data or completion.
    pub fn datapath_busy(&self) -> bool {
        !self.datapath.is_empty()
    }

    /// Selects at most one intent for the command bus this cycle.
    ///
    /// Pure function of the registered state: the refresher, this cycle's bank
    /// intents (indexed by bank), the bank views and the bus countdowns.
    pub fn arbitrate(
        &self,
        refresher: &Refresher,
        intents: &[Option<CommandIntent>],
        banks: &[BankView],
    ) -> Option<CommandIntent> {
        if refresher.blocks_bus() {
            let intent = refresher.intent()?;
            return match intent.kind {
                CommandKind::PrechargeAll => {
                    banks.iter().all(|b| b.precharge_ready).then_some(intent)
                }
                _ => Some(intent),
            };
        }

        match self.policy {
            ArbitrationPolicy::RoundRobin | ArbitrationPolicy::ReadWriteBudget => {
                self.pick(intents, |_| true)
            }
            ArbitrationPolicy::RowHitFirst => self
                .pick(intents, |i| {
                    self.bypassed.get(i.bank).copied().unwrap_or(0) >= self.bypass_limit
                })
                .or_else(|| self.pick(intents, |i| i.kind.is_column()))
                .or_else(|| self.pick(intents, |_| true)),
        }
    }

    /// First eligible intent satisfying `filter`, in round-robin order after the last grant.
    fn pick(
        &self,
        intents: &[Option<CommandIntent>],
        filter: impl Fn(&CommandIntent) -> bool,
    ) -> Option<CommandIntent> {
        (1..=self.nbanks)
            .map(|offset| (self.last_grant + offset) % self.nbanks)
            .filter_map(|bank| intents.get(bank).copied().flatten())
            .find(|intent| self.eligible(intent) && filter(intent))
    }

    /// Whether the bus-wide constraints allow `intent` this cycle.
    fn eligible(&self, intent: &CommandIntent) -> bool {
        let direction_ok = self.policy != ArbitrationPolicy::ReadWriteBudget
            || self.direction.allows(intent.kind);
        match intent.kind {
            CommandKind::Activate => self.activate_spacing.ready(),
            CommandKind::Precharge => true,
            CommandKind::Read => {
                self.column_spacing.ready() && self.write_to_read.ready() && direction_ok
            }
            CommandKind::Write => self.column_spacing.ready() && direction_ok,
            CommandKind::PrechargeAll | CommandKind::Refresh => false,
        }
    }

    /// Builds the physical command for a granted intent.
    pub fn issue(
        &self,
        intent: &CommandIntent,
        banks: &[BankView],
        cycle: u64,
    ) -> PhysicalCommand {
        let (row, address) = match intent.kind {
            CommandKind::Activate => {
                let row = self.slicer.row_address(intent.row);
                (row, row)
            }
            CommandKind::Read | CommandKind::Write => (
                self.slicer.row_address(intent.row),
                self.slicer.column_address(intent.column),
            ),
            CommandKind::Precharge => {
                let open = banks
                    .get(intent.bank)
                    .and_then(|b| b.state.open_row)
                    .unwrap_or(intent.row);
                (open, 0)
            }
            CommandKind::PrechargeAll => (0, PRECHARGE_ALL_BIT),
            CommandKind::Refresh => (0, 0),
        };
        PhysicalCommand {
            cycle,
            kind: intent.kind,
            bank: intent.bank,
            row,
            column: if intent.kind.is_column() { intent.column } else { 0 },
            address,
            tag: intent.tag,
        }
    }

    /// Registered update at the end of `cycle`.
    ///
    /// `serviced` is the request whose column command was granted, as reported by
    /// its bank machine. `rddata` is the read data presented by the PHY this cycle.
    pub fn commit(
        &mut self,
        command: Option<&PhysicalCommand>,
        serviced: Option<Request>,
        intents: &[Option<CommandIntent>],
        banks: &[BankView],
        rddata: Option<Payload>,
        cycle: u64,
    ) -> (DfiFrame, Vec<Completion>) {
        #[cfg(feature = "command-log")]
        if let Some(cmd) = command {
            trace!(cycle, command = %cmd, "grant");
        }

        let winner = command
            .filter(|c| !matches!(c.kind, CommandKind::PrechargeAll | CommandKind::Refresh))
            .map(|c| c.bank);
        if let Some(bank) = winner {
            self.update_bypass(bank, intents);
            self.last_grant = bank;
        }
        self.update_direction(banks);

        let kind = command.map(|c| c.kind);
        self.activate_spacing
            .step((kind == Some(CommandKind::Activate)).then_some(self.t_rrd));
        self.column_spacing
            .step(kind.is_some_and(CommandKind::is_column).then_some(self.t_ccd));
        self.write_to_read
            .step((kind == Some(CommandKind::Write)).then_some(self.write_to_read_delay));

        if let Some(bandwidth) = &mut self.bandwidth {
            bandwidth.tick(kind);
        }

        let mut frame = DfiFrame::idle(self.nphases);
        if let Some(cmd) = command {
            self.drive(&mut frame, cmd, serviced, cycle);
        }
        let completions = self.datapath.advance(cycle, rddata, &mut frame);
        (frame, completions)
    }

    /// Places `cmd` on the DFI phases and records column grants in the data path.
    fn drive(
        &mut self,
        frame: &mut DfiFrame,
        cmd: &PhysicalCommand,
        serviced: Option<Request>,
        cycle: u64,
    ) {
        if let Some(phase) = frame.phases.get_mut(self.cmd_phase) {
            phase.signals = cmd.signals();
            phase.bank = cmd.bank;
            phase.address = cmd.address;
        }
        let opcode = match cmd.kind {
            CommandKind::Read => Opcode::Read,
            CommandKind::Write => Opcode::Write,
            _ => {
                frame.command = Some(*cmd);
                return;
            }
        };
        let enable = if opcode.is_read() { self.rdphase } else { self.wrphase };
        if let Some(phase) = frame.phases.get_mut(enable) {
            if opcode.is_read() {
                phase.rddata_en = true;
            } else {
                phase.wrdata_en = true;
            }
        }
        frame.command = Some(*cmd);

        match serviced {
            Some(request) => {
                self.datapath
                    .record(opcode, request.tag, cmd.bank, request.payload, cycle);
            }
            None => warn!(cycle, command = %cmd, "column command without a serviced request"),
        }
    }

    /// Ages every eligible bank intent that lost arbitration to `winner`.
    fn update_bypass(&mut self, winner: usize, intents: &[Option<CommandIntent>]) {
        for (bank, intent) in intents.iter().enumerate() {
            let eligible = intent.as_ref().is_some_and(|i| self.eligible(i));
            if let Some(count) = self.bypassed.get_mut(bank) {
                if bank == winner {
                    *count = 0;
                } else if eligible {
                    *count = count.saturating_add(1);
                }
            }
        }
    }

    /// Advances the read/write budget and turns the bus around when it is spent.
    fn update_direction(&mut self, banks: &[BankView]) {
        if self.policy != ArbitrationPolicy::ReadWriteBudget {
            return;
        }
        let reads = banks.iter().any(|b| b.pending == Some(Opcode::Read));
        let writes = banks.iter().any(|b| b.pending == Some(Opcode::Write));
        let (waiting, current, budget, other) = match self.direction {
            Direction::Reading => (writes, reads, self.read_time, Direction::Writing),
            Direction::Writing => (reads, writes, self.write_time, Direction::Reading),
        };
        if waiting {
            self.direction_cycles = self.direction_cycles.saturating_add(1);
        } else {
            self.direction_cycles = 0;
        }
        if waiting && (!current || self.direction_cycles >= budget) {
            debug!(from = ?self.direction, to = ?other, "bus turnaround");
            self.direction = other;
            self.direction_cycles = 0;
        }
    }
}
