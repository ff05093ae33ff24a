//! Controller statistics collection and reporting.
//!
//! This module tracks the counters exposed by the controller and the simulator. It provides:
//! 1. **Bandwidth:** Granted reads, writes and commands, cumulative and per sampling period.
//! 2. **Command mix:** Counts of every command kind driven onto the bus.
//! 3. **Row buffer:** Row hits, misses and accesses to closed banks.
//! 4. **Latency:** Completed reads/writes and the mean read latency.

use std::time::Instant;

use crate::common::command::CommandKind;

/// Counts taken over one bandwidth sampling period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BandwidthSample {
    /// Read commands granted.
    pub reads: u64,
    /// Write commands granted.
    pub writes: u64,
    /// Commands of any kind granted.
    pub commands: u64,
}

impl BandwidthSample {
    fn record(&mut self, kind: CommandKind) {
        self.commands += 1;
        match kind {
            CommandKind::Read => self.reads += 1,
            CommandKind::Write => self.writes += 1,
            _ => {}
        }
    }
}

/// Read-only bandwidth counters for the monitoring side.
///
/// Cumulative counts run from reset; `last_period` holds the counts of the most
/// recently completed sampling period and is replaced every `period` cycles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandwidthCounters {
    period: u64,
    elapsed: u64,
    periods: u64,
    total: BandwidthSample,
    current: BandwidthSample,
    last_period: BandwidthSample,
}

impl BandwidthCounters {
    /// Creates zeroed counters sampled every `period` cycles.
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(1),
            elapsed: 0,
            periods: 0,
            total: BandwidthSample::default(),
            current: BandwidthSample::default(),
            last_period: BandwidthSample::default(),
        }
    }

    /// Accounts one cycle and the command granted in it.
    pub fn tick(&mut self, granted: Option<CommandKind>) {
        if let Some(kind) = granted {
            self.total.record(kind);
            self.current.record(kind);
        }
        self.elapsed += 1;
        if self.elapsed == self.period {
            self.last_period = std::mem::take(&mut self.current);
            self.elapsed = 0;
            self.periods += 1;
        }
    }

    /// Granted reads since reset.
    pub const fn reads(&self) -> u64 {
        self.total.reads
    }

    /// Granted writes since reset.
    pub const fn writes(&self) -> u64 {
        self.total.writes
    }

    /// Granted commands of any kind since reset.
    pub const fn commands(&self) -> u64 {
        self.total.commands
    }

    /// Counts of the last completed sampling period.
    pub const fn last_period(&self) -> BandwidthSample {
        self.last_period
    }

    /// Number of completed sampling periods.
    pub const fn periods(&self) -> u64 {
        self.periods
    }

    /// Sampling period in cycles.
    pub const fn period(&self) -> u64 {
        self.period
    }
}

/// Simulation statistics structure tracking controller and device activity.
#[derive(Clone, Debug)]
pub struct SimStats {
    start_time: Instant,
    /// Total controller cycles elapsed.
    pub cycles: u64,
    /// Cycles with a command on the bus.
    pub busy_cycles: u64,

    /// Activate commands issued.
    pub cmd_activate: u64,
    /// Single-bank precharge commands issued.
    pub cmd_precharge: u64,
    /// Precharge-all commands issued.
    pub cmd_precharge_all: u64,
    /// Read commands issued.
    pub cmd_read: u64,
    /// Write commands issued.
    pub cmd_write: u64,
    /// Refresh commands issued.
    pub cmd_refresh: u64,

    /// Requests accepted while their row was open.
    pub row_hits: u64,
    /// Requests accepted while another row was open.
    pub row_misses: u64,
    /// Requests accepted while the bank was closed.
    pub row_empty: u64,

    /// Read completions delivered.
    pub reads_completed: u64,
    /// Write completions delivered.
    pub writes_completed: u64,
    /// Sum of submit-to-completion cycles over all completed reads.
    pub read_latency_total: u64,
    /// Requests refused because their bank queue was full.
    pub queue_rejections: u64,
    /// Timing violations reported by the device model.
    pub timing_violations: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            busy_cycles: 0,
            cmd_activate: 0,
            cmd_precharge: 0,
            cmd_precharge_all: 0,
            cmd_read: 0,
            cmd_write: 0,
            cmd_refresh: 0,
            row_hits: 0,
            row_misses: 0,
            row_empty: 0,
            reads_completed: 0,
            writes_completed: 0,
            read_latency_total: 0,
            queue_rejections: 0,
            timing_violations: 0,
        }
    }
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"commands"`, `"rowbuffer"`, `"latency"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "commands", "rowbuffer", "latency"];

impl SimStats {
    /// Counts one command driven onto the bus.
    pub fn record_command(&mut self, kind: CommandKind) {
        self.busy_cycles += 1;
        match kind {
            CommandKind::Activate => self.cmd_activate += 1,
            CommandKind::Precharge => self.cmd_precharge += 1,
            CommandKind::PrechargeAll => self.cmd_precharge_all += 1,
            CommandKind::Read => self.cmd_read += 1,
            CommandKind::Write => self.cmd_write += 1,
            CommandKind::Refresh => self.cmd_refresh += 1,
        }
    }

    /// Total commands issued.
    pub const fn commands(&self) -> u64 {
        self.cmd_activate
            + self.cmd_precharge
            + self.cmd_precharge_all
            + self.cmd_read
            + self.cmd_write
            + self.cmd_refresh
    }

    /// Mean submit-to-completion latency of reads, in cycles.
    pub fn mean_read_latency(&self) -> f64 {
        if self.reads_completed == 0 {
            0.0
        } else {
            self.read_latency_total as f64 / self.reads_completed as f64
        }
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]. Pass an
    /// empty slice to print all sections (same as `print()`).
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1) as f64;

        if want("summary") {
            let khz = if seconds > 0.0 {
                (self.cycles as f64 / seconds) / 1000.0
            } else {
                0.0
            };
            println!("\n==========================================================");
            println!("DRAM CONTROLLER SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_cycles               {}", self.cycles);
            println!("sim_freq                 {khz:.2} kHz");
            println!(
                "bus_utilisation          {:.2}%",
                self.busy_cycles as f64 / cyc * 100.0
            );
            println!(
                "data_utilisation         {:.2}%",
                (self.cmd_read + self.cmd_write) as f64 / cyc * 100.0
            );
            println!("timing_violations        {}", self.timing_violations);
            println!("----------------------------------------------------------");
        }
        if want("commands") {
            let total = self.commands().max(1) as f64;
            let line = |name: &str, count: u64| {
                println!(
                    "  cmd.{name:<18} {count} ({:.2}%)",
                    count as f64 / total * 100.0
                );
            };
            println!("COMMAND MIX");
            line("activate", self.cmd_activate);
            line("precharge", self.cmd_precharge);
            line("precharge_all", self.cmd_precharge_all);
            line("read", self.cmd_read);
            line("write", self.cmd_write);
            line("refresh", self.cmd_refresh);
            println!("----------------------------------------------------------");
        }
        if want("rowbuffer") {
            let accesses = self.row_hits + self.row_misses + self.row_empty;
            let hit_rate = if accesses > 0 {
                self.row_hits as f64 / accesses as f64 * 100.0
            } else {
                0.0
            };
            println!("ROW BUFFER");
            println!("  row.accesses           {accesses}");
            println!("  row.hits               {}", self.row_hits);
            println!("  row.misses             {}", self.row_misses);
            println!("  row.empty              {}", self.row_empty);
            println!("  row.hit_rate           {hit_rate:.2}%");
            println!("----------------------------------------------------------");
        }
        if want("latency") {
            println!("LATENCY");
            println!("  reads.completed        {}", self.reads_completed);
            println!("  writes.completed       {}", self.writes_completed);
            println!("  reads.mean_latency     {:.2} cycles", self.mean_read_latency());
            println!("  queue.rejections       {}", self.queue_rejections);
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
