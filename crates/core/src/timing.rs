//! Validated timing model.
//!
//! [`TimingModel`] is derived once from a [`Config`] and holds every numeric constant
//! the engines consult: the raw timing parameters, the burst length and address
//! alignment implied by the memory type, and secondary constants such as the
//! write-to-precharge window and the refresh lead time. Deriving it is the single
//! place where a configuration can be rejected.

use tracing::debug;

use crate::common::error::ConfigError;
use crate::config::{ArbitrationPolicy, Config, MemoryType};

/// Lowest address bus width that can carry the A10 precharge-all flag.
const MIN_ADDRESSBITS: u32 = 11;

/// Largest supported bank address width.
const MAX_BANKBITS: u32 = 8;

/// Largest supported number of DFI phases per controller cycle.
const MAX_NPHASES: u32 = 16;

/// Splits a bank-local request address into row and column.
///
/// The low `colbits - address_align` bits select the burst within the row, the
/// bits above select the row. The DRAM column address is the burst index shifted
/// left by `address_align`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSlicer {
    col_bits: u32,
    row_bits: u32,
    address_align: u32,
}

impl AddressSlicer {
    /// Row selected by a bank-local address.
    #[inline]
    pub const fn row(&self, addr: u64) -> u32 {
        ((addr >> self.col_bits) & mask(self.row_bits)) as u32
    }

    /// Burst-granular column selected by a bank-local address.
    #[inline]
    pub const fn column(&self, addr: u64) -> u32 {
        (addr & mask(self.col_bits)) as u32
    }

    /// Whether `(row, column)` lies inside the bank.
    #[inline]
    pub const fn contains(&self, row: u32, column: u32) -> bool {
        row as u64 <= mask(self.row_bits) && column as u64 <= mask(self.col_bits)
    }

    /// DRAM row address for `row`, truncated to the row width.
    #[inline]
    pub const fn row_address(&self, row: u32) -> u32 {
        (row as u64 & mask(self.row_bits)) as u32
    }

    /// DRAM column address for a burst index, truncated to the column width.
    #[inline]
    pub const fn column_address(&self, column: u32) -> u32 {
        ((column as u64 & mask(self.col_bits)) << self.address_align) as u32
    }

    /// Bank-local address of `(row, column)`.
    #[inline]
    pub const fn encode(&self, row: u32, column: u32) -> u64 {
        ((row as u64 & mask(self.row_bits)) << self.col_bits) | (column as u64 & mask(self.col_bits))
    }

    /// Width of a bank-local address in bits.
    #[inline]
    pub const fn address_width(&self) -> u32 {
        self.row_bits + self.col_bits
    }
}

const fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1 << bits) - 1 }
}

/// Read-only timing and geometry constants derived from a validated [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingModel {
    memtype: MemoryType,
    nphases: usize,
    dfi_databits: u32,
    burst_length: u32,
    address_align: u32,
    nbanks: usize,
    rowbits: u32,
    colbits: u32,
    addressbits: u32,
    cmd_phase: usize,
    rdphase: usize,
    wrphase: usize,
    phy_read_latency: u32,
    phy_write_latency: u32,
    t_rp: u32,
    t_rcd: u32,
    t_wr: u32,
    t_wtr: u32,
    t_refi: u32,
    t_rfc: u32,
    t_ras: u32,
    t_rrd: u32,
    t_ccd: u32,
    refresh_lead: u32,
    req_queue_size: usize,
    read_time: u32,
    write_time: u32,
    policy: ArbitrationPolicy,
    row_hit_bypass_limit: u32,
    with_refresh: bool,
    with_bandwidth: bool,
    bandwidth_period: u64,
}

impl TimingModel {
    /// Validates `config` and derives the timing model.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::InvalidPhaseCount`] if `nphases` is zero or above 16.
    /// * [`ConfigError::BurstLengthNotPowerOfTwo`] if `nphases × data rate` is not a power of two.
    /// * [`ConfigError::InvalidGeometry`] if the bank/row/column widths do not fit the address bus.
    /// * [`ConfigError::InvalidPhase`] if a command or data phase is out of range.
    /// * [`ConfigError::InvalidDataWidth`] if `dfi_databits` is not in `1..=64`.
    /// * [`ConfigError::ZeroQueueDepth`] if `req_queue_size` is zero.
    /// * [`ConfigError::ZeroTiming`] if a gating timing parameter is zero.
    /// * [`ConfigError::TimingOverflow`] if a derived constant does not fit in 32 bits.
    /// * [`ConfigError::RefreshIntervalTooShort`] if refresh is enabled and tREFI cannot
    ///   hold the refresh sequence.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let phy = &config.phy;
        let geom = &config.geom;
        let t = &config.timing;
        let ctrl = &config.controller;

        if phy.nphases == 0 || phy.nphases > MAX_NPHASES {
            return Err(ConfigError::InvalidPhaseCount {
                value: phy.nphases,
                max: MAX_NPHASES,
            });
        }
        let burst_length = phy.nphases * phy.memtype.data_rate();
        if !burst_length.is_power_of_two() {
            return Err(ConfigError::BurstLengthNotPowerOfTwo(burst_length));
        }
        let address_align = burst_length.trailing_zeros();

        if geom.bankbits > MAX_BANKBITS {
            return Err(ConfigError::InvalidGeometry(format!(
                "bankbits {} exceeds {MAX_BANKBITS}",
                geom.bankbits
            )));
        }
        if geom.rowbits == 0 || geom.rowbits > 32 {
            return Err(ConfigError::InvalidGeometry(format!(
                "rowbits {} must be in 1..=32",
                geom.rowbits
            )));
        }
        if geom.colbits <= address_align || geom.colbits > 32 {
            return Err(ConfigError::InvalidGeometry(format!(
                "colbits {} must exceed the address alignment {address_align} and be at most 32",
                geom.colbits
            )));
        }
        if geom.addressbits < MIN_ADDRESSBITS {
            return Err(ConfigError::InvalidGeometry(format!(
                "addressbits {} cannot carry A10 (need at least {MIN_ADDRESSBITS})",
                geom.addressbits
            )));
        }
        if geom.rowbits > geom.addressbits || geom.colbits > geom.addressbits {
            return Err(ConfigError::InvalidGeometry(format!(
                "row ({}) and column ({}) bits must fit the {}-bit address bus",
                geom.rowbits, geom.colbits, geom.addressbits
            )));
        }

        for (name, value) in [
            ("cmd_phase", phy.cmd_phase),
            ("rdphase", phy.rdphase),
            ("wrphase", phy.wrphase),
        ] {
            if value >= phy.nphases {
                return Err(ConfigError::InvalidPhase {
                    name,
                    value,
                    nphases: phy.nphases,
                });
            }
        }
        if phy.dfi_databits == 0 || phy.dfi_databits > 64 {
            return Err(ConfigError::InvalidDataWidth(phy.dfi_databits));
        }
        if ctrl.req_queue_size == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }

        for (name, value) in [
            ("read_latency", phy.read_latency),
            ("t_rp", t.t_rp),
            ("t_rcd", t.t_rcd),
            ("t_wtr", t.t_wtr),
            ("t_rfc", t.t_rfc),
            ("t_ras", t.t_ras),
            ("t_rrd", t.t_rrd),
            ("t_ccd", t.t_ccd),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTiming(name));
            }
        }

        for (name, sum) in [
            ("read_latency + 1", phy.read_latency.checked_add(1)),
            ("write_latency + 1", phy.write_latency.checked_add(1)),
            ("write_latency + t_wtr", phy.write_latency.checked_add(t.t_wtr)),
        ] {
            if sum.is_none() {
                return Err(ConfigError::TimingOverflow(name));
            }
        }
        let write_to_precharge = phy
            .write_latency
            .checked_add(t.t_wr)
            .ok_or(ConfigError::TimingOverflow("write_latency + t_wr"))?;

        // A refresh request may wait for the slowest bank to become prechargeable,
        // then the precharge-all needs tRP before the refresh itself.
        let refresh_lead = t
            .t_rp
            .checked_add(t.t_ras.max(write_to_precharge))
            .ok_or(ConfigError::TimingOverflow("refresh lead"))?;
        if ctrl.with_refresh {
            let required = refresh_lead
                .checked_add(t.t_rfc)
                .ok_or(ConfigError::TimingOverflow("refresh lead + t_rfc"))?;
            if t.t_refi <= t.t_rfc || t.t_refi < required {
                return Err(ConfigError::RefreshIntervalTooShort {
                    t_refi: t.t_refi,
                    required,
                });
            }
        }

        let model = Self {
            memtype: phy.memtype,
            nphases: phy.nphases as usize,
            dfi_databits: phy.dfi_databits,
            burst_length,
            address_align,
            nbanks: geom.nbanks(),
            rowbits: geom.rowbits,
            colbits: geom.colbits,
            addressbits: geom.addressbits,
            cmd_phase: phy.cmd_phase as usize,
            rdphase: phy.rdphase as usize,
            wrphase: phy.wrphase as usize,
            phy_read_latency: phy.read_latency,
            phy_write_latency: phy.write_latency,
            t_rp: t.t_rp,
            t_rcd: t.t_rcd,
            t_wr: t.t_wr,
            t_wtr: t.t_wtr,
            t_refi: t.t_refi,
            t_rfc: t.t_rfc,
            t_ras: t.t_ras,
            t_rrd: t.t_rrd,
            t_ccd: t.t_ccd,
            refresh_lead,
            req_queue_size: ctrl.req_queue_size,
            read_time: ctrl.read_time,
            write_time: ctrl.write_time,
            policy: ctrl.policy,
            row_hit_bypass_limit: ctrl.row_hit_bypass_limit,
            with_refresh: ctrl.with_refresh,
            with_bandwidth: ctrl.with_bandwidth,
            bandwidth_period: ctrl.bandwidth_period.max(1),
        };
        debug!(
            memtype = %model.memtype,
            burst_length,
            address_align,
            nbanks = model.nbanks,
            refresh_lead,
            "derived timing model"
        );
        Ok(model)
    }

    /// SDRAM generation.
    pub const fn memtype(&self) -> MemoryType {
        self.memtype
    }

    /// DFI phases per controller cycle.
    pub const fn nphases(&self) -> usize {
        self.nphases
    }

    /// Data bits per DFI phase.
    pub const fn dfi_databits(&self) -> u32 {
        self.dfi_databits
    }

    /// Data beats per column command.
    pub const fn burst_length(&self) -> u32 {
        self.burst_length
    }

    /// `log2(burst_length)`.
    pub const fn address_align(&self) -> u32 {
        self.address_align
    }

    /// Number of banks (and bank machines).
    pub const fn nbanks(&self) -> usize {
        self.nbanks
    }

    /// Row address bits.
    pub const fn rowbits(&self) -> u32 {
        self.rowbits
    }

    /// Column address bits.
    pub const fn colbits(&self) -> u32 {
        self.colbits
    }

    /// DRAM address bus width.
    pub const fn addressbits(&self) -> u32 {
        self.addressbits
    }

    /// Phase carrying commands.
    pub const fn cmd_phase(&self) -> usize {
        self.cmd_phase
    }

    /// Phase carrying read enables.
    pub const fn rdphase(&self) -> usize {
        self.rdphase
    }

    /// Phase carrying write enables.
    pub const fn wrphase(&self) -> usize {
        self.wrphase
    }

    /// Width of a bank-local request address: `rowbits + colbits - address_align`.
    pub const fn address_width(&self) -> u32 {
        self.rowbits + self.colbits - self.address_align
    }

    /// Row/column splitter for bank-local request addresses.
    pub const fn slicer(&self) -> AddressSlicer {
        AddressSlicer {
            col_bits: self.colbits - self.address_align,
            row_bits: self.rowbits,
            address_align: self.address_align,
        }
    }

    /// PHY read latency (read command to data at the DFI).
    pub const fn phy_read_latency(&self) -> u32 {
        self.phy_read_latency
    }

    /// PHY write latency (write command to data at the DFI).
    pub const fn phy_write_latency(&self) -> u32 {
        self.phy_write_latency
    }

    /// Read grant to read completion: PHY read latency plus one pipeline cycle.
    pub const fn read_latency(&self) -> u32 {
        self.phy_read_latency + 1
    }

    /// Write grant to write completion: PHY write latency plus one pipeline cycle.
    pub const fn write_latency(&self) -> u32 {
        self.phy_write_latency + 1
    }

    /// Precharge period (tRP).
    pub const fn t_rp(&self) -> u32 {
        self.t_rp
    }

    /// Activate to column command (tRCD).
    pub const fn t_rcd(&self) -> u32 {
        self.t_rcd
    }

    /// Write recovery (tWR).
    pub const fn t_wr(&self) -> u32 {
        self.t_wr
    }

    /// Write to read turnaround (tWTR).
    pub const fn t_wtr(&self) -> u32 {
        self.t_wtr
    }

    /// Refresh interval (tREFI).
    pub const fn t_refi(&self) -> u32 {
        self.t_refi
    }

    /// Refresh recovery (tRFC).
    pub const fn t_rfc(&self) -> u32 {
        self.t_rfc
    }

    /// Activate to precharge (tRAS).
    pub const fn t_ras(&self) -> u32 {
        self.t_ras
    }

    /// Activate to activate across banks (tRRD).
    pub const fn t_rrd(&self) -> u32 {
        self.t_rrd
    }

    /// Column command spacing (tCCD).
    pub const fn t_ccd(&self) -> u32 {
        self.t_ccd
    }

    /// Write command to earliest precharge of the same bank.
    pub const fn write_to_precharge(&self) -> u32 {
        self.phy_write_latency + self.t_wr
    }

    /// Write command to earliest read on the bus.
    pub const fn write_to_read(&self) -> u32 {
        self.phy_write_latency + self.t_wtr
    }

    /// Cycles reserved before a refresh is due for the precharge-all sequence.
    pub const fn refresh_lead(&self) -> u32 {
        self.refresh_lead
    }

    /// Cycles from one refresh command to the next refresh request.
    ///
    /// Zero when refresh is disabled and tREFI is shorter than the lead.
    pub const fn refresh_period(&self) -> u32 {
        self.t_refi.saturating_sub(self.refresh_lead)
    }

    /// Depth of each per-bank request queue.
    pub const fn req_queue_size(&self) -> usize {
        self.req_queue_size
    }

    /// Read phase budget.
    pub const fn read_time(&self) -> u32 {
        self.read_time
    }

    /// Write phase budget.
    pub const fn write_time(&self) -> u32 {
        self.write_time
    }

    /// Arbitration policy.
    pub const fn policy(&self) -> ArbitrationPolicy {
        self.policy
    }

    /// Bypasses tolerated before a waiting bank is promoted.
    pub const fn row_hit_bypass_limit(&self) -> u32 {
        self.row_hit_bypass_limit
    }

    /// Whether periodic refresh is enabled.
    pub const fn with_refresh(&self) -> bool {
        self.with_refresh
    }

    /// Whether bandwidth counters are enabled.
    pub const fn with_bandwidth(&self) -> bool {
        self.with_bandwidth
    }

    /// Bandwidth sampling period.
    pub const fn bandwidth_period(&self) -> u64 {
        self.bandwidth_period
    }
}
