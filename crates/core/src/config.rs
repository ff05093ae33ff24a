//! Configuration system for the DRAM controller.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the controller. It provides:
//! 1. **Defaults:** Baseline PHY, geometry, timing and controller constants.
//! 2. **Structures:** Hierarchical config for PHY, geometry, timing and controller settings.
//! 3. **Enums:** Memory type and arbitration policy.
//!
//! Configuration is supplied as JSON (see [`Config::from_json`]) or built from
//! `Config::default()`. It is validated once, when a [`TimingModel`](crate::timing::TimingModel)
//! is derived from it, and is immutable afterwards.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::common::error::ConfigError;

/// Default configuration constants for the controller.
///
/// These values describe a small DDR part behind a 2-phase PHY at 100 MHz
/// when not explicitly overridden.
mod defaults {
    /// Number of DFI phases per controller cycle.
    pub const NPHASES: u32 = 2;

    /// Width of one DFI phase data slot in bits.
    pub const DFI_DATABITS: u32 = 32;

    /// PHY read latency (read command to read data valid), in controller cycles.
    pub const READ_LATENCY: u32 = 4;

    /// PHY write latency (write command to write data driven), in controller cycles.
    pub const WRITE_LATENCY: u32 = 1;

    /// Phase that carries the command.
    pub const CMD_PHASE: u32 = 0;

    /// Phase that carries read enables.
    pub const RDPHASE: u32 = 0;

    /// Phase that carries write enables.
    pub const WRPHASE: u32 = 1;

    /// Bank address bits (4 banks).
    pub const BANKBITS: u32 = 2;

    /// Row address bits.
    pub const ROWBITS: u32 = 13;

    /// Column address bits.
    pub const COLBITS: u32 = 10;

    /// DRAM address bus width.
    pub const ADDRESSBITS: u32 = 13;

    /// Precharge period (tRP).
    pub const T_RP: u32 = 2;

    /// Activate to column command delay (tRCD).
    pub const T_RCD: u32 = 2;

    /// Write recovery time (tWR), counted after write data.
    pub const T_WR: u32 = 2;

    /// Write to read turnaround (tWTR), counted after write data.
    pub const T_WTR: u32 = 2;

    /// Refresh interval (tREFI): 7.8 us at 100 MHz.
    pub const T_REFI: u32 = 782;

    /// Refresh cycle time (tRFC).
    pub const T_RFC: u32 = 11;

    /// Minimum activate to precharge interval (tRAS).
    pub const T_RAS: u32 = 4;

    /// Minimum activate to activate spacing across banks (tRRD).
    pub const T_RRD: u32 = 2;

    /// Column command spacing (tCCD).
    pub const T_CCD: u32 = 1;

    /// Depth of each per-bank request queue.
    pub const REQ_QUEUE_SIZE: usize = 8;

    /// Read phase budget in cycles.
    pub const READ_TIME: u32 = 32;

    /// Write phase budget in cycles.
    pub const WRITE_TIME: u32 = 16;

    /// Times an eligible bank may be bypassed by row hits before it is promoted.
    pub const ROW_HIT_BYPASS_LIMIT: u32 = 8;

    /// Bandwidth sampling period in cycles.
    pub const BANDWIDTH_PERIOD: u64 = 1 << 24;
}

/// SDRAM generation behind the PHY.
///
/// Selects the data rate used to derive the burst length from the number of phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum MemoryType {
    /// Single data rate SDRAM.
    Sdr,
    /// DDR SDRAM.
    #[default]
    Ddr,
    /// Low-power DDR.
    Lpddr,
    /// DDR2 SDRAM.
    Ddr2,
    /// DDR3 SDRAM.
    Ddr3,
}

impl MemoryType {
    /// Data beats per clock per phase (1 for SDR, 2 for the DDR family).
    pub const fn data_rate(self) -> u32 {
        match self {
            Self::Sdr => 1,
            Self::Ddr | Self::Lpddr | Self::Ddr2 | Self::Ddr3 => 2,
        }
    }
}

impl FromStr for MemoryType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SDR" => Ok(Self::Sdr),
            "DDR" => Ok(Self::Ddr),
            "LPDDR" => Ok(Self::Lpddr),
            "DDR2" => Ok(Self::Ddr2),
            "DDR3" => Ok(Self::Ddr3),
            _ => Err(ConfigError::UnknownMemoryType(s.to_string())),
        }
    }
}

impl TryFrom<String> for MemoryType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sdr => "SDR",
            Self::Ddr => "DDR",
            Self::Lpddr => "LPDDR",
            Self::Ddr2 => "DDR2",
            Self::Ddr3 => "DDR3",
        })
    }
}

/// Arbitration strategy used by the multiplexer among eligible bank machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ArbitrationPolicy {
    /// Plain round-robin over all banks with a legal command.
    #[default]
    RoundRobin,
    /// Column commands (row hits) ahead of activates/precharges, round-robin within each class.
    ///
    /// A bank bypassed `row_hit_bypass_limit` times while eligible is served first.
    #[serde(alias = "RowHit")]
    RowHitFirst,
    /// Alternating read and write phases bounded by `read_time` / `write_time`.
    #[serde(alias = "Budget")]
    ReadWriteBudget,
}

/// Root configuration structure containing all controller settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use dramctl_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.geom.bankbits, 2);
/// assert!(config.controller.with_refresh);
/// ```
///
/// Deserializing from JSON:
///
/// ```
/// use dramctl_core::config::{ArbitrationPolicy, Config, MemoryType};
///
/// let json = r#"{
///     "phy": { "memtype": "DDR2", "nphases": 2, "read_latency": 5 },
///     "timing": { "t_refi": 64, "t_rfc": 8 },
///     "controller": { "policy": "RowHitFirst", "with_bandwidth": true }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.phy.memtype, MemoryType::Ddr2);
/// assert_eq!(config.timing.t_refi, 64);
/// assert_eq!(config.controller.policy, ArbitrationPolicy::RowHitFirst);
/// assert_eq!(config.geom.rowbits, 13);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// PHY characteristics
    #[serde(default)]
    pub phy: PhySettings,
    /// Bank/row/column geometry
    #[serde(default)]
    pub geom: GeomSettings,
    /// DRAM timing parameters
    #[serde(default)]
    pub timing: TimingSettings,
    /// Controller options
    #[serde(default)]
    pub controller: ControllerSettings,
}

impl Config {
    /// Parses a configuration from JSON text.
    ///
    /// Missing sections and fields take their defaults. The result is not yet validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the text is malformed, and
    /// [`ConfigError::UnknownMemoryType`] (wrapped by serde) for an unknown `memtype`.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or any error of
    /// [`Config::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks every cross-field constraint.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; see [`TimingModel::new`](crate::timing::TimingModel::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::timing::TimingModel::new(self).map(|_| ())
    }
}

/// PHY characteristics seen by the controller.
#[derive(Debug, Clone, Deserialize)]
pub struct PhySettings {
    /// SDRAM generation
    #[serde(default)]
    pub memtype: MemoryType,

    /// DFI phases per controller cycle
    #[serde(default = "PhySettings::default_nphases")]
    pub nphases: u32,

    /// Data bits per DFI phase
    #[serde(default = "PhySettings::default_dfi_databits")]
    pub dfi_databits: u32,

    /// Read command to read data valid at the DFI, in cycles
    #[serde(default = "PhySettings::default_read_latency")]
    pub read_latency: u32,

    /// Write command to write data at the DFI, in cycles
    #[serde(default = "PhySettings::default_write_latency")]
    pub write_latency: u32,

    /// Phase that carries commands
    #[serde(default = "PhySettings::default_cmd_phase")]
    pub cmd_phase: u32,

    /// Phase that carries read enables
    #[serde(default = "PhySettings::default_rdphase")]
    pub rdphase: u32,

    /// Phase that carries write enables
    #[serde(default = "PhySettings::default_wrphase")]
    pub wrphase: u32,
}

impl PhySettings {
    fn default_nphases() -> u32 {
        defaults::NPHASES
    }

    fn default_dfi_databits() -> u32 {
        defaults::DFI_DATABITS
    }

    fn default_read_latency() -> u32 {
        defaults::READ_LATENCY
    }

    fn default_write_latency() -> u32 {
        defaults::WRITE_LATENCY
    }

    fn default_cmd_phase() -> u32 {
        defaults::CMD_PHASE
    }

    fn default_rdphase() -> u32 {
        defaults::RDPHASE
    }

    fn default_wrphase() -> u32 {
        defaults::WRPHASE
    }
}

impl Default for PhySettings {
    fn default() -> Self {
        Self {
            memtype: MemoryType::default(),
            nphases: defaults::NPHASES,
            dfi_databits: defaults::DFI_DATABITS,
            read_latency: defaults::READ_LATENCY,
            write_latency: defaults::WRITE_LATENCY,
            cmd_phase: defaults::CMD_PHASE,
            rdphase: defaults::RDPHASE,
            wrphase: defaults::WRPHASE,
        }
    }
}

/// Address geometry of the device.
#[derive(Debug, Clone, Deserialize)]
pub struct GeomSettings {
    /// Bank address bits (`2^bankbits` bank machines)
    #[serde(default = "GeomSettings::default_bankbits")]
    pub bankbits: u32,

    /// Row address bits
    #[serde(default = "GeomSettings::default_rowbits")]
    pub rowbits: u32,

    /// Column address bits
    #[serde(default = "GeomSettings::default_colbits")]
    pub colbits: u32,

    /// DRAM address bus width
    #[serde(default = "GeomSettings::default_addressbits")]
    pub addressbits: u32,
}

impl GeomSettings {
    fn default_bankbits() -> u32 {
        defaults::BANKBITS
    }

    fn default_rowbits() -> u32 {
        defaults::ROWBITS
    }

    fn default_colbits() -> u32 {
        defaults::COLBITS
    }

    fn default_addressbits() -> u32 {
        defaults::ADDRESSBITS
    }

    /// Number of banks.
    pub const fn nbanks(&self) -> usize {
        1 << self.bankbits
    }
}

impl Default for GeomSettings {
    fn default() -> Self {
        Self {
            bankbits: defaults::BANKBITS,
            rowbits: defaults::ROWBITS,
            colbits: defaults::COLBITS,
            addressbits: defaults::ADDRESSBITS,
        }
    }
}

/// DRAM timing parameters, all in controller clock cycles.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingSettings {
    /// Precharge period
    #[serde(default = "TimingSettings::default_t_rp")]
    pub t_rp: u32,

    /// Activate to column command delay
    #[serde(default = "TimingSettings::default_t_rcd")]
    pub t_rcd: u32,

    /// Write recovery, counted after write data
    #[serde(default = "TimingSettings::default_t_wr")]
    pub t_wr: u32,

    /// Write to read turnaround, counted after write data
    #[serde(default = "TimingSettings::default_t_wtr")]
    pub t_wtr: u32,

    /// Refresh interval
    #[serde(default = "TimingSettings::default_t_refi")]
    pub t_refi: u32,

    /// Refresh recovery
    #[serde(default = "TimingSettings::default_t_rfc")]
    pub t_rfc: u32,

    /// Minimum activate to precharge interval within a bank
    #[serde(default = "TimingSettings::default_t_ras")]
    pub t_ras: u32,

    /// Minimum activate to activate spacing across banks
    #[serde(default = "TimingSettings::default_t_rrd")]
    pub t_rrd: u32,

    /// Column command spacing
    #[serde(default = "TimingSettings::default_t_ccd")]
    pub t_ccd: u32,
}

impl TimingSettings {
    fn default_t_rp() -> u32 {
        defaults::T_RP
    }

    fn default_t_rcd() -> u32 {
        defaults::T_RCD
    }

    fn default_t_wr() -> u32 {
        defaults::T_WR
    }

    fn default_t_wtr() -> u32 {
        defaults::T_WTR
    }

    fn default_t_refi() -> u32 {
        defaults::T_REFI
    }

    fn default_t_rfc() -> u32 {
        defaults::T_RFC
    }

    fn default_t_ras() -> u32 {
        defaults::T_RAS
    }

    fn default_t_rrd() -> u32 {
        defaults::T_RRD
    }

    fn default_t_ccd() -> u32 {
        defaults::T_CCD
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            t_rp: defaults::T_RP,
            t_rcd: defaults::T_RCD,
            t_wr: defaults::T_WR,
            t_wtr: defaults::T_WTR,
            t_refi: defaults::T_REFI,
            t_rfc: defaults::T_RFC,
            t_ras: defaults::T_RAS,
            t_rrd: defaults::T_RRD,
            t_ccd: defaults::T_CCD,
        }
    }
}

/// Controller options, applied at construction only.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerSettings {
    /// Depth of each per-bank request queue
    #[serde(default = "ControllerSettings::default_req_queue_size")]
    pub req_queue_size: usize,

    /// Read phase budget while writes wait (ReadWriteBudget policy)
    #[serde(default = "ControllerSettings::default_read_time")]
    pub read_time: u32,

    /// Write phase budget while reads wait (ReadWriteBudget policy)
    #[serde(default = "ControllerSettings::default_write_time")]
    pub write_time: u32,

    /// Enable read/write/command bandwidth counters
    #[serde(default)]
    pub with_bandwidth: bool,

    /// Enable periodic refresh
    #[serde(default = "ControllerSettings::default_with_refresh")]
    pub with_refresh: bool,

    /// Arbitration strategy among bank machines
    #[serde(default)]
    pub policy: ArbitrationPolicy,

    /// Bypasses tolerated before a waiting bank is promoted (RowHitFirst policy)
    #[serde(default = "ControllerSettings::default_row_hit_bypass_limit")]
    pub row_hit_bypass_limit: u32,

    /// Bandwidth sampling period in cycles
    #[serde(default = "ControllerSettings::default_bandwidth_period")]
    pub bandwidth_period: u64,
}

impl ControllerSettings {
    fn default_req_queue_size() -> usize {
        defaults::REQ_QUEUE_SIZE
    }

    fn default_read_time() -> u32 {
        defaults::READ_TIME
    }

    fn default_write_time() -> u32 {
        defaults::WRITE_TIME
    }

    fn default_with_refresh() -> bool {
        true
    }

    fn default_row_hit_bypass_limit() -> u32 {
        defaults::ROW_HIT_BYPASS_LIMIT
    }

    fn default_bandwidth_period() -> u64 {
        defaults::BANDWIDTH_PERIOD
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            req_queue_size: defaults::REQ_QUEUE_SIZE,
            read_time: defaults::READ_TIME,
            write_time: defaults::WRITE_TIME,
            with_bandwidth: false,
            with_refresh: true,
            policy: ArbitrationPolicy::default(),
            row_hit_bypass_limit: defaults::ROW_HIT_BYPASS_LIMIT,
            bandwidth_period: defaults::BANDWIDTH_PERIOD,
        }
    }
}
