//! Configuration and submission error definitions.
//!
//! Every error the controller can report is a configuration error detected once,
//! at construction time. A controller that was built successfully never fails at
//! runtime; invalid schedules are ruled out by construction instead of detected.
//! The simulator additionally refuses requests it cannot queue ([`SubmitError`]).

use thiserror::Error;

use crate::common::request::Request;

/// Reasons a configuration is rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The memory type name is not one of the supported SDRAM generations.
    #[error("unknown memory type `{0}` (expected one of SDR, DDR, LPDDR, DDR2, DDR3)")]
    UnknownMemoryType(String),

    /// `nphases × data rate` is not a power of two, so no address alignment exists.
    #[error("burst length {0} is not a power of two")]
    BurstLengthNotPowerOfTwo(u32),

    /// The refresh interval cannot fit the refresh sequence.
    #[error(
        "refresh interval {t_refi} is too short: needs at least {required} cycles (tRFC plus refresh lead)"
    )]
    RefreshIntervalTooShort {
        /// Configured refresh interval.
        t_refi: u32,
        /// Minimum interval the sequence needs.
        required: u32,
    },

    /// `nphases` is zero or larger than the supported maximum.
    #[error("nphases {value} must be between 1 and {max}")]
    InvalidPhaseCount {
        /// Configured value.
        value: u32,
        /// Largest supported phase count.
        max: u32,
    },

    /// A derived constant does not fit in 32 bits.
    #[error("{0} overflows a 32-bit cycle count")]
    TimingOverflow(&'static str),

    /// The bank/row/column widths do not partition the address space.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A command or data phase index is outside `0..nphases`.
    #[error("{name} {value} is out of range for {nphases} phases")]
    InvalidPhase {
        /// Which phase setting is wrong.
        name: &'static str,
        /// Configured value.
        value: u32,
        /// Number of DFI phases.
        nphases: u32,
    },

    /// DFI data width must be between 1 and 64 bits.
    #[error("dfi_databits {0} must be between 1 and 64")]
    InvalidDataWidth(u32),

    /// The per-bank request queue must hold at least one request.
    #[error("req_queue_size must be at least 1")]
    ZeroQueueDepth,

    /// A timing parameter that gates a command transition is zero.
    #[error("timing parameter {0} must be at least one cycle")]
    ZeroTiming(&'static str),

    /// The configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons [`Simulator::submit`](crate::sim::Simulator::submit) refuses a request.
///
/// Every variant hands the request back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The bank's queue is full.
    #[error("bank queue full for {0}")]
    QueueFull(Request),

    /// Bank, row or column lies outside the configured geometry.
    #[error("{0} is outside the bank geometry")]
    OutOfRange(Request),

    /// A request with the same tag has not completed yet.
    #[error("tag {} is already in flight", .0.tag)]
    DuplicateTag(Request),
}

impl SubmitError {
    /// The refused request.
    pub const fn request(&self) -> &Request {
        match self {
            Self::QueueFull(request) | Self::OutOfRange(request) | Self::DuplicateTag(request) => {
                request
            }
        }
    }

    /// Takes the refused request back.
    pub fn into_request(self) -> Request {
        match self {
            Self::QueueFull(request) | Self::OutOfRange(request) | Self::DuplicateTag(request) => {
                request
            }
        }
    }
}
