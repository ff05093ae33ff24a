//! Memory Request Types.
//!
//! This module defines the requests the controller consumes from the per-bank queues:
//! 1. **Opcode:** Direction of the access (read or write).
//! 2. **Payload:** One burst of data, split into one word per DFI phase.
//! 3. **Request:** A bank-addressed access, immutable once issued.

use std::fmt;

/// Direction of a memory access.
///
/// Selects the column command issued once the target row is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Column read; data returns after the PHY read latency.
    Read,

    /// Column write; data is driven after the PHY write latency.
    Write,
}

impl Opcode {
    /// Returns `true` for [`Opcode::Read`].
    #[inline]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }

    /// Returns `true` for [`Opcode::Write`].
    #[inline]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

/// Caller-assigned identifier carried from request to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestTag(pub u64);

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One burst of data.
///
/// Holds one word per DFI phase; each word carries `dfi_databits` significant bits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Payload(pub Vec<u64>);

impl Payload {
    /// Creates an all-zero payload with `nphases` words.
    pub fn zeroed(nphases: usize) -> Self {
        Self(vec![0; nphases])
    }

    /// Creates a payload by repeating `word` across `nphases` phases.
    pub fn splat(word: u64, nphases: usize) -> Self {
        Self(vec![word; nphases])
    }

    /// Returns the word carried on `phase`, or zero if the payload is shorter.
    #[inline]
    pub fn word(&self, phase: usize) -> u64 {
        self.0.get(phase).copied().unwrap_or(0)
    }

    /// Number of per-phase words.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the payload carries no words.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A bank-addressed read or write request.
///
/// Produced by the external queueing side and consumed exactly once by the
/// bank machine that owns `bank`. `column` is the burst index within the row;
/// the DRAM column address is `column << address_align`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Target bank index.
    pub bank: usize,
    /// Target row within the bank.
    pub row: u32,
    /// Burst-granular column index within the row.
    pub column: u32,
    /// Access direction.
    pub opcode: Opcode,
    /// Write data; ignored for reads.
    pub payload: Option<Payload>,
    /// Identifier echoed back on completion.
    pub tag: RequestTag,
}

impl Request {
    /// Creates a read request.
    pub const fn read(bank: usize, row: u32, column: u32, tag: RequestTag) -> Self {
        Self {
            bank,
            row,
            column,
            opcode: Opcode::Read,
            payload: None,
            tag,
        }
    }

    /// Creates a write request carrying `payload`.
    pub fn write(bank: usize, row: u32, column: u32, payload: Payload, tag: RequestTag) -> Self {
        Self {
            bank,
            row,
            column,
            opcode: Opcode::Write,
            payload: Some(payload),
            tag,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.opcode {
            Opcode::Read => "RD",
            Opcode::Write => "WR",
        };
        write!(
            f,
            "{op} {} bank={} row={:#x} col={:#x}",
            self.tag, self.bank, self.row, self.column
        )
    }
}
