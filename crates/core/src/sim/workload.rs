//! Synthetic traffic generator.
//!
//! Produces a deterministic request stream from a seed. The generator uses a
//! xorshift PRNG, so runs are reproducible without pulling in an RNG crate.

use std::fmt;
use std::str::FromStr;

use crate::common::request::{Payload, Request, RequestTag};
use crate::timing::TimingModel;

/// Shape of the generated address stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pattern {
    /// Consecutive bursts, interleaved across banks; mostly row hits.
    #[default]
    Sequential,
    /// Uniformly random bank, row and column.
    Random,
    /// Alternates between two rows of each bank; every access is a row conflict.
    Thrash,
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(Self::Sequential),
            "random" | "rand" => Ok(Self::Random),
            "thrash" => Ok(Self::Thrash),
            other => Err(format!("unknown pattern '{other}'")),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequential => "sequential",
            Self::Random => "random",
            Self::Thrash => "thrash",
        })
    }
}

/// Deterministic request generator.
#[derive(Debug, Clone)]
pub struct Workload {
    pattern: Pattern,
    state: u64,
    nbanks: usize,
    rows: u64,
    columns: u64,
    nphases: usize,
    data_mask: u64,
    issued: u64,
    write_percent: u64,
}

impl Workload {
    /// Creates a generator for the geometry of `timing`.
    ///
    /// `write_percent` is the share of writes in the stream, clamped to 100.
    pub fn new(pattern: Pattern, seed: u64, write_percent: u8, timing: &TimingModel) -> Self {
        let slicer = timing.slicer();
        let col_bits = slicer.address_width() - timing.rowbits();
        let bits = timing.dfi_databits();
        Self {
            pattern,
            // xorshift has an all-zero fixed point.
            state: if seed == 0 { 0x2545_f491_4f6c_dd1d } else { seed },
            nbanks: timing.nbanks(),
            rows: 1 << timing.rowbits(),
            columns: 1 << col_bits,
            nphases: timing.nphases(),
            data_mask: if bits >= 64 { u64::MAX } else { (1 << bits) - 1 },
            issued: 0,
            write_percent: u64::from(write_percent.min(100)),
        }
    }

    fn next_random(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Number of requests generated so far.
    pub const fn issued(&self) -> u64 {
        self.issued
    }

    /// Generates the next request.
    pub fn next_request(&mut self) -> Request {
        let n = self.issued;
        let nbanks = self.nbanks as u64;
        let (bank, row, column) = match self.pattern {
            Pattern::Sequential => {
                let burst = n / nbanks;
                (n % nbanks, (burst / self.columns) % self.rows, burst % self.columns)
            }
            Pattern::Random => (
                self.next_random() % nbanks,
                self.next_random() % self.rows,
                self.next_random() % self.columns,
            ),
            Pattern::Thrash => {
                let visit = n / nbanks;
                (n % nbanks, (visit % 2) * (self.rows / 2), visit % self.columns)
            }
        };
        let tag = RequestTag(n);
        self.issued += 1;

        let is_write = self.next_random() % 100 < self.write_percent;
        if is_write {
            let word = self.next_random() & self.data_mask;
            Request::write(
                bank as usize,
                row as u32,
                column as u32,
                Payload::splat(word, self.nphases),
                tag,
            )
        } else {
            Request::read(bank as usize, row as u32, column as u32, tag)
        }
    }
}
