//! Fixed-latency data path.
//!
//! Column grants are recorded here so that data crossing the DFI several cycles
//! later is attributed to the right request:
//! 1. **Writes:** the payload is driven on the write phases `write_latency` cycles after the grant.
//! 2. **Reads:** PHY read data arriving `read_latency` cycles after the grant is captured.
//!
//! Both are registered once more before the completion is raised, so completions
//! appear exactly PHY latency plus one cycle after the grant.

use std::collections::VecDeque;

use tracing::warn;

use crate::common::command::{Completion, DfiFrame};
use crate::common::request::{Opcode, Payload, RequestTag};

#[derive(Debug, Clone)]
struct InFlight {
    due: u64,
    tag: RequestTag,
    bank: usize,
    granted_at: u64,
    payload: Option<Payload>,
}

/// Delay lines for read and write data attribution.
#[derive(Debug, Clone)]
pub struct DataPath {
    read_latency: u64,
    write_latency: u64,
    nphases: usize,
    reads: VecDeque<InFlight>,
    writes: VecDeque<InFlight>,
    registered: Vec<Completion>,
}

impl DataPath {
    /// Creates an empty data path for the given PHY latencies.
    pub const fn new(read_latency: u32, write_latency: u32, nphases: usize) -> Self {
        Self {
            read_latency: read_latency as u64,
            write_latency: write_latency as u64,
            nphases,
            reads: VecDeque::new(),
            writes: VecDeque::new(),
            registered: Vec::new(),
        }
    }

    /// Whether no grant is still waiting for its data or completion.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty() && self.registered.is_empty()
    }

    /// Records a column grant made on `cycle`.
    pub fn record(
        &mut self,
        opcode: Opcode,
        tag: RequestTag,
        bank: usize,
        payload: Option<Payload>,
        cycle: u64,
    ) {
        match opcode {
            Opcode::Read => self.reads.push_back(InFlight {
                due: cycle + self.read_latency,
                tag,
                bank,
                granted_at: cycle,
                payload: None,
            }),
            Opcode::Write => self.writes.push_back(InFlight {
                due: cycle + self.write_latency,
                tag,
                bank,
                granted_at: cycle,
                payload: Some(payload.unwrap_or_else(|| Payload::zeroed(self.nphases))),
            }),
        }
    }

    /// Advances one cycle.
    ///
    /// Drives write data due on `cycle` into `frame`, captures `rddata` for the
    /// read due on `cycle`, and returns the completions registered on the previous cycle.
    pub fn advance(
        &mut self,
        cycle: u64,
        rddata: Option<Payload>,
        frame: &mut DfiFrame,
    ) -> Vec<Completion> {
        let completed = std::mem::take(&mut self.registered);

        if self.writes.front().is_some_and(|w| w.due <= cycle) {
            if let Some(write) = self.writes.pop_front() {
                let payload = write.payload.unwrap_or_default();
                for (phase, slot) in frame.phases.iter_mut().enumerate() {
                    slot.wrdata = Some(payload.word(phase));
                }
                self.registered.push(Completion::Write {
                    tag: write.tag,
                    bank: write.bank,
                    granted_at: write.granted_at,
                });
            }
        }

        if self.reads.front().is_some_and(|r| r.due <= cycle) {
            if let Some(read) = self.reads.pop_front() {
                let data = rddata.unwrap_or_else(|| {
                    warn!(cycle, tag = %read.tag, "PHY returned no read data, completing with zeros");
                    Payload::zeroed(self.nphases)
                });
                self.registered.push(Completion::Read {
                    tag: read.tag,
                    bank: read.bank,
                    data,
                    granted_at: read.granted_at,
                });
            }
        } else if rddata.is_some() {
            warn!(cycle, "unexpected PHY read data dropped");
        }

        completed
    }
}
