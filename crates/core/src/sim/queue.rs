//! Bounded per-bank request queues.
//!
//! The controller never owns its input queues; this is the caller-side FIFO set
//! used by the simulator and the tests. A full queue hands the request back.

use std::collections::VecDeque;

use crate::common::request::Request;
use crate::controller::RequestQueue;

/// One bounded FIFO per bank.
#[derive(Debug, Clone)]
pub struct BankQueues {
    queues: Vec<VecDeque<Request>>,
    capacity: usize,
}

impl BankQueues {
    /// Creates `nbanks` empty queues holding at most `capacity` requests each.
    pub fn new(nbanks: usize, capacity: usize) -> Self {
        Self {
            queues: (0..nbanks)
                .map(|_| VecDeque::with_capacity(capacity))
                .collect(),
            capacity,
        }
    }

    /// Appends `request` to its bank's queue.
    ///
    /// # Errors
    ///
    /// Returns the request unchanged if the queue is full or the bank does not exist.
    pub fn push(&mut self, request: Request) -> Result<(), Request> {
        match self.queues.get_mut(request.bank) {
            Some(queue) if queue.len() < self.capacity => {
                queue.push_back(request);
                Ok(())
            }
            _ => Err(request),
        }
    }

    /// Whether `bank` can take another request.
    pub fn has_room(&self, bank: usize) -> bool {
        self.queues
            .get(bank)
            .is_some_and(|q| q.len() < self.capacity)
    }

    /// Requests waiting for `bank`.
    pub fn pending(&self, bank: usize) -> usize {
        self.queues.get(bank).map_or(0, VecDeque::len)
    }

    /// Requests waiting across all banks.
    pub fn len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Whether every queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    /// Per-queue capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RequestQueue for BankQueues {
    fn pop_request(&mut self, bank: usize) -> Option<Request> {
        self.queues.get_mut(bank).and_then(VecDeque::pop_front)
    }
}
