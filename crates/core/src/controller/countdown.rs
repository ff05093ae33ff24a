//! Cycle countdown used for every timing constraint.
//!
//! A [`Countdown`] armed with `d` on cycle `t` reports [`Countdown::ready`] again on
//! cycle `t + d` and not before. Arming and decrementing both happen in the
//! registered update at the end of a cycle, so a command and the constraint it
//! starts are always decided in the same cycle.

/// A monotonic down-counter gating one timing constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    /// Creates a countdown that is already ready.
    pub const fn new() -> Self {
        Self { remaining: 0 }
    }

    /// Creates a countdown that becomes ready `cycles` cycles from now.
    pub const fn armed(cycles: u32) -> Self {
        Self { remaining: cycles }
    }

    /// Whether the gated command is legal this cycle.
    #[inline]
    pub const fn ready(&self) -> bool {
        self.remaining == 0
    }

    /// Cycles left before the constraint is satisfied.
    #[inline]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// End-of-cycle update: optionally re-arm with `trigger` cycles, then count one cycle.
    ///
    /// A trigger on cycle `t` makes the countdown ready on cycle `t + trigger`
    /// (on the next cycle for a trigger of zero or one).
    #[inline]
    pub const fn step(&mut self, trigger: Option<u32>) {
        if let Some(cycles) = trigger {
            self.remaining = cycles;
        }
        self.remaining = self.remaining.saturating_sub(1);
    }
}
