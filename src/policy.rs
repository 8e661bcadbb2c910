//! What a [`Connection`](crate::Connection) does when a read from the port fails.
//!
//! The connection asks the policy on every fault and reports back whether
//! reopening worked. Framing never sees any of this.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultAction {
    /// Close the port and try to open it again, up to `attempts` times in
    /// this poll cycle.
    Reopen { attempts: u32 },
    /// Leave the port alone this cycle.
    Wait,
}

pub trait ReconnectPolicy {
    fn on_fault(&mut self) -> FaultAction;

    fn on_reopened(&mut self) {}

    /// Every attempt granted by the last [`FaultAction::Reopen`] failed.
    fn on_reopen_failed(&mut self) {}
}

/// Close, reopen once, carry on. A failed reopen is retried on the next fault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReopenOnce;

impl ReconnectPolicy for ReopenOnce {
    fn on_fault(&mut self) -> FaultAction {
        FaultAction::Reopen { attempts: 1 }
    }
}

/// Up to `attempts` back to back reopen attempts per fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundedRetry {
    pub attempts: u32,
}

impl BoundedRetry {
    pub fn new(attempts: u32) -> BoundedRetry {
        BoundedRetry {
            attempts: attempts.max(1),
        }
    }
}

impl ReconnectPolicy for BoundedRetry {
    fn on_fault(&mut self) -> FaultAction {
        FaultAction::Reopen {
            attempts: self.attempts.max(1),
        }
    }
}

/// Exponential back-off counted in poll cycles.
///
/// After a failed reopen the next `initial_skip` faults are answered with
/// [`FaultAction::Wait`]; every further failure doubles that, capped at
/// `max_skip`. A successful reopen resets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleBackoff {
    initial_skip: u32,
    max_skip: u32,
    next_skip: u32,
    skipping: u32,
}

impl CycleBackoff {
    pub fn new(initial_skip: u32, max_skip: u32) -> CycleBackoff {
        let mut initial_skip = initial_skip.max(1);
        let mut max_skip = max_skip.max(1);
        if initial_skip > max_skip {
            core::mem::swap(&mut initial_skip, &mut max_skip);
        }
        CycleBackoff {
            initial_skip,
            max_skip,
            next_skip: initial_skip,
            skipping: 0,
        }
    }

    /// Faults still to be skipped before the next reopen attempt.
    pub fn remaining(&self) -> u32 {
        self.skipping
    }
}

impl Default for CycleBackoff {
    fn default() -> Self {
        CycleBackoff::new(1, 64)
    }
}

impl ReconnectPolicy for CycleBackoff {
    fn on_fault(&mut self) -> FaultAction {
        if self.skipping > 0 {
            self.skipping -= 1;
            FaultAction::Wait
        } else {
            FaultAction::Reopen { attempts: 1 }
        }
    }

    fn on_reopened(&mut self) {
        self.next_skip = self.initial_skip;
        self.skipping = 0;
    }

    fn on_reopen_failed(&mut self) {
        self.skipping = self.next_skip;
        self.next_skip = self.next_skip.saturating_mul(2).min(self.max_skip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_once_always_reopens() {
        let mut p = ReopenOnce;
        for _ in 0..3 {
            assert_eq!(p.on_fault(), FaultAction::Reopen { attempts: 1 });
            p.on_reopen_failed();
        }
    }

    #[test]
    fn bounded_retry_never_zero() {
        assert_eq!(BoundedRetry::new(0).attempts, 1);
        let mut p = BoundedRetry::new(3);
        assert_eq!(p.on_fault(), FaultAction::Reopen { attempts: 3 });
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut p = CycleBackoff::new(1, 4);
        let mut skips = Vec::new();
        for _ in 0..5 {
            p.on_reopen_failed();
            skips.push(p.remaining());
            while p.on_fault() == FaultAction::Wait {}
        }
        assert_eq!(skips, [1, 2, 4, 4, 4]);
    }

    #[test]
    fn backoff_resets_on_success() {
        let mut p = CycleBackoff::new(2, 16);
        p.on_reopen_failed();
        p.on_reopen_failed();
        assert_eq!(p.remaining(), 4);
        p.on_reopened();
        assert_eq!(p.remaining(), 0);
        assert_eq!(p.on_fault(), FaultAction::Reopen { attempts: 1 });
        p.on_reopen_failed();
        assert_eq!(p.remaining(), 2);
    }

    #[test]
    fn backoff_normalizes_bounds() {
        let p = CycleBackoff::new(8, 2);
        assert_eq!(p.initial_skip, 2);
        assert_eq!(p.max_skip, 8);
        let p = CycleBackoff::new(0, 0);
        assert_eq!((p.initial_skip, p.max_skip), (1, 1));
    }
}
