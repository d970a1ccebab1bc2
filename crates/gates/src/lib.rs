//! Shared synchronization gates for batch tracking and busy/idle state.
//!
//! Two small primitives cross thread boundaries in this system: a counting
//! gate that reports when every task in a batch has finished, and a
//! busy/idle gate with a bounded blocking wait. They are deliberately
//! separate types; the scheduler wires them together at exactly one point.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Busy/idle gate with a bounded blocking wait.
///
/// `trigger()` opens the gate (idle), `reset()` closes it (busy). A waiter
/// that finds the gate already open returns immediately; otherwise it
/// blocks without spinning until the gate opens or the timeout lapses.
/// All operations are safe from any thread.
#[derive(Debug)]
pub struct ProcessingGate {
    idle: Mutex<bool>,
    cond: Condvar,
}

impl ProcessingGate {
    /// Create a gate in the idle (open) state.
    pub fn new() -> Self {
        Self {
            idle: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    /// Open the gate: processing finished, waiters wake.
    pub fn trigger(&self) {
        let mut idle = self.idle.lock().unwrap();
        if !*idle {
            *idle = true;
            tracing::trace!("processing gate opened");
            self.cond.notify_all();
        }
    }

    /// Close the gate: processing started.
    pub fn reset(&self) {
        let mut idle = self.idle.lock().unwrap();
        if *idle {
            *idle = false;
            tracing::trace!("processing gate closed");
        }
    }

    /// Whether the gate is currently open.
    pub fn is_idle(&self) -> bool {
        *self.idle.lock().unwrap()
    }

    /// Block until the gate is idle.
    ///
    /// Returns `true` when idle was reached within `timeout` (immediately
    /// when already idle), `false` when the timeout lapsed first.
    pub fn wait(&self, timeout: Duration) -> bool {
        let idle = self.idle.lock().unwrap();
        if *idle {
            return true;
        }
        let (idle, _) = self
            .cond
            .wait_timeout_while(idle, timeout, |idle| !*idle)
            .unwrap();
        *idle
    }
}

impl Default for ProcessingGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Counting gate tracking a batch of concurrent tasks.
///
/// `begin` fixes the batch size before any task launches; each task calls
/// `complete_one` exactly once, success or failure alike. The gate is
/// satisfied once every launched task has reported and stays satisfied
/// until the next `begin`. `completed` never exceeds `total`.
#[derive(Debug, Default)]
pub struct CompletionGate {
    counts: Mutex<Counts>,
    cond: Condvar,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    total: usize,
    completed: usize,
}

impl CompletionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new batch of `total` tasks, resetting prior counts.
    ///
    /// Must not race an in-flight `complete_one` of the same batch; the
    /// scheduler calls this before launching anything.
    pub fn begin(&self, total: usize) {
        let mut counts = self.counts.lock().unwrap();
        counts.total = total;
        counts.completed = 0;
        if total == 0 {
            self.cond.notify_all();
        }
    }

    /// Record one finished task.
    ///
    /// Returns `true` when this call brought the batch to satisfaction,
    /// so the last task can chain a notification without re-locking.
    pub fn complete_one(&self) -> bool {
        let mut counts = self.counts.lock().unwrap();
        if counts.completed >= counts.total {
            tracing::warn!(
                total = counts.total,
                "completion reported past batch size"
            );
            return true;
        }
        counts.completed += 1;
        let satisfied = counts.completed >= counts.total;
        if satisfied {
            self.cond.notify_all();
        }
        satisfied
    }

    /// Whether every task in the current batch has reported.
    pub fn is_satisfied(&self) -> bool {
        let counts = self.counts.lock().unwrap();
        counts.completed >= counts.total
    }

    /// Current `(completed, total)` pair.
    pub fn counts(&self) -> (usize, usize) {
        let counts = self.counts.lock().unwrap();
        (counts.completed, counts.total)
    }

    /// Block until the batch is satisfied or `timeout` lapses.
    pub fn wait(&self, timeout: Duration) -> bool {
        let counts = self.counts.lock().unwrap();
        let (counts, _) = self
            .cond
            .wait_timeout_while(counts, timeout, |c| c.completed < c.total)
            .unwrap();
        counts.completed >= counts.total
    }
}
