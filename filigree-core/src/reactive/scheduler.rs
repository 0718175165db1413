//! Update Scheduler
//!
//! The scheduler decides when dirty effects run and in which order.
//!
//! # Algorithm
//!
//! 1. A signal write marks each subscriber pending. Pending effects live in
//!    an ordered set keyed by `EffectId`, so an effect marked by several
//!    writes is queued once and effects run in creation order.
//! 2. Outside a batch, and when no effect is running, the write flushes
//!    immediately. Inside `batch`, flushing waits for the outermost batch
//!    to end. Writes made while a flush is in progress join that flush.
//! 3. Effects created while another effect runs are deferred: their first
//!    run happens right after the running effect completes.
//!
//! The scheduler itself only holds queue state; the runtime drives it.

use std::collections::{BTreeSet, VecDeque};

use super::id::EffectId;

/// Queue state for pending and deferred effects.
#[derive(Debug, Default)]
pub(crate) struct UpdateScheduler {
    /// Effects whose dependencies changed, in creation order.
    pending: BTreeSet<EffectId>,

    /// First runs of effects created while another effect was running.
    deferred: VecDeque<EffectId>,

    /// Nesting depth of `batch` calls.
    batch_depth: usize,

    /// Whether a flush loop is currently draining `pending`.
    flushing: bool,

    /// Number of effect computations currently on the stack.
    running: usize,
}

impl UpdateScheduler {
    /// Mark an effect as needing to re-run.
    pub fn enqueue(&mut self, effect: EffectId) {
        self.pending.insert(effect);
    }

    /// Queue the first run of a nested effect.
    pub fn defer(&mut self, effect: EffectId) {
        self.deferred.push_back(effect);
    }

    /// Take the oldest pending effect.
    pub fn pop_pending(&mut self) -> Option<EffectId> {
        self.pending.pop_first()
    }

    /// Take the next deferred first run.
    pub fn pop_deferred(&mut self) -> Option<EffectId> {
        self.deferred.pop_front()
    }

    /// Drop everything queued. Used to break runaway flushes.
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Try to become the active flush. Returns false if a flush cannot start
    /// now: one is already running, a batch is open, or an effect is on the
    /// stack.
    pub fn begin_flush(&mut self) -> bool {
        if self.flushing || self.batch_depth > 0 || self.running > 0 {
            return false;
        }
        self.flushing = true;
        true
    }

    pub fn end_flush(&mut self) {
        self.flushing = false;
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    pub fn enter_run(&mut self) {
        self.running += 1;
    }

    pub fn exit_run(&mut self) {
        self.running = self.running.saturating_sub(1);
    }

    /// Number of effect computations currently on the stack.
    pub fn running(&self) -> usize {
        self.running
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
