//! Cooperative "schedule after delay" primitive.
//!
//! Components never hold callbacks into their own state. They register a
//! [`Wakeup`] value and the host routes it back when it falls due, all on the
//! same logical thread.
//!
//! # Invariants
//! - The queue clock never moves backwards
//! - Entries fire in deadline order, FIFO among equal deadlines
//! - A cancelled entry never fires

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::ts_after;

/// Handle to a registered timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// What a due timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wakeup {
    /// Heart-rate decay cadence.
    MonitorTick,
    /// Breathing auto-advance for the session with this generation.
    BreathingDue { generation: u64 },
}

/// Host-supplied scheduling primitive.
pub trait Scheduler {
    /// Current instant in microseconds.
    fn now_us(&self) -> i64;

    /// Fire `wakeup` once, no sooner than `delay_us` from now.
    fn after(&mut self, delay_us: u64, wakeup: Wakeup) -> TimerId;

    /// Fire `wakeup` every `period_us` until cancelled.
    fn every(&mut self, period_us: u64, wakeup: Wakeup) -> TimerId;

    /// Cancel a pending timer. Returns false if it already fired or was unknown.
    fn cancel(&mut self, id: TimerId) -> bool;
}

#[derive(Debug, Clone)]
struct Entry {
    wakeup: Wakeup,
    period_us: Option<u64>,
}

/// Deterministic timer queue with a virtual clock.
///
/// Real-time hosts sleep until [`TimerQueue::next_deadline`] and then call
/// [`TimerQueue::pop_due`] with the wall clock; tests drive it directly.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now_us: i64,
    next_id: u64,
    heap: BinaryHeap<Reverse<(i64, TimerId)>>,
    entries: HashMap<TimerId, Entry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue whose clock starts at `start_us`.
    pub fn starting_at(start_us: i64) -> Self {
        Self {
            now_us: start_us,
            ..Self::default()
        }
    }

    /// Number of live (not cancelled, not fired) timers.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Earliest live deadline, dropping cancelled heads on the way.
    pub fn next_deadline(&mut self) -> Option<i64> {
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            if self.entries.contains_key(&id) {
                return Some(deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Pop the next timer due at or before `until_us`.
    ///
    /// The clock moves to the popped deadline. Repeating timers are re-armed
    /// one period after their deadline under the same id.
    pub fn pop_due(&mut self, until_us: i64) -> Option<(TimerId, Wakeup)> {
        loop {
            let Reverse((deadline, id)) = self.heap.peek().copied()?;
            if deadline > until_us {
                return None;
            }
            self.heap.pop();
            let Some(entry) = self.entries.get(&id).cloned() else {
                continue;
            };
            self.now_us = self.now_us.max(deadline);
            match entry.period_us {
                Some(period) => {
                    let next = ts_after(deadline, period.max(1));
                    self.heap.push(Reverse((next, id)));
                }
                None => {
                    self.entries.remove(&id);
                }
            }
            log::trace!("timer {:?} due at {}us: {:?}", id, deadline, entry.wakeup);
            return Some((id, entry.wakeup));
        }
    }

    /// Move the clock forward to `until_us` without firing anything.
    pub fn advance_to(&mut self, until_us: i64) {
        if until_us < self.now_us {
            log::debug!(
                "ignoring clock regression: until={} < now={}",
                until_us,
                self.now_us
            );
            return;
        }
        self.now_us = until_us;
    }

    fn insert(&mut self, deadline: i64, wakeup: Wakeup, period_us: Option<u64>) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.entries.insert(id, Entry { wakeup, period_us });
        self.heap.push(Reverse((deadline, id)));
        id
    }
}

impl Scheduler for TimerQueue {
    fn now_us(&self) -> i64 {
        self.now_us
    }

    fn after(&mut self, delay_us: u64, wakeup: Wakeup) -> TimerId {
        let deadline = ts_after(self.now_us, delay_us);
        self.insert(deadline, wakeup, None)
    }

    fn every(&mut self, period_us: u64, wakeup: Wakeup) -> TimerId {
        let period = period_us.max(1);
        let deadline = ts_after(self.now_us, period);
        self.insert(deadline, wakeup, Some(period))
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }
}
