use super::context::Trampoline;
use crate::utils::{Key, Slab};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Weak;
use std::time::{Duration, Instant};

/// Substrate-level handle of one armed timer.
///
/// It is the only thing the timer queue hands out; the owning timer object
/// resolves itself through the handle table, never through a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NativeHandle(Key);

/// An entry in the reactor timer queue.
///
/// `TimerEntry` represents a scheduled expiry at a specific deadline.
/// It is stored inside a binary heap ordered by deadline, then by
/// arming order.
///
/// The handle may have been disarmed before the entry is popped; such
/// entries are discarded lazily.
pub(crate) struct TimerEntry {
    /// The time at which the timer should fire.
    pub(crate) deadline: Instant,

    /// Monotonic arming counter, used as a tie-breaker.
    pub(crate) sequence: u64,

    /// Native handle of the armed timer.
    pub(crate) handle: NativeHandle,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline.eq(&other.deadline) && self.sequence.eq(&other.sequence)
    }
}

impl Ord for TimerEntry {
    /// Orders timer entries by deadline, then by arming order.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap,
    /// where the earliest deadline is popped first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The heap is compacted once it holds more than `COMPACT_MIN` entries and
/// more than `COMPACT_RATIO` entries per armed timer.
const COMPACT_MIN: usize = 64;
const COMPACT_RATIO: usize = 4;

/// One slot of the native handle table.
struct NativeTimer {
    trampoline: Weak<dyn Trampoline>,
}

/// Monotonic timer queue plus the native handle table.
///
/// Arming inserts a slot into the table and pushes a heap entry.
/// Disarming only frees the slot; the heap entry becomes stale and is
/// skipped when it reaches the top, or dropped with every other stale entry
/// once they outnumber the armed timers.
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    natives: Slab<NativeTimer>,
    sequence: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            natives: Slab::new(64),
            sequence: 0,
        }
    }

    /// Arms a native timer expiring after `delay`.
    ///
    /// Returns `None` if the deadline cannot be represented.
    pub(crate) fn arm(
        &mut self,
        delay: Duration,
        trampoline: Weak<dyn Trampoline>,
    ) -> Option<NativeHandle> {
        let deadline = Instant::now().checked_add(delay)?;
        let handle = NativeHandle(self.natives.insert(NativeTimer { trampoline }));

        self.sequence += 1;
        self.heap.push(TimerEntry {
            deadline,
            sequence: self.sequence,
            handle,
        });

        Some(handle)
    }

    /// Frees the slot of `handle`.
    ///
    /// Returns `false` if the handle was already released.
    pub(crate) fn disarm(&mut self, handle: NativeHandle) -> bool {
        if self.natives.remove(handle.0).is_none() {
            return false;
        }

        if self.heap.len() > COMPACT_MIN && self.heap.len() > COMPACT_RATIO * self.natives.len() {
            self.compact();
        }

        true
    }

    /// Drops every stale heap entry at once.
    fn compact(&mut self) {
        let natives = &self.natives;
        self.heap.retain(|entry| natives.contains(entry.handle.0));
    }

    /// Resolves the trampoline registered for `handle`.
    pub(crate) fn trampoline(&self, handle: NativeHandle) -> Option<Weak<dyn Trampoline>> {
        self.natives
            .get(handle.0)
            .map(|native| native.trampoline.clone())
    }

    /// Earliest live deadline, discarding stale entries on the way.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(entry) = self.heap.peek() {
            if self.natives.contains(entry.handle.0) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }

        None
    }

    /// Returns `true` if at least one live timer is due at `now`.
    pub(crate) fn has_expired(&mut self, now: Instant) -> bool {
        self.next_deadline().is_some_and(|deadline| deadline <= now)
    }

    /// Pops every live entry due at `now`, in firing order.
    ///
    /// Timers armed after this call are not part of the batch, even when
    /// their delay is zero.
    pub(crate) fn expire(&mut self, now: Instant) -> Vec<TimerEntry> {
        let mut batch = Vec::new();

        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }

            if let Some(entry) = self.heap.pop() {
                if self.natives.contains(entry.handle.0) {
                    batch.push(entry);
                }
            }
        }

        batch
    }

    /// Puts back entries of a batch that was interrupted by a stop request.
    pub(crate) fn requeue(&mut self, entries: impl IntoIterator<Item = TimerEntry>) {
        self.heap.extend(entries);
    }

    /// Number of armed native timers.
    pub(crate) fn len(&self) -> usize {
        self.natives.len()
    }
}
