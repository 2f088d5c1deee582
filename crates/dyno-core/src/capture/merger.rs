//! Earliest-first merge across per-sensor queues
//!
//! Several sensors watching the same target at different angular offsets each
//! fill their own queue. Smoothing must see their intervals in real-time
//! order, so the merger always pops the queue whose head happened first.

use super::queue::{CaptureEntry, TimestampQueue};
use crate::time::is_before;

/// Chronological view over an ordered set of queues.
///
/// Slice order is the tie-break priority: on equal head timestamps the lower
/// index wins.
pub struct SensorMerger<'a, const C: usize> {
    queues: &'a [TimestampQueue<C>],
}

impl<'a, const C: usize> SensorMerger<'a, C> {
    pub const fn new(queues: &'a [TimestampQueue<C>]) -> Self {
        Self { queues }
    }

    /// Pop the earliest head across all queues, with the index of its queue.
    ///
    /// Ordering is wraparound-aware, so heads on both sides of a counter
    /// rollover still come out in the order they were captured. While a
    /// queue is overflowing its head can move between the comparison and the
    /// pop, in which case that queue's next entry is returned instead.
    pub fn pop_earliest(&self) -> Option<(usize, CaptureEntry)> {
        let mut earliest: Option<(usize, u32)> = None;
        for (index, queue) in self.queues.iter().enumerate() {
            let Some(head) = queue.peek() else {
                continue;
            };
            match earliest {
                Some((_, best)) if !is_before(head.timestamp, best) => {}
                _ => earliest = Some((index, head.timestamp)),
            }
        }

        let (index, _) = earliest?;
        // Only this context pops, but a full queue can have its head
        // overwritten after the peek; ordering is best-effort under overflow
        self.queues[index].pop().map(|entry| (index, entry))
    }

    /// Entries waiting across all queues.
    pub fn pending(&self) -> usize {
        self.queues.iter().map(TimestampQueue::size).sum()
    }

    /// Entries lost to overwrite across all queues.
    pub fn overwritten(&self) -> u32 {
        self.queues
            .iter()
            .fold(0u32, |total, queue| total.wrapping_add(queue.overwritten()))
    }

    pub fn clear_all(&self) {
        for queue in self.queues {
            queue.clear();
        }
    }

    pub fn queues(&self) -> &'a [TimestampQueue<C>] {
        self.queues
    }
}
