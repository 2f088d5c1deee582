//! Lock-protected timestamp queue shared between capture and main loop
//!
//! ```text
//! capture context ──push──▶ TimestampQueue ──pop──▶ spool session
//!  (IRQ or core 1)          (critical section)      (main loop)
//! ```
//!
//! Every operation is a single O(1) critical section, so the capture context
//! is never stalled for longer than a slot copy. When the consumer falls
//! behind the queue overwrites its oldest entry instead of blocking the
//! producer; the loss is counted in [`TimestampQueue::overwritten`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Queue capacity used by the firmware (power of two).
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One completed edge-to-edge interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureEntry {
    /// Timestamp of the edge that closed the interval (µs).
    pub timestamp: u32,
    /// Time since the previous qualifying edge (µs).
    pub interval: u32,
}

impl CaptureEntry {
    pub const EMPTY: Self = Self {
        timestamp: 0,
        interval: 0,
    };

    pub const fn new(timestamp: u32, interval: u32) -> Self {
        Self {
            timestamp,
            interval,
        }
    }
}

/// Ring state, only ever touched inside the critical section.
struct Ring<const C: usize> {
    slots: [CaptureEntry; C],
    head: usize,
    tail: usize,
    full: bool,
    overwritten: u32,
}

impl<const C: usize> Ring<C> {
    const MASK: usize = C - 1;

    #[inline]
    const fn next(i: usize) -> usize {
        (i + 1) & Self::MASK
    }

    fn size(&self) -> usize {
        if self.full {
            C
        } else {
            self.tail.wrapping_sub(self.head) & Self::MASK
        }
    }

    fn is_empty(&self) -> bool {
        !self.full && self.head == self.tail
    }
}

/// Bounded FIFO of [`CaptureEntry`] with overwrite-oldest semantics.
///
/// Single producer (the owning sensor or sensor bank), single consumer (the
/// session). `C` must be a power of two; this is checked at compile time.
pub struct TimestampQueue<const C: usize = DEFAULT_QUEUE_CAPACITY> {
    ring: Mutex<CriticalSectionRawMutex, RefCell<Ring<C>>>,
}

impl<const C: usize> TimestampQueue<C> {
    const CAPACITY_IS_POWER_OF_TWO: () = assert!(
        C.is_power_of_two(),
        "TimestampQueue capacity must be a power of 2"
    );

    /// Create an empty queue. Usable in a `static`.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_IS_POWER_OF_TWO;

        Self {
            ring: Mutex::new(RefCell::new(Ring {
                slots: [CaptureEntry::EMPTY; C],
                head: 0,
                tail: 0,
                full: false,
                overwritten: 0,
            })),
        }
    }

    /// Append an entry. Never fails: a full queue drops its oldest entry.
    #[inline]
    pub fn push(&self, timestamp: u32, interval: u32) {
        self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            let tail = ring.tail;
            ring.slots[tail] = CaptureEntry::new(timestamp, interval);
            ring.tail = Ring::<C>::next(tail);
            if ring.full {
                // Oldest entry is gone, head follows tail
                ring.head = ring.tail;
                ring.overwritten = ring.overwritten.wrapping_add(1);
            } else {
                ring.full = ring.tail == ring.head;
            }
        })
    }

    /// Remove and return the oldest entry.
    #[inline]
    pub fn pop(&self) -> Option<CaptureEntry> {
        self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            if ring.is_empty() {
                return None;
            }
            let head = ring.head;
            let entry = ring.slots[head];
            ring.head = Ring::<C>::next(head);
            ring.full = false;
            Some(entry)
        })
    }

    /// Return the oldest entry without removing it.
    #[inline]
    pub fn peek(&self) -> Option<CaptureEntry> {
        self.ring.lock(|ring| {
            let ring = ring.borrow();
            if ring.is_empty() {
                None
            } else {
                Some(ring.slots[ring.head])
            }
        })
    }

    /// Discard everything queued. The overwrite counter is kept.
    pub fn clear(&self) {
        self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            ring.head = 0;
            ring.tail = 0;
            ring.full = false;
        })
    }

    /// Number of entries waiting.
    pub fn size(&self) -> usize {
        self.ring.lock(|ring| ring.borrow().size())
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock(|ring| ring.borrow().is_empty())
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    /// Entries lost to overwrite-on-full since creation or the last reset.
    pub fn overwritten(&self) -> u32 {
        self.ring.lock(|ring| ring.borrow().overwritten)
    }

    pub fn reset_overwritten(&self) {
        self.ring.lock(|ring| ring.borrow_mut().overwritten = 0)
    }
}

impl<const C: usize> Default for TimestampQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = TimestampQueue::<8>::new();
        for i in 0..8u32 {
            queue.push(i * 100, i + 1);
        }
        assert_eq!(queue.size(), 8);

        for i in 0..8u32 {
            assert_eq!(queue.pop(), Some(CaptureEntry::new(i * 100, i + 1)));
        }
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overwrite_on_full_keeps_newest() {
        let queue = TimestampQueue::<8>::new();
        for i in 0..9u32 {
            queue.push(i, i);
        }

        assert_eq!(queue.size(), 8);
        assert_eq!(queue.overwritten(), 1);

        // Entry 0 was dropped, 1..=8 survive in order
        for i in 1..9u32 {
            assert_eq!(queue.pop().map(|e| e.timestamp), Some(i));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_size_tracks_wrapped_indices() {
        let queue = TimestampQueue::<4>::new();
        for round in 0..10u32 {
            queue.push(round, 1);
            queue.push(round, 2);
            assert_eq!(queue.size(), 2);
            queue.pop();
            assert_eq!(queue.size(), 1);
            queue.pop();
            assert_eq!(queue.size(), 0);
        }
        assert_eq!(queue.overwritten(), 0);
    }

    #[test]
    fn test_pop_after_full_clears_flag() {
        let queue = TimestampQueue::<4>::new();
        for i in 0..4u32 {
            queue.push(i, i);
        }
        assert_eq!(queue.size(), 4);
        queue.pop();
        assert_eq!(queue.size(), 3);
        queue.push(4, 4);
        assert_eq!(queue.size(), 4);
        assert_eq!(queue.overwritten(), 0);
    }

    #[test]
    fn test_clear_discards_stale_entries() {
        let queue = TimestampQueue::<8>::new();
        for i in 0..20u32 {
            queue.push(i, i);
        }
        queue.clear();
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.peek(), None);
        assert_eq!(queue.overwritten(), 12);

        queue.push(99, 7);
        assert_eq!(queue.peek(), Some(CaptureEntry::new(99, 7)));
        assert_eq!(queue.size(), 1);

        queue.reset_overwritten();
        assert_eq!(queue.overwritten(), 0);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        const PUSHES: u32 = 20_000;
        let queue = TimestampQueue::<64>::new();

        let received = std::thread::scope(|s| {
            s.spawn(|| {
                for i in 1..=PUSHES {
                    queue.push(i, i);
                }
            });

            let consumer = s.spawn(|| {
                let mut last = 0u32;
                let mut received = 0u32;
                while last < PUSHES {
                    if let Some(entry) = queue.pop() {
                        // Drops are allowed, reordering is not
                        assert!(entry.timestamp > last);
                        last = entry.timestamp;
                        received += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
                received
            });
            consumer.join().unwrap()
        });

        assert_eq!(received + queue.overwritten(), PUSHES);
    }
}
