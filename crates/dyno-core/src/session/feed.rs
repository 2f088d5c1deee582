//! Interval feeds a spool session can drain
//!
//! A feed hides where intervals come from: one shared capture queue, several
//! per-sensor queues merged in time order, or hardware period counters.

use log::trace;

use crate::capture::{CaptureEntry, RearmSignal, SensorMerger, TimestampQueue};
use crate::counter::{IntervalSource, Polarity};
use crate::error::CaptureError;
use crate::time::{elapsed, is_before, us_to_ns};

/// One interval ready for smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSample {
    /// When the closing edge was seen (µs).
    pub timestamp: u32,
    pub interval_ns: u32,
    /// Index of the sensor or counter that produced it.
    pub source: usize,
    pub edge: Polarity,
}

/// Non-blocking stream of intervals for one measurement window.
pub trait IntervalFeed {
    /// Prepare for a new window starting at `now`: drop stale data and
    /// enable capture.
    fn arm(&mut self, now: u32) -> Result<(), CaptureError>;

    /// Next interval, if one is ready.
    fn next_interval(&mut self, now: u32) -> Option<IntervalSample>;

    /// Stop capture at the end of the window.
    fn disarm(&mut self);

    /// Intervals lost to back-pressure since the last `arm`.
    fn overwritten(&self) -> u32 {
        0
    }
}

/// True when the interval started before the window was armed.
///
/// Catches an interval computed from a reference edge the capture context
/// took before it saw the rearm request.
fn started_before(entry: &CaptureEntry, armed_at: u32) -> bool {
    is_before(entry.timestamp.wrapping_sub(entry.interval), armed_at)
}

/// One queue shared by every sensor.
pub struct QueueFeed<'a, const C: usize> {
    queue: &'a TimestampQueue<C>,
    rearm: &'a RearmSignal,
    armed_at: u32,
    /// Queue overwrite count when the window was armed.
    overwritten_at_arm: u32,
}

impl<'a, const C: usize> QueueFeed<'a, C> {
    pub const fn new(queue: &'a TimestampQueue<C>, rearm: &'a RearmSignal) -> Self {
        Self {
            queue,
            rearm,
            armed_at: 0,
            overwritten_at_arm: 0,
        }
    }
}

impl<const C: usize> IntervalFeed for QueueFeed<'_, C> {
    fn arm(&mut self, now: u32) -> Result<(), CaptureError> {
        self.rearm.request();
        self.queue.clear();
        self.armed_at = now;
        self.overwritten_at_arm = self.queue.overwritten();
        Ok(())
    }

    fn next_interval(&mut self, _now: u32) -> Option<IntervalSample> {
        loop {
            let entry = self.queue.pop()?;
            if started_before(&entry, self.armed_at) {
                trace!("dropping interval from before arm at {}", entry.timestamp);
                continue;
            }
            return Some(IntervalSample {
                timestamp: entry.timestamp,
                interval_ns: us_to_ns(entry.interval),
                source: 0,
                edge: Polarity::Rising,
            });
        }
    }

    fn disarm(&mut self) {}

    fn overwritten(&self) -> u32 {
        self.queue.overwritten().wrapping_sub(self.overwritten_at_arm)
    }
}

/// One queue per sensor, drained earliest-first.
pub struct MergedFeed<'a, const C: usize> {
    merger: SensorMerger<'a, C>,
    rearm: &'a RearmSignal,
    armed_at: u32,
    overwritten_at_arm: u32,
}

impl<'a, const C: usize> MergedFeed<'a, C> {
    pub const fn new(queues: &'a [TimestampQueue<C>], rearm: &'a RearmSignal) -> Self {
        Self {
            merger: SensorMerger::new(queues),
            rearm,
            armed_at: 0,
            overwritten_at_arm: 0,
        }
    }
}

impl<const C: usize> IntervalFeed for MergedFeed<'_, C> {
    fn arm(&mut self, now: u32) -> Result<(), CaptureError> {
        self.rearm.request();
        self.merger.clear_all();
        self.armed_at = now;
        self.overwritten_at_arm = self.merger.overwritten();
        Ok(())
    }

    fn next_interval(&mut self, _now: u32) -> Option<IntervalSample> {
        loop {
            let (source, entry) = self.merger.pop_earliest()?;
            if started_before(&entry, self.armed_at) {
                continue;
            }
            return Some(IntervalSample {
                timestamp: entry.timestamp,
                interval_ns: us_to_ns(entry.interval),
                source,
                edge: Polarity::Rising,
            });
        }
    }

    fn disarm(&mut self) {}

    fn overwritten(&self) -> u32 {
        self.merger.overwritten().wrapping_sub(self.overwritten_at_arm)
    }
}

/// Hardware period counters polled round-robin.
///
/// Each poll tries every counter once, starting after the one that last
/// produced a reading, and returns the first reading found.
pub struct CounterFeed<'a, S> {
    sources: &'a mut [S],
    next: usize,
    armed_at: u32,
}

impl<'a, S: IntervalSource> CounterFeed<'a, S> {
    pub fn new(sources: &'a mut [S]) -> Self {
        Self {
            sources,
            next: 0,
            armed_at: 0,
        }
    }

    /// Time since the counters were started.
    pub fn running_for(&self, now: u32) -> u32 {
        elapsed(now, self.armed_at)
    }
}

impl<S: IntervalSource> IntervalFeed for CounterFeed<'_, S> {
    fn arm(&mut self, now: u32) -> Result<(), CaptureError> {
        for source in self.sources.iter_mut() {
            source.start();
        }
        self.next = 0;
        self.armed_at = now;
        Ok(())
    }

    fn next_interval(&mut self, now: u32) -> Option<IntervalSample> {
        let count = self.sources.len();
        for offset in 0..count {
            let index = (self.next + offset) % count;
            let source = &mut self.sources[index];
            let Some(ticks) = source.try_read_ticks() else {
                continue;
            };
            self.next = (index + 1) % count;
            return Some(IntervalSample {
                timestamp: now,
                interval_ns: source.ticks_to_nanoseconds(ticks),
                source: index,
                edge: source.edge(),
            });
        }
        None
    }

    fn disarm(&mut self) {
        for source in self.sources.iter_mut() {
            source.stop();
        }
    }
}
