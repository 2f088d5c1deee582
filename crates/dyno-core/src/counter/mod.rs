//! Hardware period counters
//!
//! A period counter is a peripheral state machine (a PIO program on the
//! RP2040) that counts clock cycles between edges of one input pin and
//! buffers the raw counts in a FIFO. This module wraps that primitive as a
//! non-blocking [`IntervalSource`].
//!
//! Three capture programs exist. Each loop iteration of the program takes two
//! clock cycles and every program spends a few extra cycles outside the loop
//! per measurement, so a raw count converts to time as
//! `ticks * ns_per_tick + fixed_offset_ns`.

mod calibration;
mod period_counter;

pub use calibration::{Calibration, CaptureMethod, Polarity};
pub use period_counter::{PeriodCounter, TickFifo};

/// Non-blocking source of completed edge-to-edge intervals.
pub trait IntervalSource {
    /// Enable the underlying measurement.
    fn start(&mut self);

    /// Disable the underlying measurement.
    fn stop(&mut self);

    /// Raw tick count of the most recently completed interval, if one is
    /// buffered.
    fn try_read_ticks(&mut self) -> Option<u32>;

    /// Convert a tick count from [`IntervalSource::try_read_ticks`] into
    /// nanoseconds.
    fn ticks_to_nanoseconds(&self, ticks: u32) -> u32;

    /// Edge that closed the last interval returned.
    fn edge(&self) -> Polarity;
}
