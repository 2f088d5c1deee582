use log::{debug, error};

use super::{Calibration, IntervalSource, Polarity};
use crate::error::CaptureError;

/// Half periods at or below this raw count mean the pin started in the wrong
/// level and the program measured a partial half.
const MIN_VALID_HALF_TICKS: u32 = 1;

/// Raw access to one counter state machine and its receive FIFO.
pub trait TickFifo {
    /// Load the capture program and configure the input pin.
    fn init(&mut self) -> Result<(), CaptureError>;

    /// Start or stop the state machine.
    fn set_enabled(&mut self, enabled: bool);

    /// Next raw count if the FIFO holds one.
    fn pop_raw(&mut self) -> Option<u32>;
}

/// [`IntervalSource`] over a [`TickFifo`] running one of the capture programs.
pub struct PeriodCounter<F> {
    fifo: F,
    calibration: Calibration,
    edge: Polarity,
    /// Last valid half, for programs that report halves.
    previous_half: Option<u32>,
    running: bool,
}

impl<F: TickFifo> PeriodCounter<F> {
    /// Initialize the peripheral. Failure is fatal for this counter.
    pub fn new(mut fifo: F, calibration: Calibration) -> Result<Self, CaptureError> {
        fifo.init().inspect_err(|e| error!("Period counter init failed: {}", e))?;
        debug!(
            "Period counter ready: {:?}, {} ns/tick + {} ns",
            calibration.method, calibration.ns_per_tick, calibration.fixed_offset_ns
        );

        Ok(Self {
            fifo,
            calibration,
            edge: starting_edge(&calibration),
            previous_half: None,
            running: false,
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Give back the underlying FIFO.
    pub fn release(mut self) -> F {
        self.stop();
        self.fifo
    }

    fn read_half_pair(&mut self) -> Option<u32> {
        let raw = self.fifo.pop_raw()?;
        self.edge = self.edge.flipped();
        if raw <= MIN_VALID_HALF_TICKS {
            return None;
        }
        let previous = self.previous_half.replace(raw)?;
        Some(previous.saturating_add(raw))
    }
}

/// Edge state before the first reading. Half-reporting programs flip on
/// every word, so they start one flip behind their first edge.
fn starting_edge(calibration: &Calibration) -> Polarity {
    let initial = calibration.method.initial_edge();
    if calibration.method.reports_halves() {
        initial.flipped()
    } else {
        initial
    }
}

impl<F: TickFifo> IntervalSource for PeriodCounter<F> {
    fn start(&mut self) {
        self.previous_half = None;
        self.edge = starting_edge(&self.calibration);
        self.fifo.set_enabled(true);
        self.running = true;
    }

    fn stop(&mut self) {
        self.fifo.set_enabled(false);
        self.running = false;
    }

    fn try_read_ticks(&mut self) -> Option<u32> {
        if self.calibration.method.reports_halves() {
            self.read_half_pair()
        } else {
            self.fifo.pop_raw()
        }
    }

    fn ticks_to_nanoseconds(&self, ticks: u32) -> u32 {
        self.calibration.ticks_to_nanoseconds(ticks)
    }

    fn edge(&self) -> Polarity {
        self.edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CaptureMethod;
    use std::collections::VecDeque;

    const CLOCK_HZ: u32 = 125_000_000;

    #[derive(Default)]
    struct FakeFifo {
        words: VecDeque<u32>,
        enabled: bool,
        fail_init: bool,
    }

    impl TickFifo for FakeFifo {
        fn init(&mut self) -> Result<(), CaptureError> {
            if self.fail_init {
                Err(CaptureError::init_failed("pio0 sm0", "program does not fit"))
            } else {
                Ok(())
            }
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }

        fn pop_raw(&mut self) -> Option<u32> {
            self.words.pop_front()
        }
    }

    fn counter(method: CaptureMethod, words: &[u32]) -> PeriodCounter<FakeFifo> {
        let fifo = FakeFifo {
            words: words.iter().copied().collect(),
            ..Default::default()
        };
        PeriodCounter::new(fifo, Calibration::for_method(method, CLOCK_HZ)).unwrap()
    }

    #[test]
    fn test_init_failure_propagates() {
        let fifo = FakeFifo {
            fail_init: true,
            ..Default::default()
        };
        let result = PeriodCounter::new(
            fifo,
            Calibration::for_method(CaptureMethod::RiseToRise, CLOCK_HZ),
        );
        assert!(matches!(result, Err(CaptureError::InitFailed { .. })));
    }

    #[test]
    fn test_edge_to_edge_passes_raw_counts() {
        let mut counter = counter(CaptureMethod::RiseToRise, &[1000, 1002]);
        counter.start();
        assert!(counter.is_running());

        let ticks = counter.try_read_ticks().unwrap();
        assert_eq!(counter.ticks_to_nanoseconds(ticks), 16_024);
        assert_eq!(counter.edge(), Polarity::Rising);
        assert_eq!(counter.try_read_ticks(), Some(1002));
        assert_eq!(counter.try_read_ticks(), None);

        let fifo = counter.release();
        assert!(!fifo.enabled);
    }

    #[test]
    fn test_fall_to_fall_reports_falling_edges() {
        let mut counter = counter(CaptureMethod::FallToFall, &[500]);
        counter.start();
        assert_eq!(counter.try_read_ticks(), Some(500));
        assert_eq!(counter.edge(), Polarity::Falling);
    }

    #[test]
    fn test_high_and_low_pairs_halves() {
        let mut counter = counter(CaptureMethod::HighAndLow, &[400, 600, 500]);
        counter.start();

        // First half has nothing to pair with
        assert_eq!(counter.try_read_ticks(), None);
        assert_eq!(counter.edge(), Polarity::Falling);
        assert_eq!(counter.try_read_ticks(), Some(1000));
        let first_edge = counter.edge();
        assert_eq!(first_edge, Polarity::Rising);
        assert_eq!(counter.try_read_ticks(), Some(1100));
        assert_eq!(counter.edge(), first_edge.flipped());

        // 1000 ticks of two halves: 2 * 1000 + 8 cycles
        assert_eq!(counter.ticks_to_nanoseconds(1000), 2008 * 8);
    }

    #[test]
    fn test_high_and_low_drops_partial_half() {
        let mut counter = counter(CaptureMethod::HighAndLow, &[1, 400, 600]);
        counter.start();

        assert_eq!(counter.try_read_ticks(), None);
        assert_eq!(counter.try_read_ticks(), None);
        assert_eq!(counter.try_read_ticks(), Some(1000));
    }

    #[test]
    fn test_start_forgets_previous_half() {
        let mut counter = counter(CaptureMethod::HighAndLow, &[400, 600]);
        counter.start();
        assert_eq!(counter.try_read_ticks(), None);
        counter.stop();
        counter.start();
        assert_eq!(counter.try_read_ticks(), None);
    }
}
