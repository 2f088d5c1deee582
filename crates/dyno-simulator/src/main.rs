//! Desktop simulator for the dyno spool-up RPM meter.
//!
//! Spins a synthetic rotor on a capture thread and runs the dyno-core control
//! loop against it on the main thread. The rotor answers the throttle pulse
//! the session commands, so a spool-up shows the real acceleration curve.
//! Time is virtual: the capture thread advances a shared microsecond counter
//! that starts just before the 32-bit rollover.
//!
//! # Modes
//!
//! | Argument  | Pipeline                                         |
//! |-----------|--------------------------------------------------|
//! | `edges`   | one sensor, shared queue (default)               |
//! | `merged`  | two sensors half a turn apart, merged queues     |
//! | `counter` | rise-to-rise period counter over a tick FIFO     |
//!
//! Set `RUST_LOG=debug` to see every interval.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin};
use log::{debug, error, info, warn};

use dyno_core::actuator::{Actuator, ThrottlePulses};
use dyno_core::controller::{Button, Dyno, DynoIo, TemperatureProbe};
use dyno_core::counter::{PeriodCounter, TickFifo};
use dyno_core::readout::{DisplayTarget, Readout, SharedReadout};
use dyno_core::session::{CounterFeed, IntervalFeed, MergedFeed, QueueFeed};
use dyno_core::time::{Clock, NS_PER_US};
use dyno_core::{
    CaptureError, DynoConfig, RearmSignal, Sensor, SensorBank, SessionError, SpoolReport,
    TimestampQueue,
};

// ---------------------------------------------------------------------------
// Rotor model
// ---------------------------------------------------------------------------

/// Virtual time advanced per capture step (µs).
const STEP_US: u32 = 5;

/// Capture steps between yields to the consumer thread.
const STEPS_PER_YIELD: u32 = 64;

/// First timestamp, one second before the counter wraps.
const START_US: u32 = u32::MAX - 1_000_000;

/// Speed the rotor settles at under full throttle.
const FULL_THROTTLE_RPM: f64 = 30_000.0;

/// Spool-up time constant (µs).
const SPOOL_TAU_US: f64 = 800_000.0;

const SENSOR_PINS: [u8; 2] = [19, 20];
const ENGAGE_PIN: u8 = 16;
const REVERSE_PIN: u8 = 17;

/// Rotor with one reflective mark per revolution.
struct Rotor {
    rpm: f64,
    /// Revolutions turned, fractional part is the mark position.
    angle: f64,
}

impl Rotor {
    fn new() -> Self {
        Self {
            rpm: 0.0,
            angle: 0.0,
        }
    }

    fn advance(&mut self, dt_us: u32, pulse_us: u32, pulses: &ThrottlePulses) {
        let span = pulses.full_us.saturating_sub(pulses.neutral_us).max(1) as f64;
        let drive = (pulse_us.saturating_sub(pulses.neutral_us) as f64 / span).clamp(0.0, 1.0);
        let target = FULL_THROTTLE_RPM * drive;

        let dt = dt_us as f64;
        self.rpm += (target - self.rpm) * (dt / SPOOL_TAU_US);
        self.angle += self.rpm / 60e6 * dt;
    }

    /// Sensor level at `phase` (fraction of a turn) from the mark.
    fn level(&self, phase: f64) -> bool {
        (self.angle + phase).fract() < 0.5
    }
}

/// State shared between the capture thread and the control loop.
struct SimBus {
    clock: AtomicU32,
    throttle_us: AtomicU32,
    counting: AtomicBool,
    done: AtomicBool,
}

impl SimBus {
    fn new(neutral_us: u32) -> Self {
        Self {
            clock: AtomicU32::new(START_US),
            throttle_us: AtomicU32::new(neutral_us),
            counting: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }
}

/// Advance the rotor until the control loop is done, calling `on_step` with
/// the rotor and the new timestamp after every step.
fn spin(bus: &SimBus, pulses: &ThrottlePulses, mut on_step: impl FnMut(&Rotor, u32)) {
    let mut rotor = Rotor::new();
    let mut t = START_US;
    let mut steps = 0u32;

    while !bus.done.load(Ordering::Acquire) {
        t = t.wrapping_add(STEP_US);
        rotor.advance(STEP_US, bus.throttle_us.load(Ordering::Relaxed), pulses);
        bus.clock.store(t, Ordering::Release);
        on_step(&rotor, t);

        steps = steps.wrapping_add(1);
        if steps % STEPS_PER_YIELD == 0 {
            std::thread::yield_now();
        }
    }
    info!("Rotor stopped at {:.0} rpm", rotor.rpm);
}

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

struct VirtualClock<'a>(&'a AtomicU32);

impl Clock for VirtualClock<'_> {
    fn now_us(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Virtual time belongs to the capture thread; waiting just yields to it.
struct YieldDelay;

impl DelayNs for YieldDelay {
    fn delay_ns(&mut self, _ns: u32) {
        std::thread::yield_now();
    }
}

/// ESC whose pulse width the rotor model reads back.
struct SimEsc<'a>(&'a AtomicU32);

impl Actuator for SimEsc<'_> {
    fn set_pulse_us(&mut self, micros: u32) {
        if self.0.swap(micros, Ordering::Relaxed) != micros {
            debug!("ESC pulse {} us", micros);
        }
    }
}

struct HeldPin {
    high: bool,
}

impl ErrorType for HeldPin {
    type Error = Infallible;
}

impl InputPin for HeldPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

/// Motor can temperature creeping up while the simulation runs.
struct SimProbe {
    celsius: f32,
}

impl TemperatureProbe for SimProbe {
    fn read_celsius(&mut self) -> Option<f32> {
        self.celsius += 0.05;
        Some(self.celsius)
    }
}

/// Tick FIFO fed by the capture thread.
struct SimFifo<'a> {
    words: Receiver<u32>,
    counting: &'a AtomicBool,
}

impl TickFifo for SimFifo<'_> {
    fn init(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.counting.store(enabled, Ordering::Release);
    }

    fn pop_raw(&mut self) -> Option<u32> {
        self.words.try_recv().ok()
    }
}

struct ConsoleDisplay;

impl DisplayTarget for ConsoleDisplay {
    fn render(&mut self, readout: &Readout) {
        match readout.temperature {
            Some(celsius) => info!(
                "[display] {:>6.0} rpm  {:>5.1} C{}",
                readout.rpm,
                celsius,
                if readout.measuring { "  *" } else { "" }
            ),
            None => info!("[display] {:>6.0} rpm", readout.rpm),
        }
    }
}

// ---------------------------------------------------------------------------
// Capture contexts
// ---------------------------------------------------------------------------

fn capture_edges(
    bus: &SimBus,
    pulses: &ThrottlePulses,
    queue: &TimestampQueue,
    rearm: &RearmSignal,
) {
    let mut bank = SensorBank::<1>::new();
    bank.add(Sensor::new(SENSOR_PINS[0], false))
        .expect("sensor bank has room for one sensor");
    spin(bus, pulses, |rotor, t| {
        bank.sample_shared(&[rotor.level(0.0)], t, rearm, queue)
    });
}

fn capture_merged(
    bus: &SimBus,
    pulses: &ThrottlePulses,
    queues: &[TimestampQueue; 2],
    rearm: &RearmSignal,
) {
    let mut bank = SensorBank::<2>::new();
    for pin in SENSOR_PINS {
        bank.add(Sensor::new(pin, false))
            .expect("sensor bank has room for every sensor pin");
    }
    spin(bus, pulses, |rotor, t| {
        bank.sample_each(&[rotor.level(0.0), rotor.level(0.5)], t, rearm, queues)
    });
}

/// Emit rise-to-rise counts the way the counting program would at 125 MHz.
fn capture_counter(bus: &SimBus, pulses: &ThrottlePulses, words: SyncSender<u32>) {
    let mut last_level = false;
    let mut last_rise: Option<u32> = None;
    spin(bus, pulses, |rotor, t| {
        let level = rotor.level(0.0);
        if level && !last_level {
            if let Some(rise) = last_rise
                && bus.counting.load(Ordering::Acquire)
            {
                let period_ns = t.wrapping_sub(rise).saturating_mul(NS_PER_US);
                // (2 * raw + 3) cycles of 8 ns
                let raw = (period_ns / 8).saturating_sub(3) / 2;
                if words.try_send(raw).is_err() {
                    warn!("tick FIFO full, dropping count");
                }
            }
            last_rise = Some(t);
        }
        last_level = level;
    });
}

// ---------------------------------------------------------------------------
// Control loop
// ---------------------------------------------------------------------------

/// Run control ticks with engage held until one spool-up completes.
fn spool_up<F: IntervalFeed>(
    feed: F,
    bus: &SimBus,
    config: &DynoConfig,
    readout: &SharedReadout,
) -> Result<SpoolReport, SessionError> {
    let io = DynoIo {
        engage: Button::active_low(HeldPin { high: false }, ENGAGE_PIN),
        reverse: Button::active_low(HeldPin { high: true }, REVERSE_PIN),
        feed,
        actuator: SimEsc(&bus.throttle_us),
        probe: SimProbe { celsius: 24.0 },
    };
    let mut dyno = Dyno::new(io, config, readout);
    let clock = VirtualClock(&bus.clock);

    loop {
        if let Some(report) = dyno.tick(&clock, &mut YieldDelay)? {
            return Ok(report);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Edges,
    Merged,
    Counter,
}

impl Mode {
    fn from_arg(arg: Option<&str>) -> Option<Self> {
        match arg {
            None | Some("edges") => Some(Self::Edges),
            Some("merged") => Some(Self::Merged),
            Some("counter") => Some(Self::Counter),
            Some(_) => None,
        }
    }
}

fn main() {
    env_logger::init();

    let arg = std::env::args().nth(1);
    let Some(mode) = Mode::from_arg(arg.as_deref()) else {
        error!("Unknown mode {:?}, expected edges, merged or counter", arg);
        std::process::exit(2);
    };

    let config = DynoConfig::default();
    info!("Starting dyno simulator ({:?})", mode);
    info!(
        "Window {} ms, rpm filter period {}, rotor settles at {:.0} rpm",
        config.spool.window_us / 1000,
        config.spool.rpm_period,
        FULL_THROTTLE_RPM
    );

    let bus = SimBus::new(config.throttle.neutral_us);
    let readout = SharedReadout::new();
    let rearm = RearmSignal::new();
    let queue = TimestampQueue::new();
    let queues = [TimestampQueue::new(), TimestampQueue::new()];
    let pulses = config.throttle;

    let result = std::thread::scope(|s| {
        // Display context
        s.spawn(|| {
            let mut display = ConsoleDisplay;
            let period = Duration::from_millis(u64::from(config.control.display_refresh_ms));
            while !bus.done.load(Ordering::Acquire) {
                readout.refresh(&mut display);
                std::thread::sleep(period);
            }
        });

        let result = match mode {
            Mode::Edges => {
                s.spawn(|| capture_edges(&bus, &pulses, &queue, &rearm));
                spool_up(QueueFeed::new(&queue, &rearm), &bus, &config, &readout)
            }
            Mode::Merged => {
                s.spawn(|| capture_merged(&bus, &pulses, &queues, &rearm));
                spool_up(MergedFeed::new(&queues, &rearm), &bus, &config, &readout)
            }
            Mode::Counter => {
                let (words, fifo_words) = mpsc::sync_channel(8);
                s.spawn(|| capture_counter(&bus, &pulses, words));
                let fifo = SimFifo {
                    words: fifo_words,
                    counting: &bus.counting,
                };
                PeriodCounter::new(fifo, config.calibration())
                    .map_err(SessionError::from)
                    .and_then(|counter| {
                        let mut counters = [counter];
                        spool_up(CounterFeed::new(&mut counters), &bus, &config, &readout)
                    })
            }
        };

        bus.done.store(true, Ordering::Release);
        result
    });

    match result {
        Ok(report) => {
            info!(
                "Final rpm {:.0} after {} ms ({} samples, {} rejected, {} overwritten, {:?})",
                report.final_rpm,
                report.elapsed_us / 1000,
                report.samples,
                report.rejected,
                report.overwritten,
                report.termination
            );
            readout.refresh(&mut ConsoleDisplay);
        }
        Err(e) => {
            error!("Spool-up failed: {}", e);
            std::process::exit(1);
        }
    }
}
