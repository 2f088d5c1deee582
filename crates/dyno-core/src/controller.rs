//! Control loop tying buttons, the spool session, temperature and the readout
//! together
//!
//! One [`Dyno::tick`] per control period. Pressing engage starts a spool-up
//! window that runs until the window elapses or engage is released. While
//! idle, holding reverse drives the ESC backwards; otherwise it sits at
//! neutral.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::actuator::{Actuator, Throttle, ThrottlePulses};
use crate::config::DynoConfig;
use crate::error::{CaptureError, SessionError};
use crate::filter::Ema;
use crate::readout::{Readout, SharedReadout};
use crate::session::{IntervalFeed, SessionStatus, SpoolReport, SpoolSession};
use crate::time::Clock;

/// Temperature sensor. The ADC-to-°C conversion belongs to the implementor.
pub trait TemperatureProbe {
    /// Latest reading in °C, `None` when no probe is fitted or the read failed.
    fn read_celsius(&mut self) -> Option<f32>;
}

/// Active-low push button, already debounced.
pub struct Button<P> {
    pin: P,
    id: u8,
}

impl<P: InputPin> Button<P> {
    pub fn active_low(pin: P, id: u8) -> Self {
        Self { pin, id }
    }

    pub fn is_pressed(&mut self) -> Result<bool, CaptureError> {
        self.pin
            .is_low()
            .map_err(|_| CaptureError::Pin { pin: self.id })
    }
}

/// Hardware the controller drives.
pub struct DynoIo<E, R, F, A, T> {
    pub engage: Button<E>,
    pub reverse: Button<R>,
    pub feed: F,
    pub actuator: A,
    pub probe: T,
}

pub struct Dyno<'r, E, R, F, A, T> {
    io: DynoIo<E, R, F, A, T>,
    session: SpoolSession,
    temperature: Ema,
    throttle: ThrottlePulses,
    readout: &'r SharedReadout,
    was_engaged: bool,
    last_report: Option<SpoolReport>,
    loop_period_ms: u32,
}

impl<'r, E, R, F, A, T> Dyno<'r, E, R, F, A, T>
where
    E: InputPin,
    R: InputPin,
    F: IntervalFeed,
    A: Actuator,
    T: TemperatureProbe,
{
    pub fn new(io: DynoIo<E, R, F, A, T>, config: &DynoConfig, readout: &'r SharedReadout) -> Self {
        Self {
            io,
            session: SpoolSession::new(config.session()),
            temperature: Ema::new(config.control.temperature_period),
            throttle: config.throttle,
            readout,
            was_engaged: false,
            last_report: None,
            loop_period_ms: config.control.loop_period_ms,
        }
    }

    /// One control period. Returns the report when a spool-up ran.
    ///
    /// A spool-up blocks inside this call until it completes.
    pub fn tick<C: Clock, D: DelayNs>(
        &mut self,
        clock: &C,
        delay: &mut D,
    ) -> Result<Option<SpoolReport>, SessionError> {
        let engaged = self.io.engage.is_pressed()?;
        let engage_edge = engaged && !self.was_engaged;
        self.was_engaged = engaged;

        let report = if engage_edge {
            Some(self.spool(clock, delay)?)
        } else {
            let throttle = if self.io.reverse.is_pressed()? {
                Throttle::Reverse
            } else {
                Throttle::Neutral
            };
            self.throttle.apply(&mut self.io.actuator, throttle);
            None
        };

        if let Some(celsius) = self.io.probe.read_celsius() {
            self.temperature.update(celsius);
        }
        self.publish(false);
        Ok(report)
    }

    /// Run `tick` at the configured control period until an input fails.
    pub fn run<C: Clock, D: DelayNs>(&mut self, clock: &C, delay: &mut D) -> SessionError {
        loop {
            if let Err(e) = self.tick(clock, delay) {
                return e;
            }
            delay.delay_ms(self.loop_period_ms);
        }
    }

    fn spool<C: Clock, D: DelayNs>(
        &mut self,
        clock: &C,
        delay: &mut D,
    ) -> Result<SpoolReport, SessionError> {
        self.session
            .arm(&mut self.io.feed, &mut self.io.actuator, clock.now_us())?;
        self.publish(true);

        loop {
            // A pin fault while the throttle is open ends the window
            let abort = match self.io.engage.is_pressed() {
                Ok(pressed) => !pressed,
                Err(e) => {
                    warn!("Aborting spool-up: {}", e);
                    true
                }
            };

            match self
                .session
                .poll(&mut self.io.feed, &mut self.io.actuator, clock.now_us(), abort)
            {
                SessionStatus::Complete(report) => {
                    info!("Spool-up finished at {:.0} rpm", report.final_rpm);
                    self.last_report = Some(report);
                    return Ok(report);
                }
                SessionStatus::Sampled { .. } => self.readout.publish(Readout {
                    rpm: self.session.rpm(),
                    temperature: self.temperature_reading(),
                    measuring: true,
                }),
                SessionStatus::Waiting => delay.delay_us(self.session.config().idle_sleep_us),
                SessionStatus::Idle => {}
            }
        }
    }

    fn temperature_reading(&self) -> Option<f32> {
        (self.temperature.count() > 0).then(|| self.temperature.get())
    }

    fn publish(&self, measuring: bool) {
        self.readout.publish(Readout {
            rpm: self.session.rpm(),
            temperature: self.temperature_reading(),
            measuring,
        });
    }

    pub fn last_report(&self) -> Option<&SpoolReport> {
        self.last_report.as_ref()
    }

    pub fn session(&self) -> &SpoolSession {
        &self.session
    }

    pub fn loop_period_ms(&self) -> u32 {
        self.loop_period_ms
    }

    pub fn io(&self) -> &DynoIo<E, R, F, A, T> {
        &self.io
    }
}
