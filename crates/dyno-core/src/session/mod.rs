//! Spool-up measurement session
//!
//! One session covers one spool-up window:
//!
//! ```text
//! Idle ──arm──▶ Armed ──▶ Measuring ──window elapsed / abort──▶ Complete
//! ```
//!
//! Arming drops stale capture data, resets the RPM filter and opens the
//! throttle. Every poll checks the abort input and the window cutoff before
//! taking one interval from the feed, so an empty feed never delays
//! cancellation.

mod feed;

pub use feed::{CounterFeed, IntervalFeed, IntervalSample, MergedFeed, QueueFeed};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::actuator::{Actuator, Throttle, ThrottlePulses};
use crate::config::DynoConfig;
use crate::error::SessionError;
use crate::filter::Ema;
use crate::time::{Clock, elapsed, rpm_from_interval_ns};

/// Runtime parameters of a spool-up session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Length of the measurement window (µs).
    pub window_us: u32,
    /// Period of the RPM smoothing filter.
    pub rpm_period: u32,
    /// Sleep between polls that found no interval (µs).
    pub idle_sleep_us: u32,
    pub throttle: ThrottlePulses,
}

impl Default for SessionConfig {
    fn default() -> Self {
        DynoConfig::default().session()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Armed,
    Measuring,
    Complete,
}

/// Why a window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    WindowElapsed,
    Aborted,
}

/// Outcome of one spool-up window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpoolReport {
    /// Smoothed RPM at the end of the window.
    pub final_rpm: f32,
    /// Intervals fed into the filter.
    pub samples: u32,
    /// Zero-length intervals that could not be converted.
    pub rejected: u32,
    /// Queue entries lost to back-pressure, as reported by the feed.
    pub overwritten: u32,
    pub elapsed_us: u32,
    pub termination: Termination,
}

/// Result of one [`SpoolSession::poll`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionStatus {
    /// Not armed.
    Idle,
    /// Measuring, no interval was ready.
    Waiting,
    /// Measuring, one interval was taken.
    Sampled { rpm: f32 },
    Complete(SpoolReport),
}

/// State machine for one spool-up measurement at a time.
pub struct SpoolSession {
    config: SessionConfig,
    state: SessionState,
    start_timestamp: u32,
    smoother: Ema,
    samples: u32,
    rejected: u32,
    last_report: Option<SpoolReport>,
}

impl SpoolSession {
    pub const fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            start_timestamp: 0,
            smoother: Ema::new(config.rpm_period),
            samples: 0,
            rejected: 0,
            last_report: None,
        }
    }

    /// Start a window at `now`.
    ///
    /// If the feed cannot be armed the error is returned, the throttle is not
    /// touched and the session stays idle.
    pub fn arm<F: IntervalFeed, A: Actuator>(
        &mut self,
        feed: &mut F,
        actuator: &mut A,
        now: u32,
    ) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::Armed | SessionState::Measuring) {
            return Err(SessionError::NotIdle);
        }

        if let Err(e) = feed.arm(now) {
            error!("Spool-up not started: {}", e);
            self.state = SessionState::Idle;
            return Err(e.into());
        }

        self.smoother.reset(0.0);
        self.samples = 0;
        self.rejected = 0;
        self.start_timestamp = now;
        self.config.throttle.apply(actuator, Throttle::Full);
        self.state = SessionState::Armed;
        info!(
            "Spool-up armed at {} us, window {} us",
            now, self.config.window_us
        );

        self.state = SessionState::Measuring;
        Ok(())
    }

    /// Run one iteration of the measuring loop.
    pub fn poll<F: IntervalFeed, A: Actuator>(
        &mut self,
        feed: &mut F,
        actuator: &mut A,
        now: u32,
        abort: bool,
    ) -> SessionStatus {
        match self.state {
            SessionState::Idle => return SessionStatus::Idle,
            SessionState::Complete => {
                return self
                    .last_report
                    .map_or(SessionStatus::Idle, SessionStatus::Complete);
            }
            SessionState::Armed | SessionState::Measuring => {}
        }

        if abort {
            return SessionStatus::Complete(self.finish(feed, actuator, now, Termination::Aborted));
        }
        if elapsed(now, self.start_timestamp) > self.config.window_us {
            return SessionStatus::Complete(self.finish(
                feed,
                actuator,
                now,
                Termination::WindowElapsed,
            ));
        }

        let Some(sample) = feed.next_interval(now) else {
            return SessionStatus::Waiting;
        };
        match rpm_from_interval_ns(sample.interval_ns) {
            Some(rpm) => {
                debug!(
                    "{}{} {}",
                    sample.source,
                    sample.edge.tag(),
                    sample.interval_ns
                );
                self.smoother.update(rpm);
                self.samples += 1;
                SessionStatus::Sampled { rpm }
            }
            None => {
                warn!("Zero-length interval from source {}", sample.source);
                self.rejected += 1;
                SessionStatus::Waiting
            }
        }
    }

    /// Arm and poll until the window ends.
    ///
    /// `abort` is sampled on every iteration; `delay` provides the idle sleep
    /// when no interval was ready.
    pub fn run<F, A, C, D>(
        &mut self,
        feed: &mut F,
        actuator: &mut A,
        clock: &C,
        delay: &mut D,
        mut abort: impl FnMut() -> bool,
    ) -> Result<SpoolReport, SessionError>
    where
        F: IntervalFeed,
        A: Actuator,
        C: Clock,
        D: DelayNs,
    {
        self.arm(feed, actuator, clock.now_us())?;
        loop {
            match self.poll(feed, actuator, clock.now_us(), abort()) {
                SessionStatus::Complete(report) => return Ok(report),
                SessionStatus::Waiting => delay.delay_us(self.config.idle_sleep_us),
                SessionStatus::Sampled { .. } | SessionStatus::Idle => {}
            }
        }
    }

    fn finish<F: IntervalFeed, A: Actuator>(
        &mut self,
        feed: &mut F,
        actuator: &mut A,
        now: u32,
        termination: Termination,
    ) -> SpoolReport {
        feed.disarm();
        self.config.throttle.apply(actuator, Throttle::Neutral);

        let report = SpoolReport {
            final_rpm: self.smoother.get(),
            samples: self.samples,
            rejected: self.rejected,
            overwritten: feed.overwritten(),
            elapsed_us: elapsed(now, self.start_timestamp),
            termination,
        };
        if report.overwritten > 0 {
            warn!("{} intervals lost to queue overwrite", report.overwritten);
        }
        info!(
            "-- final rpm {:.0} ({} samples, {:?})",
            report.final_rpm, report.samples, report.termination
        );

        self.state = SessionState::Complete;
        self.last_report = Some(report);
        report
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current smoothed RPM.
    pub fn rpm(&self) -> f32 {
        self.smoother.get()
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn start_timestamp(&self) -> u32 {
        self.start_timestamp
    }

    pub fn last_report(&self) -> Option<&SpoolReport> {
        self.last_report.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_measuring(&self) -> bool {
        matches!(self.state, SessionState::Armed | SessionState::Measuring)
    }
}
