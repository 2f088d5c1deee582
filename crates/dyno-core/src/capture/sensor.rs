//! Rising-edge detection on the capture context
//!
//! A [`Sensor`] turns raw level samples into inter-edge intervals. It is owned
//! by the capture context and never locked; only the queue it pushes into is
//! shared. The main loop asks for a reset through a [`RearmSignal`] instead of
//! touching sensor state directly.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::digital::InputPin;
use log::trace;

use super::queue::TimestampQueue;
use crate::error::CaptureError;
use crate::time::elapsed;

/// Edge detector for one input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sensor {
    pin_id: u8,
    last_level: bool,
    /// `None` until the first rising edge after (re)initialization.
    last_timestamp: Option<u32>,
}

impl Sensor {
    /// Create an unreferenced sensor whose pin currently reads `level`.
    pub const fn new(pin_id: u8, level: bool) -> Self {
        Self {
            pin_id,
            last_level: level,
            last_timestamp: None,
        }
    }

    /// Feed one level sample taken at `timestamp` (µs).
    ///
    /// On a rising edge with a prior reference the interval is pushed to
    /// `queue` and returned. The first edge after a reset only sets the
    /// reference.
    #[inline]
    pub fn sample<const C: usize>(
        &mut self,
        level: bool,
        timestamp: u32,
        queue: &TimestampQueue<C>,
    ) -> Option<u32> {
        let rising = level && !self.last_level;
        self.last_level = level;
        if !rising {
            return None;
        }

        let interval = self.last_timestamp.map(|last| {
            let interval = elapsed(timestamp, last);
            queue.push(timestamp, interval);
            interval
        });
        self.last_timestamp = Some(timestamp);
        interval
    }

    /// Read `pin` and feed its level as a sample taken at `timestamp`.
    pub fn poll<P: InputPin, const C: usize>(
        &mut self,
        pin: &mut P,
        timestamp: u32,
        queue: &TimestampQueue<C>,
    ) -> Result<Option<u32>, CaptureError> {
        let level = pin
            .is_high()
            .map_err(|_| CaptureError::Pin { pin: self.pin_id })?;
        Ok(self.sample(level, timestamp, queue))
    }

    /// Re-sample the current level and drop the reference edge.
    pub fn reset(&mut self, level: bool) {
        self.last_level = level;
        self.last_timestamp = None;
    }

    pub fn pin_id(&self) -> u8 {
        self.pin_id
    }

    pub fn is_referenced(&self) -> bool {
        self.last_timestamp.is_some()
    }
}

/// Request from the main loop to reset every sensor before a new window.
///
/// Single writer (the session), single reader (the capture context). Only
/// atomic load and store are used, which thumbv6m supports.
#[derive(Debug, Default)]
pub struct RearmSignal {
    generation: AtomicU32,
}

impl RearmSignal {
    pub const fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
        }
    }

    /// Ask the capture context to reset its sensors.
    pub fn request(&self) {
        let next = self.generation.load(Ordering::Relaxed).wrapping_add(1);
        self.generation.store(next, Ordering::Release);
    }

    /// Current generation; changes on every request.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

/// All sensors of the capture context, sampled together.
///
/// `N` is the maximum number of sensors. Sensors push into whatever queue the
/// caller hands to [`SensorBank::sample_shared`] or
/// [`SensorBank::sample_each`].
#[derive(Debug)]
pub struct SensorBank<const N: usize> {
    sensors: heapless::Vec<Sensor, N>,
    seen_generation: u32,
}

impl<const N: usize> SensorBank<N> {
    pub const fn new() -> Self {
        Self {
            sensors: heapless::Vec::new(),
            seen_generation: 0,
        }
    }

    /// Register a sensor; returns it back if the bank is full.
    pub fn add(&mut self, sensor: Sensor) -> Result<(), Sensor> {
        self.sensors.push(sensor)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Reset every sensor if the main loop asked for it since the last pass.
    ///
    /// `levels[i]` is the current level of sensor `i`.
    fn apply_rearm(&mut self, levels: &[bool], signal: &RearmSignal) {
        let generation = signal.generation();
        if generation == self.seen_generation {
            return;
        }
        self.seen_generation = generation;
        for (sensor, &level) in self.sensors.iter_mut().zip(levels) {
            sensor.reset(level);
        }
        trace!("sensor bank rearmed (generation {})", generation);
    }

    /// Sample all sensors into one shared queue.
    pub fn sample_shared<const C: usize>(
        &mut self,
        levels: &[bool],
        timestamp: u32,
        signal: &RearmSignal,
        queue: &TimestampQueue<C>,
    ) {
        self.apply_rearm(levels, signal);
        for (sensor, &level) in self.sensors.iter_mut().zip(levels) {
            sensor.sample(level, timestamp, queue);
        }
    }

    /// Sample sensor `i` into `queues[i]`.
    pub fn sample_each<const C: usize>(
        &mut self,
        levels: &[bool],
        timestamp: u32,
        signal: &RearmSignal,
        queues: &[TimestampQueue<C>],
    ) {
        self.apply_rearm(levels, signal);
        for ((sensor, &level), queue) in self.sensors.iter_mut().zip(levels).zip(queues) {
            sensor.sample(level, timestamp, queue);
        }
    }
}

impl<const N: usize> Default for SensorBank<N> {
    fn default() -> Self {
        Self::new()
    }
}
