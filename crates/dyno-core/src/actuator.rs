//! Servo/ESC command interface

use serde::{Deserialize, Serialize};

/// Pulse-width output driving the ESC. Duty-cycle generation lives in the
/// driver; the core only picks the pulse width.
pub trait Actuator {
    fn set_pulse_us(&mut self, micros: u32);
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    fn set_pulse_us(&mut self, micros: u32) {
        (**self).set_pulse_us(micros)
    }
}

/// Throttle positions used by the dyno.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    Neutral,
    Full,
    Reverse,
}

/// Pulse widths for each [`Throttle`] position (µs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlePulses {
    pub neutral_us: u32,
    pub full_us: u32,
    pub reverse_us: u32,
}

impl ThrottlePulses {
    pub const fn pulse_us(&self, throttle: Throttle) -> u32 {
        match throttle {
            Throttle::Neutral => self.neutral_us,
            Throttle::Full => self.full_us,
            Throttle::Reverse => self.reverse_us,
        }
    }

    pub fn apply<A: Actuator>(&self, actuator: &mut A, throttle: Throttle) {
        actuator.set_pulse_us(self.pulse_us(throttle));
    }
}

impl Default for ThrottlePulses {
    fn default() -> Self {
        Self {
            neutral_us: 1500,
            full_us: 2000,
            reverse_us: 1000,
        }
    }
}
