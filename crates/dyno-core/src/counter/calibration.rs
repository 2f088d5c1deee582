use serde::{Deserialize, Serialize};

/// Clock cycles per iteration of a capture program's counting loop.
const CYCLES_PER_TICK: u32 = 2;

const NS_PER_SECOND: u32 = 1_000_000_000;

/// Edge direction that closed an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Rising,
    Falling,
}

impl Polarity {
    pub const fn flipped(self) -> Self {
        match self {
            Self::Rising => Self::Falling,
            Self::Falling => Self::Rising,
        }
    }

    /// One-letter tag used in capture traces.
    pub const fn tag(self) -> char {
        match self {
            Self::Rising => 'r',
            Self::Falling => 'f',
        }
    }
}

/// Capture program loaded into the period counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMethod {
    /// Rising edge to rising edge.
    RiseToRise,
    /// Falling edge to falling edge.
    FallToFall,
    /// High duration and low duration reported as separate halves.
    HighAndLow,
}

impl CaptureMethod {
    /// Cycles spent outside the counting loop per reported period.
    ///
    /// Measured on hardware; do not tune. Edge-to-edge programs spend one
    /// cycle on init and two on the push. The level program spends four per
    /// half and a period is two halves.
    pub const fn overhead_cycles(self) -> u32 {
        match self {
            Self::RiseToRise => 3,
            Self::FallToFall => 3,
            Self::HighAndLow => 8,
        }
    }

    /// Edge reported for the first interval after start.
    pub const fn initial_edge(self) -> Polarity {
        match self {
            Self::RiseToRise => Polarity::Rising,
            Self::FallToFall | Self::HighAndLow => Polarity::Falling,
        }
    }

    /// True when each FIFO word is half a period.
    pub const fn reports_halves(self) -> bool {
        matches!(self, Self::HighAndLow)
    }
}

/// Conversion from raw counter ticks to nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub method: CaptureMethod,
    pub ns_per_tick: u32,
    pub fixed_offset_ns: u32,
}

impl Calibration {
    /// Calibration of `method` at a system clock of `sys_clock_hz`.
    ///
    /// At 125 MHz a rise-to-rise count converts as `ticks * 16 + 24` ns.
    pub const fn for_method(method: CaptureMethod, sys_clock_hz: u32) -> Self {
        let hz = if sys_clock_hz == 0 { 1 } else { sys_clock_hz };
        let ns_per_cycle = NS_PER_SECOND / hz;
        Self {
            method,
            ns_per_tick: CYCLES_PER_TICK * ns_per_cycle,
            fixed_offset_ns: method.overhead_cycles() * ns_per_cycle,
        }
    }

    /// Saturating `ticks * ns_per_tick + fixed_offset_ns`.
    #[inline]
    pub const fn ticks_to_nanoseconds(&self, ticks: u32) -> u32 {
        ticks
            .saturating_mul(self.ns_per_tick)
            .saturating_add(self.fixed_offset_ns)
    }
}
