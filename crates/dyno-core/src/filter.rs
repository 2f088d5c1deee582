//! Exponential moving average with a bounded warm-up

/// Exponential moving average.
///
/// Until `period` samples have been seen the filter is an exact running mean;
/// after that every update blends in the new sample with weight `1/period`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    value: f32,
    count: u32,
    period: u32,
}

impl Ema {
    /// Create a filter with the given period, starting at zero.
    ///
    /// A period of zero is treated as one (no smoothing).
    pub const fn new(period: u32) -> Self {
        Self {
            value: 0.0,
            count: 0,
            period: if period == 0 { 1 } else { period },
        }
    }

    /// Feed one sample.
    #[inline]
    pub fn update(&mut self, x: f32) {
        if self.count < self.period {
            self.count += 1;
        }
        self.value += (x - self.value) / self.count as f32;
    }

    /// Current smoothed value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.value
    }

    /// Restart the warm-up from `v`.
    pub fn reset(&mut self, v: f32) {
        self.value = v;
        self.count = 0;
    }

    /// Samples seen so far, saturating at the period.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// True once the filter behaves as a true exponential filter.
    pub fn is_warm(&self) -> bool {
        self.count == self.period
    }
}
