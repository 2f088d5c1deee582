//! Values published for the display
//!
//! The display refresh loop usually runs on the other core. It never touches
//! the filters; the control loop publishes a [`Readout`] snapshot after each
//! update and the display reads the latest one.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Snapshot of everything shown on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readout {
    /// Smoothed RPM of the current or last spool-up.
    pub rpm: f32,
    /// Smoothed temperature (°C), if a probe is fitted.
    pub temperature: Option<f32>,
    /// True while a spool-up window is running.
    pub measuring: bool,
}

/// Renders a [`Readout`]. Layout and refresh rate belong to the driver.
pub trait DisplayTarget {
    fn render(&mut self, readout: &Readout);
}

/// Latest [`Readout`], shared between the control and display contexts.
pub struct SharedReadout {
    inner: Mutex<CriticalSectionRawMutex, Cell<Readout>>,
}

impl SharedReadout {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Readout {
                rpm: 0.0,
                temperature: None,
                measuring: false,
            })),
        }
    }

    pub fn publish(&self, readout: Readout) {
        self.inner.lock(|cell| cell.set(readout));
    }

    pub fn get(&self) -> Readout {
        self.inner.lock(Cell::get)
    }

    pub fn rpm(&self) -> f32 {
        self.get().rpm
    }

    pub fn temperature(&self) -> Option<f32> {
        self.get().temperature
    }

    /// Render the latest snapshot on `display`.
    pub fn refresh<D: DisplayTarget>(&self, display: &mut D) {
        let readout = self.get();
        display.render(&readout);
    }
}

impl Default for SharedReadout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(std::vec::Vec<Readout>);

    impl DisplayTarget for Recorder {
        fn render(&mut self, readout: &Readout) {
            self.0.push(*readout);
        }
    }

    #[test]
    fn test_publish_then_refresh() {
        let shared = SharedReadout::new();
        let mut display = Recorder(std::vec::Vec::new());

        shared.refresh(&mut display);
        shared.publish(Readout {
            rpm: 31_250.0,
            temperature: Some(24.5),
            measuring: true,
        });
        shared.refresh(&mut display);

        assert_eq!(display.0[0], Readout::default());
        assert_eq!(display.0[1].rpm, 31_250.0);
        assert_eq!(shared.temperature(), Some(24.5));
    }
}
