//! Error types for the capture pipeline
//!
//! Only initialization and config loading can fail. An empty queue or a counter with nothing
//! buffered is routine and surfaces as `None`; overwritten queue entries are
//! visible through [`TimestampQueue::overwritten`](crate::TimestampQueue::overwritten).

use core::fmt::Write;

use thiserror_no_std::Error;

/// Failure of a capture peripheral or input pin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("{peripheral} failed to initialize: {details}")]
    InitFailed {
        peripheral: &'static str,
        details: heapless::String<64>,
    },
    #[error("failed to read level of pin {pin}")]
    Pin { pin: u8 },
}

impl CaptureError {
    /// Build an [`CaptureError::InitFailed`], truncating `details` to fit.
    pub fn init_failed(peripheral: &'static str, details: impl core::fmt::Display) -> Self {
        let mut text = heapless::String::<64>::new();
        let _ = write!(Truncating(&mut text), "{}", details);
        CaptureError::InitFailed {
            peripheral,
            details: text,
        }
    }
}

/// Writer that keeps as much text as fits and drops the rest.
struct Truncating<'a, const N: usize>(&'a mut heapless::String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Failure to start or drive a spool-up session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is already measuring")]
    NotIdle,
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
}

/// Failure to persist or restore a [`DynoConfig`](crate::DynoConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to encode config: {0}")]
    Encode(postcard::Error),
    #[error("failed to decode config: {0}")]
    Decode(postcard::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
