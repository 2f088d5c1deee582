//! Hardware-independent core library for the dyno spool-up RPM meter
//!
//! This crate holds the capture-to-estimate pipeline: edge detection on the
//! capture context, a lock-protected timestamp queue shared with the main loop,
//! an earliest-first merge across sensors, exponential smoothing, and the
//! spool-up session state machine that turns intervals into a final RPM.
//!
//! It is `#![no_std]` so it compiles on the microcontroller and on desktop
//! hosts (for the simulator and tests). Hardware is reached only through the
//! traits in [`counter`], [`actuator`] and `embedded-hal`.

#![cfg_attr(not(test), no_std)]

pub mod actuator;
pub mod capture;
pub mod config;
pub mod controller;
pub mod counter;
pub mod error;
pub mod filter;
pub mod readout;
pub mod session;
pub mod time;

pub use capture::{CaptureEntry, RearmSignal, Sensor, SensorBank, SensorMerger, TimestampQueue};
pub use config::DynoConfig;
pub use error::{CaptureError, ConfigError, SessionError};
pub use filter::Ema;
pub use session::{SessionState, SpoolReport, SpoolSession};
