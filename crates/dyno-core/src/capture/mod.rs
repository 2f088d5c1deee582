//! Edge capture: detection, queueing and merging
//!
//! The capture context owns the [`Sensor`]s (usually through a
//! [`SensorBank`]) and pushes into [`TimestampQueue`]s. The main loop drains
//! one queue directly or several through a [`SensorMerger`].

pub mod merger;
pub mod queue;
pub mod sensor;

pub use merger::SensorMerger;
pub use queue::{CaptureEntry, DEFAULT_QUEUE_CAPACITY, TimestampQueue};
pub use sensor::{RearmSignal, Sensor, SensorBank};
