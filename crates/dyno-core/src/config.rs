//! Persistent dyno configuration
//!
//! Stored as a postcard blob. Every field has a default, so a board that has
//! never saved a config still runs.

use serde::{Deserialize, Serialize};

use crate::actuator::ThrottlePulses;
use crate::counter::{Calibration, CaptureMethod};
use crate::error::ConfigError;
use crate::session::SessionConfig;

/// Upper bound of an encoded [`DynoConfig`].
pub const MAX_ENCODED_LEN: usize = 64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DynoConfig {
    pub spool: SpoolConfig,
    pub throttle: ThrottlePulses,
    pub capture: CaptureConfig,
    pub control: ControlConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpoolConfig {
    /// Measurement window after the throttle opens (µs).
    pub window_us: u32,
    pub rpm_period: u32,
    pub idle_sleep_us: u32,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            window_us: 4_000_000,
            rpm_period: 16,
            idle_sleep_us: 50,
        }
    }
}

/// Period counter setup.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub method: CaptureMethod,
    pub sys_clock_hz: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            method: CaptureMethod::RiseToRise,
            sys_clock_hz: 125_000_000,
        }
    }
}

/// Cadence of the control and display loops.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlConfig {
    pub loop_period_ms: u32,
    pub display_refresh_ms: u32,
    pub temperature_period: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: 50,
            display_refresh_ms: 66,
            temperature_period: 32,
        }
    }
}

impl DynoConfig {
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            window_us: self.spool.window_us,
            rpm_period: self.spool.rpm_period,
            idle_sleep_us: self.spool.idle_sleep_us,
            throttle: self.throttle,
        }
    }

    pub fn calibration(&self) -> Calibration {
        Calibration::for_method(self.capture.method, self.capture.sys_clock_hz)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spool.window_us == 0 {
            return Err(ConfigError::Invalid("window must be non-zero"));
        }
        if self.spool.window_us >= 1 << 31 {
            return Err(ConfigError::Invalid("window exceeds half the timestamp range"));
        }
        if self.capture.sys_clock_hz == 0 {
            return Err(ConfigError::Invalid("system clock must be non-zero"));
        }
        Ok(())
    }

    /// Encode into `buf`, returning the used prefix.
    pub fn to_slice<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(ConfigError::Encode)
    }

    /// Decode and validate a stored config.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DynoConfig::default();
        let session = config.session();
        assert_eq!(session.window_us, 4_000_000);
        assert_eq!(session.rpm_period, 16);
        assert_eq!(session.throttle.full_us, 2000);
        assert_eq!(config.control.temperature_period, 32);
        assert_eq!(config.calibration().ns_per_tick, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_persisted_config_restores() {
        let mut config = DynoConfig::default();
        config.spool.window_us = 3_000_000;
        config.capture.method = CaptureMethod::HighAndLow;

        let mut buf = [0u8; MAX_ENCODED_LEN];
        let used = config.to_slice(&mut buf).unwrap().len();
        let restored = DynoConfig::from_bytes(&buf[..used]).unwrap();
        assert_eq!(restored, config);
        assert_eq!(restored.calibration().fixed_offset_ns, 64);
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let mut buf = [0u8; MAX_ENCODED_LEN];
        let used = DynoConfig::default().to_slice(&mut buf).unwrap().len();
        assert!(matches!(
            DynoConfig::from_bytes(&buf[..used - 1]),
            Err(ConfigError::Decode(_))
        ));
    }

    #[test]
    fn test_zero_window_is_invalid() {
        let mut config = DynoConfig::default();
        config.spool.window_us = 0;

        let mut buf = [0u8; MAX_ENCODED_LEN];
        let used = config.to_slice(&mut buf).unwrap().len();
        assert_eq!(
            DynoConfig::from_bytes(&buf[..used]),
            Err(ConfigError::Invalid("window must be non-zero"))
        );
    }

    #[test]
    fn test_small_buffer_fails_to_encode() {
        let mut buf = [0u8; 2];
        assert!(matches!(
            DynoConfig::default().to_slice(&mut buf),
            Err(ConfigError::Encode(_))
        ));
    }
}
