//! Timestamp arithmetic for the free-running 32-bit microsecond counter
//!
//! The capture counter wraps every ~71.6 minutes. Every difference and every
//! ordering decision in the pipeline goes through this module so that a
//! rollover in the middle of a spool-up window is harmless.

/// Microseconds per second.
pub const US_PER_SECOND: u32 = 1_000_000;

/// Nanoseconds per microsecond.
pub const NS_PER_US: u32 = 1_000;

/// Nanoseconds per minute, the numerator of the interval-to-RPM conversion.
pub const NS_PER_MINUTE: f64 = 60e9;

/// Source of the free-running microsecond timestamp.
pub trait Clock {
    /// Current timestamp in microseconds (wraps at 2^32).
    fn now_us(&self) -> u32;
}

/// Time elapsed from `earlier` to `now`, modulo 2^32.
///
/// Exact modular difference: `elapsed(5, 0xFFFF_FFF0) == 0x15`.
#[inline]
pub const fn elapsed(now: u32, earlier: u32) -> u32 {
    now.wrapping_sub(earlier)
}

/// Serial-number ordering: true when `a` happened strictly before `b`.
///
/// Valid as long as the two timestamps are less than 2^31 µs (~35 minutes)
/// apart, which always holds for entries waiting in a capture queue.
#[inline]
pub const fn is_before(a: u32, b: u32) -> bool {
    let forward = b.wrapping_sub(a);
    forward != 0 && forward < (1 << 31)
}

/// Convert an interval in microseconds to nanoseconds, saturating.
#[inline]
pub const fn us_to_ns(us: u32) -> u32 {
    us.saturating_mul(NS_PER_US)
}

/// Revolutions per minute for one revolution lasting `interval_ns`.
///
/// Returns `None` for a zero interval. The division runs in `f64` so that
/// whole-number results come out exact.
#[inline]
pub fn rpm_from_interval_ns(interval_ns: u32) -> Option<f32> {
    if interval_ns == 0 {
        None
    } else {
        Some((NS_PER_MINUTE / f64::from(interval_ns)) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_across_rollover() {
        assert_eq!(elapsed(5, 0xFFFF_FFF0), 5 + 0x10);
        assert_eq!(elapsed(0, u32::MAX), 1);
        assert_eq!(elapsed(3000, 1000), 2000);
    }

    #[test]
    fn test_is_before() {
        assert!(is_before(30, 40));
        assert!(!is_before(40, 30));
        assert!(!is_before(7, 7));
        // 0xFFFF_FFF0 happened just before the counter wrapped to 0x10
        assert!(is_before(0xFFFF_FFF0, 0x10));
        assert!(!is_before(0x10, 0xFFFF_FFF0));
    }

    #[test]
    fn test_rpm_conversion() {
        // 2 ms per revolution = 30000 rpm
        assert_eq!(rpm_from_interval_ns(2_000_000), Some(30_000.0));
        assert_eq!(rpm_from_interval_ns(0), None);
    }

    #[test]
    fn test_us_to_ns_saturates() {
        assert_eq!(us_to_ns(600), 600_000);
        assert_eq!(us_to_ns(u32::MAX / 10), u32::MAX);
    }
}
