//! Wall-clock timestamps for gyro measurements
//!
//! Frames are stamped with wall-clock time so recorded sessions can be
//! lined up against other sensor logs. Stored as fractional seconds since
//! the UNIX epoch; the record format serializes six fractional digits.

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock instant in fractional seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Current wall-clock time. A clock set before the epoch collapses to 0.
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(elapsed.as_secs_f64())
    }

    /// Build from fractional seconds since the UNIX epoch.
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Fractional seconds since the UNIX epoch.
    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier`. Negative if `self` precedes it.
    pub fn seconds_since(&self, earlier: Timestamp) -> f64 {
        self.0 - earlier.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_roundtrip() {
        let t = Timestamp::from_secs(1150000000.123456);
        assert_eq!(t.as_secs(), 1150000000.123456);
    }

    #[test]
    fn test_seconds_since() {
        let earlier = Timestamp::from_secs(100.0);
        let later = Timestamp::from_secs(103.5);
        assert_eq!(later.seconds_since(earlier), 3.5);
        assert_eq!(earlier.seconds_since(later), -3.5);
    }

    #[test]
    fn test_ordering() {
        assert!(Timestamp::from_secs(1.0) < Timestamp::from_secs(2.0));
    }

    #[test]
    fn test_now_is_past_2020() {
        // 2020-01-01 in UNIX seconds; catches a broken epoch base
        assert!(Timestamp::now().as_secs() > 1_577_836_800.0);
    }
}
