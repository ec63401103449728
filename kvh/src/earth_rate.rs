//! Earth-rotation compensation for integrated-angle drift
//!
//! A fiber optic gyro senses the earth's rotation as a constant rate bias
//! proportional to the sine of the local latitude. Integrated-angle
//! readings therefore drift from the moment the angle was zeroed; this
//! module computes the term to add back.

use thiserror::Error;

use crate::time::Timestamp;

/// Earth's sidereal rotation rate in radians per second (15.04107 deg/h).
pub const EARTH_RATE_RAD_PER_SEC: f64 = 15.04107 * std::f64::consts::PI / 180.0 / 3600.0;

/// Precondition failures of the compensation computation.
#[derive(Error, Debug)]
pub enum CompensationError {
    /// The integrated angle was never zeroed, so there is no reference
    /// instant to integrate from.
    #[error("time origin not initialized (zero the integrated angle first)")]
    OriginUnset,

    /// `now` precedes the zeroing instant — a caller logic error, not
    /// something to clamp silently.
    #[error("current time {now:.6} precedes time origin {origin:.6}")]
    TimeBeforeOrigin { now: f64, origin: f64 },
}

/// Compensation to add to an integrated angle, in radians.
///
/// `origin` is the instant the integrated angle was zeroed and `latitude`
/// is in radians. On error no compensation applies; `unwrap_or(0.0)` is the
/// safe default for callers that only want a best-effort correction.
pub fn earth_rate_compensation(
    origin: Option<Timestamp>,
    now: Timestamp,
    latitude: f64,
) -> Result<f64, CompensationError> {
    let origin = origin.ok_or(CompensationError::OriginUnset)?;

    let elapsed = now.seconds_since(origin);
    if elapsed < 0.0 {
        return Err(CompensationError::TimeBeforeOrigin {
            now: now.as_secs(),
            origin: origin.as_secs(),
        });
    }

    Ok(EARTH_RATE_RAD_PER_SEC * elapsed * latitude.sin())
}
