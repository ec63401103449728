//! Measurement container and unit conversion

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::frame::{self, ConvertError};
use crate::time::Timestamp;

/// Operating mode: which physical quantity each frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Angular rate.
    Rate,
    /// Angle change since the previous frame.
    Incremental,
    /// Angle integrated since the last zeroing.
    Integrated,
}

/// A mode code outside the three known values, seen at an input boundary
/// (record reload, user input).
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown mode code {0}")]
pub struct UnknownMode(pub u8);

impl Mode {
    /// Integer code used by the record format.
    pub fn code(self) -> u8 {
        match self {
            Mode::Rate => 0,
            Mode::Incremental => 1,
            Mode::Integrated => 2,
        }
    }

    /// Command byte that switches the device into this mode.
    pub fn command_byte(self) -> u8 {
        match self {
            Mode::Rate => frame::CMD_SWITCH_RATE,
            Mode::Incremental => frame::CMD_SWITCH_INCREMENTAL,
            Mode::Integrated => frame::CMD_SWITCH_INTEGRATED,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = UnknownMode;

    fn try_from(code: u8) -> Result<Self, UnknownMode> {
        match code {
            0 => Ok(Mode::Rate),
            1 => Ok(Mode::Incremental),
            2 => Ok(Mode::Integrated),
            other => Err(UnknownMode(other)),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rate" => Ok(Mode::Rate),
            "incremental" | "inc" => Ok(Mode::Incremental),
            "integrated" | "int" => Ok(Mode::Integrated),
            other => Err(format!(
                "unknown mode {other:?} (expected rate, incremental, or integrated)"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Rate => "rate",
            Mode::Incremental => "incremental",
            Mode::Integrated => "integrated",
        };
        f.write_str(name)
    }
}

/// One converted gyro sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Which physical quantity `value` represents.
    pub mode: Mode,
    /// Radians (angle modes) or radians per second (rate mode).
    pub value: f64,
    /// Device-reported confidence flag for this sample.
    pub valid: bool,
    /// Index of the frame within its capture session, starting at 0.
    pub sequence_id: u64,
    /// Stamped the moment the frame terminator was read.
    pub measured_at: Timestamp,
    /// When the value became visible to the application. Equal to
    /// `measured_at` today; kept separate so conversion can move off the
    /// capture thread without changing the record format.
    pub available_at: Timestamp,
}

impl Measurement {
    /// Convert one framed message into a measurement.
    ///
    /// Returns `Ok` with `valid == false` when the device flags the sample
    /// as faulted; content-level problems are hard errors (see
    /// [`ConvertError`]).
    pub fn from_frame(
        raw: &[u8],
        stamp: Timestamp,
        mode: Mode,
        sequence_id: u64,
    ) -> Result<Self, ConvertError> {
        let (degrees, validity) = frame::parse_frame_content(raw)?;
        Ok(Self {
            mode,
            value: degrees.to_radians(),
            valid: validity == frame::CHAR_VALID,
            sequence_id,
            measured_at: stamp,
            available_at: stamp,
        })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.mode {
            Mode::Rate => "rad/s",
            Mode::Incremental | Mode::Integrated => "rad",
        };
        write!(
            f,
            "[{} #{}] {:.10} {unit} ({:.6} deg) valid={} t={:.6}",
            self.mode,
            self.sequence_id,
            self.value,
            self.value.to_degrees(),
            self.valid,
            self.measured_at.as_secs(),
        )
    }
}
