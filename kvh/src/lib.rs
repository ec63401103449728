//! KVH DSP-3000 gyro protocol parsing
//!
//! This crate provides the device-independent half of the DSP-3000 driver:
//! frame content parsing, unit conversion to radians, the earth-rate
//! compensation term, and the tab-separated record format used to persist
//! capture sessions. Serial I/O and the background capture thread live in
//! the `hardware` crate.

mod earth_rate;
mod frame;
mod measurement;
pub mod record;
mod time;

pub use earth_rate::{earth_rate_compensation, CompensationError, EARTH_RATE_RAD_PER_SEC};
pub use frame::{
    parse_frame_content, ConvertError, CHAR_FAULT, CHAR_VALID, CMD_SWITCH_INCREMENTAL,
    CMD_SWITCH_INTEGRATED, CMD_SWITCH_RATE, CMD_ZERO_INTEGRATED, CR, FRAME_LEN, LF,
};
pub use measurement::{Measurement, Mode, UnknownMode};
pub use time::Timestamp;
