//! KVH DSP-3000 single-axis fiber optic gyro driver
//!
//! # Protocol overview
//!
//! The DSP-3000 streams one fixed-length ASCII frame per sample over a
//! 38400 baud 8N1 serial link: optional padding spaces, a signed decimal
//! value in degrees (or deg/s), whitespace, and a validity character,
//! terminated by CR LF. Single-byte commands switch the reported quantity
//! (rate / incremental angle / integrated angle) or zero the integrated
//! angle; the device never acknowledges a command.
//!
//! The driver splits the port with `try_clone`: a background capture thread
//! owns the read side and publishes the latest accepted measurement, while
//! the [`Dsp3000`] context keeps the write side for commands. See
//! [`capture_loop`] for the loop itself and the `kvh` crate for frame
//! content parsing and the record format.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use hardware::dsp3000::{CapturePriority, Dsp3000};
//! use kvh::Mode;
//!
//! let mut gyro = Dsp3000::open("/dev/ttyUSB0", Duration::from_secs(2))?;
//! gyro.switch_mode(Mode::Rate)?;
//! gyro.start_capture(Mode::Rate, CapturePriority::Default)?;
//!
//! std::thread::sleep(Duration::from_millis(200));
//! if let Some(m) = gyro.latest() {
//!     println!("{m}");
//! }
//!
//! gyro.stop_capture()?;
//! # Ok::<(), hardware::dsp3000::DriverError>(())
//! ```

mod capture;
mod framing;

pub use capture::{capture_loop, CapturePriority, SharedState, STARTUP_GRACE_FRAMES};
pub use framing::{FrameReader, FramingError};

use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use kvh::{
    earth_rate_compensation, CompensationError, ConvertError, Measurement, Mode, Timestamp,
    CMD_ZERO_INTEGRATED,
};
use serialport::SerialPort;
use thiserror::Error;
use tracing::{debug, info};

/// Serial line rate the DSP-3000 ships with.
pub const BAUD_RATE: u32 = 38_400;

/// Inter-byte pause while scanning for a frame boundary.
const RESYNC_PAUSE: Duration = Duration::from_micros(10);

/// Driver-level errors.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Opening or cloning the serial port failed.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Byte-level read/write failed (a short write counts).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Could not frame a message from the stream.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Framed message had unparseable content.
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// The capture thread owns the read side right now.
    #[error("capture already running")]
    CaptureRunning,

    /// The capture thread panicked before it could be joined.
    #[error("capture thread panicked")]
    CapturePanicked,
}

/// Driver context for one DSP-3000.
///
/// Owns the command (write) side of the serial link plus the state shared
/// with the capture thread. Each instance is independent — two gyros on two
/// ports get two contexts.
pub struct Dsp3000 {
    port: Box<dyn SerialPort>,
    shared: Arc<SharedState>,
    capture: Option<JoinHandle<()>>,
}

impl Dsp3000 {
    /// Open the gyro's serial port at the device's fixed 38400 baud.
    ///
    /// `timeout` bounds every blocking read; a stalled link surfaces as a
    /// framing failure once per timeout period rather than hanging forever.
    pub fn open(path: &str, timeout: Duration) -> Result<Self, DriverError> {
        let port = serialport::new(path, BAUD_RATE).timeout(timeout).open()?;
        debug!("opened {path} at {BAUD_RATE} baud");
        Ok(Self {
            port,
            shared: Arc::new(SharedState::default()),
            capture: None,
        })
    }

    /// Handle to the state shared with the capture thread, for client
    /// threads that poll [`SharedState::latest`] directly.
    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    /// Last accepted measurement, or `None` before the first one lands.
    pub fn latest(&self) -> Option<Measurement> {
        self.shared.latest()
    }

    /// Whether a capture thread is running.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some() && self.shared.is_running()
    }

    /// Instant of the most recent integrated-angle zeroing, if any.
    pub fn time_origin(&self) -> Option<Timestamp> {
        self.shared.time_origin()
    }

    fn send_command(&mut self, cmd: u8) -> Result<(), DriverError> {
        let written = self.port.write(&[cmd])?;
        if written != 1 {
            return Err(DriverError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "command byte not accepted",
            )));
        }
        Ok(())
    }

    /// Switch the reported quantity. Takes effect on the next frame; frames
    /// already in flight still carry the previous mode's units.
    pub fn switch_mode(&mut self, mode: Mode) -> Result<(), DriverError> {
        debug!("switching to {mode} mode");
        self.send_command(mode.command_byte())
    }

    /// [`switch_mode`](Self::switch_mode) with [`Mode::Rate`].
    pub fn switch_to_rate(&mut self) -> Result<(), DriverError> {
        self.switch_mode(Mode::Rate)
    }

    /// [`switch_mode`](Self::switch_mode) with [`Mode::Incremental`].
    pub fn switch_to_incremental(&mut self) -> Result<(), DriverError> {
        self.switch_mode(Mode::Incremental)
    }

    /// [`switch_mode`](Self::switch_mode) with [`Mode::Integrated`].
    pub fn switch_to_integrated(&mut self) -> Result<(), DriverError> {
        self.switch_mode(Mode::Integrated)
    }

    /// Zero the integrated angle and restart the compensation clock.
    ///
    /// The time origin is recorded before the command byte goes out, so the
    /// origin never postdates the instant the device zeroes at. A failed
    /// write leaves the new origin in place.
    pub fn zero_integrated_angle(&mut self) -> Result<(), DriverError> {
        self.shared.set_time_origin(Timestamp::now());
        self.send_command(CMD_ZERO_INTEGRATED)
    }

    /// Earth-rate compensation for the stored time origin at `latitude`
    /// (radians). See [`kvh::earth_rate_compensation`].
    pub fn earth_rate_compensation(
        &self,
        now: Timestamp,
        latitude: f64,
    ) -> Result<f64, CompensationError> {
        earth_rate_compensation(self.shared.time_origin(), now, latitude)
    }

    /// Realign with the frame boundaries, discarding whatever partial frame
    /// is in flight. Refused while a capture runs (the loop owns the read
    /// side).
    pub fn resync(&mut self) -> Result<(), DriverError> {
        if self.is_capturing() {
            return Err(DriverError::CaptureRunning);
        }
        FrameReader::new(&mut self.port).resync(RESYNC_PAUSE, None);
        Ok(())
    }

    /// One measurement without starting a capture session: realign, then a
    /// single block-strategy read. The sequence id is always 0.
    pub fn sample_once(&mut self, mode: Mode) -> Result<Measurement, DriverError> {
        if self.is_capturing() {
            return Err(DriverError::CaptureRunning);
        }
        let mut reader = FrameReader::new(&mut self.port);
        reader.resync(RESYNC_PAUSE, None);
        let (stamp, raw) = reader.read_frame_block()?;
        Ok(Measurement::from_frame(raw, stamp, mode, 0)?)
    }

    /// Start the background capture thread.
    ///
    /// The read side of the port is cloned off for the thread; commands
    /// keep using this context's handle. With
    /// [`CapturePriority::Realtime`] the thread attempts to raise its own
    /// scheduling priority, logging a warning and continuing at default
    /// priority if the process lacks the privilege.
    pub fn start_capture(
        &mut self,
        mode: Mode,
        priority: CapturePriority,
    ) -> Result<(), DriverError> {
        if self.capture.is_some() {
            return Err(DriverError::CaptureRunning);
        }

        let reader = self.port.try_clone()?;
        let shared = Arc::clone(&self.shared);
        self.shared.set_running(true);

        let spawned = thread::Builder::new()
            .name("dsp3000-capture".into())
            .spawn(move || capture_loop(FrameReader::new(reader), mode, &shared, priority));

        match spawned {
            Ok(handle) => {
                self.capture = Some(handle);
                info!("capture started in {mode} mode");
                Ok(())
            }
            Err(e) => {
                self.shared.set_running(false);
                Err(e.into())
            }
        }
    }

    /// Stop the capture thread and wait for it to exit.
    ///
    /// The in-flight blocking read is not cancelled: the join can take
    /// until the port yields a byte, errors, or hits its timeout.
    pub fn stop_capture(&mut self) -> Result<(), DriverError> {
        self.shared.set_running(false);
        match self.capture.take() {
            Some(handle) => {
                debug!("waiting for capture thread to exit");
                handle.join().map_err(|_| DriverError::CapturePanicked)
            }
            None => Ok(()),
        }
    }
}

impl Drop for Dsp3000 {
    /// Signal the capture thread to exit. The thread is detached rather
    /// than joined here; [`stop_capture`](Self::stop_capture) is the clean
    /// shutdown path.
    fn drop(&mut self) {
        self.shared.set_running(false);
    }
}
