//! Frame acquisition from the serial byte stream
//!
//! The device emits one fixed-length ASCII frame per sample: 19 content
//! bytes followed by CR LF, [`FRAME_LEN`] bytes in total. Two strategies
//! are provided:
//!
//! - a delimiter-driven reader that scans byte-by-byte for the CR and
//!   stamps the instant the terminator arrives (used by the capture loop);
//! - a block reader that pulls a whole frame in one read and stamps after
//!   the read (used for one-shot sampling after a resync).
//!
//! The two sit one byte out of phase on the wire: scanning for CR consumes
//! a `[LF][content][CR]` window while an LF-aligned block read consumes
//! `[content][CR][LF]`. Both windows are [`FRAME_LEN`] bytes and content
//! parsing strips terminator bytes at either end, so they convert
//! identically.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use kvh::{Timestamp, CR, FRAME_LEN, LF};
use thiserror::Error;
use tracing::trace;

/// Framing failures.
///
/// The delimiter strategy clears the internal buffer on any failure; the
/// block strategy keeps the received bytes on a terminator mismatch so
/// callers can inspect them via [`FrameReader::last_bytes`].
#[derive(Error, Debug)]
pub enum FramingError {
    /// Transport read failed or came up short.
    #[error("serial read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Terminator seen at the wrong offset.
    #[error("frame length {actual} != {expected} (terminator included)")]
    BadLength { expected: usize, actual: usize },

    /// A frame's worth of bytes went by without a terminator.
    #[error("no terminator within {FRAME_LEN} bytes")]
    Overflow,

    /// Block read did not end on the expected terminator byte.
    #[error("frame does not end in LF")]
    MissingTerminator,
}

/// Frame reader over a blocking byte source.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a byte source.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(2 * FRAME_LEN),
        }
    }

    /// Bytes held from the most recent read attempt.
    ///
    /// Populated after a successful read and after a block read that failed
    /// terminator validation; empty after delimiter-strategy failures.
    pub fn last_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Delimiter-driven strategy: scan byte-by-byte for CR.
    ///
    /// The timestamp is taken the moment the terminator byte is read, as
    /// close as the host can get to the sampling instant. A CR anywhere but
    /// at byte [`FRAME_LEN`] rejects the frame; so does running a frame's
    /// worth of bytes past the last terminator. The returned slice excludes
    /// the CR.
    pub fn read_frame(&mut self) -> Result<(Timestamp, &[u8]), FramingError> {
        self.buf.clear();
        let mut byte = [0u8; 1];

        loop {
            if let Err(e) = self.inner.read_exact(&mut byte) {
                self.buf.clear();
                return Err(e.into());
            }

            if byte[0] == CR {
                let stamp = Timestamp::now();
                let actual = self.buf.len() + 1;
                if actual != FRAME_LEN {
                    self.buf.clear();
                    return Err(FramingError::BadLength {
                        expected: FRAME_LEN,
                        actual,
                    });
                }
                return Ok((stamp, self.buf.as_slice()));
            }

            if self.buf.len() >= FRAME_LEN {
                self.buf.clear();
                return Err(FramingError::Overflow);
            }
            self.buf.push(byte[0]);
        }
    }

    /// Block strategy: one [`FRAME_LEN`]-byte read.
    ///
    /// Stamps after the read completes, so the stamp lags the sampling
    /// instant by up to one frame time. On a short read the buffer is
    /// cleared; on a terminator mismatch the bytes are kept for inspection.
    /// The returned slice excludes the LF.
    pub fn read_frame_block(&mut self) -> Result<(Timestamp, &[u8]), FramingError> {
        self.buf.clear();
        self.buf.resize(FRAME_LEN, 0);

        if let Err(e) = self.inner.read_exact(&mut self.buf) {
            self.buf.clear();
            return Err(e.into());
        }
        let stamp = Timestamp::now();

        if self.buf[FRAME_LEN - 1] != LF {
            return Err(FramingError::MissingTerminator);
        }
        Ok((stamp, &self.buf[..FRAME_LEN - 1]))
    }

    /// Discard bytes until an LF goes by, realigning with frame boundaries
    /// after a framing error.
    ///
    /// Best effort: never stamps and never reports an outcome. The pause
    /// between bytes keeps a saturated link from spinning the CPU; `cancel`
    /// (when given) aborts the scan once the flag clears.
    pub fn resync(&mut self, pause: Duration, cancel: Option<&AtomicBool>) {
        let mut byte = [0u8; 1];
        loop {
            if let Some(flag) = cancel {
                if !flag.load(Ordering::Acquire) {
                    return;
                }
            }
            match self.inner.read_exact(&mut byte) {
                Ok(()) if byte[0] == LF => return,
                Ok(()) => thread::sleep(pause),
                Err(e) => {
                    trace!("resync read ended: {e}");
                    return;
                }
            }
        }
    }
}
