//! Background capture and shared driver state
//!
//! One capture thread owns the read side of the serial link and keeps the
//! latest accepted measurement in a single mutex-guarded slot; any number
//! of client threads poll that slot. No history is kept in memory — the
//! record dump is the place for history.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use kvh::{Measurement, Mode, Timestamp};
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{debug, info, warn};

use super::framing::FrameReader;

/// Accepted frames to let pass before framing errors are logged. The device
/// needs a moment after power-up or a mode switch before clean frames
/// appear, and the first read almost always lands mid-frame.
pub const STARTUP_GRACE_FRAMES: u64 = 2;

/// Scheduling priority for the capture thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePriority {
    /// Leave the thread at the scheduler's default priority.
    #[default]
    Default,
    /// Best-effort elevation to the maximum priority for tighter
    /// timestamps. Falls back to the default priority, with a warning, when
    /// the process lacks the privilege.
    Realtime,
}

/// State shared between the capture thread and client threads.
///
/// Each field sits behind its own lock or atomic; the capture thread never
/// holds more than one at a time.
#[derive(Debug, Default)]
pub struct SharedState {
    latest: Mutex<Option<Measurement>>,
    running: AtomicBool,
    time_origin: Mutex<Option<Timestamp>>,
}

impl SharedState {
    /// Last accepted measurement, or `None` before the first one lands.
    pub fn latest(&self) -> Option<Measurement> {
        // A poisoned lock still holds a coherent value: the slot is only
        // ever overwritten whole.
        *self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn store_latest(&self, m: Measurement) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(m);
    }

    /// Whether the capture loop is (still) supposed to run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, value: bool) {
        self.running.store(value, Ordering::Release);
    }

    /// Instant of the most recent integrated-angle zeroing, if any.
    pub fn time_origin(&self) -> Option<Timestamp> {
        *self.time_origin.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_time_origin(&self, stamp: Timestamp) {
        *self.time_origin.lock().unwrap_or_else(|e| e.into_inner()) = Some(stamp);
    }
}

fn apply_priority(priority: CapturePriority) {
    if priority != CapturePriority::Realtime {
        return;
    }
    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(()) => info!("capture thread priority raised to max"),
        Err(e) => warn!(
            "could not raise capture thread priority: {e:?}; \
             timestamps may jitter more (needs CAP_SYS_NICE on Linux)"
        ),
    }
}

/// Drive the frame reader until the running flag clears.
///
/// Framing failures are logged only once [`STARTUP_GRACE_FRAMES`] frames
/// have been accepted, and are never fatal — the next iteration simply
/// tries again. The sequence counter advances once per framed message
/// whether or not conversion succeeds, so record consumers can spot
/// conversion gaps. Only valid measurements reach the shared slot; faulted
/// ones are logged and dropped.
///
/// There is no internal sleep: the loop is paced by the blocking transport
/// read.
pub fn capture_loop<R: Read>(
    mut reader: FrameReader<R>,
    mode: Mode,
    shared: &SharedState,
    priority: CapturePriority,
) {
    apply_priority(priority);
    let mut sequence_id: u64 = 0;
    debug!("capture loop started in {mode} mode");

    while shared.is_running() {
        let (stamp, raw) = match reader.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                if sequence_id > STARTUP_GRACE_FRAMES {
                    warn!("framing error: {e}");
                }
                continue;
            }
        };

        match Measurement::from_frame(raw, stamp, mode, sequence_id) {
            Ok(m) if m.valid => shared.store_latest(m),
            Ok(m) => warn!("device flagged sample as faulted: {m}"),
            Err(e) => warn!("frame conversion failed: {e}"),
        }
        sequence_id += 1;
    }

    debug!("capture loop exiting after {sequence_id} frames");
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kvh::{CR, LF};
    use std::io::{self, Cursor};

    /// Serves a scripted byte stream, then clears the running flag so the
    /// loop under test terminates instead of spinning on EOF.
    struct ScriptedPort<'a> {
        data: Cursor<Vec<u8>>,
        shared: &'a SharedState,
    }

    impl Read for ScriptedPort<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                self.shared.set_running(false);
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "script exhausted",
                ));
            }
            Ok(n)
        }
    }

    /// One on-the-wire frame: 19 content bytes, CR, LF.
    fn wire_frame(degrees: f64, validity: char) -> Vec<u8> {
        let content = format!("{degrees:>17.6} {validity}");
        assert_eq!(content.len(), 19);
        let mut bytes = content.into_bytes();
        bytes.push(CR);
        bytes.push(LF);
        bytes
    }

    fn run_loop(stream: Vec<u8>, mode: Mode) -> SharedState {
        let shared = SharedState::default();
        shared.set_running(true);
        let port = ScriptedPort {
            data: Cursor::new(stream),
            shared: &shared,
        };
        capture_loop(FrameReader::new(port), mode, &shared, CapturePriority::Default);
        shared
    }

    #[test]
    fn test_capture_stores_latest_valid_sample() {
        // The first delimiter window lacks the leading LF and is rejected,
        // which is the normal startup misalignment.
        let mut stream = Vec::new();
        for degrees in [1.0, 2.0, 3.0, 4.0] {
            stream.extend_from_slice(&wire_frame(degrees, '1'));
        }

        let shared = run_loop(stream, Mode::Rate);
        let m = shared.latest().expect("no measurement stored");
        assert_eq!(m.sequence_id, 2);
        assert_relative_eq!(m.value, 4.0f64.to_radians(), epsilon = 1e-12);
        assert_eq!(m.mode, Mode::Rate);
        assert!(m.valid);
    }

    #[test]
    fn test_faulted_samples_are_not_stored() {
        let mut stream = wire_frame(0.0, '1'); // dropped to misalignment
        stream.extend_from_slice(&wire_frame(2.0, '0'));
        stream.extend_from_slice(&wire_frame(3.0, '1'));
        stream.extend_from_slice(&wire_frame(4.0, '0'));

        let shared = run_loop(stream, Mode::Integrated);
        let m = shared.latest().expect("no measurement stored");
        // Frame 3 is the only valid aligned frame; the faulted ones still
        // consumed sequence ids 0 and 2.
        assert_eq!(m.sequence_id, 1);
        assert_relative_eq!(m.value, 3.0f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_only_faulted_samples_leaves_slot_empty() {
        let mut stream = wire_frame(0.0, '1');
        stream.extend_from_slice(&wire_frame(1.0, '0'));
        stream.extend_from_slice(&wire_frame(2.0, '0'));

        let shared = run_loop(stream, Mode::Rate);
        assert!(shared.latest().is_none());
    }

    #[test]
    fn test_loop_survives_garbage() {
        let mut stream = vec![b'~'; 100];
        stream.extend_from_slice(&wire_frame(0.0, '1')); // consumed as realignment fodder
        stream.extend_from_slice(&wire_frame(5.0, '1'));

        let shared = run_loop(stream, Mode::Rate);
        let m = shared.latest().expect("loop should recover from garbage");
        assert_relative_eq!(m.value, 5.0f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_loop_exits_immediately_when_not_running() {
        let shared = SharedState::default();
        let port = ScriptedPort {
            data: Cursor::new(wire_frame(1.0, '1')),
            shared: &shared,
        };
        capture_loop(
            FrameReader::new(port),
            Mode::Rate,
            &shared,
            CapturePriority::Default,
        );
        assert!(shared.latest().is_none());
    }

    #[test]
    fn test_store_is_never_torn() {
        let shared = SharedState::default();
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..5000u64 {
                    let stamp = Timestamp::from_secs(i as f64);
                    shared.store_latest(Measurement {
                        mode: Mode::Rate,
                        value: i as f64,
                        valid: true,
                        sequence_id: i,
                        measured_at: stamp,
                        available_at: stamp,
                    });
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..5000 {
                        if let Some(m) = shared.latest() {
                            // Every field must come from the same write
                            assert_eq!(m.value, m.sequence_id as f64);
                            assert_eq!(m.measured_at.as_secs(), m.sequence_id as f64);
                            assert_eq!(m.available_at.as_secs(), m.sequence_id as f64);
                        }
                    }
                });
            }
        });
    }

    #[test]
    fn test_time_origin_starts_unset() {
        let shared = SharedState::default();
        assert!(shared.time_origin().is_none());
        shared.set_time_origin(Timestamp::from_secs(42.0));
        assert_eq!(shared.time_origin().unwrap().as_secs(), 42.0);
    }
}
