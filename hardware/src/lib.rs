//! Hardware drivers for the gyro setup.
//!
//! One driver today: the KVH DSP-3000 single-axis fiber optic gyro on a
//! serial link (typically behind an FTDI adapter). Protocol-level parsing
//! and the record format live in the `kvh` crate; this crate owns the
//! serial port, the framing state machine, and the background capture
//! thread.

pub mod dsp3000;
