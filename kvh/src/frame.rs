//! DSP-3000 frame format constants and content parsing
//!
//! The gyro streams one fixed-length ASCII frame per sample: optional
//! leading spaces, a signed decimal value in degrees (or deg/s depending on
//! the operating mode), separating whitespace, and a single validity
//! character, terminated by CR LF. Single-byte commands select the operating
//! mode or zero the integrated angle; the device never acknowledges them.

use thiserror::Error;

/// Total frame length in bytes, terminator included.
pub const FRAME_LEN: usize = 21;

/// Carriage return, the terminator byte the delimiter strategy scans for.
pub const CR: u8 = 0x0D;

/// Line feed, the trailing terminator byte and resync marker.
pub const LF: u8 = 0x0A;

/// Command byte: switch to rate output (deg/s).
pub const CMD_SWITCH_RATE: u8 = b'R';

/// Command byte: switch to incremental angle output.
pub const CMD_SWITCH_INCREMENTAL: u8 = b'A';

/// Command byte: switch to integrated angle output.
pub const CMD_SWITCH_INTEGRATED: u8 = b'P';

/// Command byte: zero the integrated angle.
pub const CMD_ZERO_INTEGRATED: u8 = b'Z';

/// Validity character reported for a trustworthy sample.
pub const CHAR_VALID: char = '1';

/// Validity character reported when the sensing loop faults.
pub const CHAR_FAULT: char = '0';

/// Content-level parse failures.
///
/// These are hard failures: the frame was correctly delimited but its
/// content cannot be turned into a measurement. A device-reported fault
/// flag is NOT an error — it parses fine and surfaces as an invalid
/// measurement.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Frame bytes are not ASCII text (line noise inside a clean frame).
    #[error("frame content is not ASCII text")]
    NotAscii,

    /// Every well-formed value carries a decimal point; its absence means
    /// the frame is not a measurement at all.
    #[error("no decimal point in frame content")]
    MissingDecimalPoint,

    /// The value token failed to parse as a number.
    #[error("unparseable measurement value {0:?}")]
    BadNumber(String),

    /// Fewer than two tokens: the validity character is missing.
    #[error("missing validity character")]
    MissingValidity,
}

/// Parse framed content into a degrees value and its validity character.
///
/// Leading and trailing whitespace (including stray terminator bytes from
/// either framing strategy) is skipped. Exactly two tokens must parse; the
/// validity character is the first byte of the second token.
///
/// # Example
///
/// ```
/// use kvh::parse_frame_content;
///
/// let (degrees, validity) = parse_frame_content(b"  12.345 1\r").unwrap();
/// assert_eq!(degrees, 12.345);
/// assert_eq!(validity, '1');
/// ```
pub fn parse_frame_content(raw: &[u8]) -> Result<(f64, char), ConvertError> {
    let text = std::str::from_utf8(raw).map_err(|_| ConvertError::NotAscii)?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());

    if !text.contains('.') {
        return Err(ConvertError::MissingDecimalPoint);
    }

    let mut tokens = text.split_ascii_whitespace();
    let value_token = tokens.next().ok_or(ConvertError::MissingDecimalPoint)?;
    let degrees: f64 = value_token
        .parse()
        .map_err(|_| ConvertError::BadNumber(value_token.to_string()))?;
    let validity = tokens
        .next()
        .and_then(|t| t.chars().next())
        .ok_or(ConvertError::MissingValidity)?;

    Ok((degrees, validity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_frame() {
        let (degrees, validity) = parse_frame_content(b"   -0.016700   1\r").unwrap();
        assert_eq!(degrees, -0.0167);
        assert_eq!(validity, '1');
    }

    #[test]
    fn test_parse_fault_flag() {
        let (degrees, validity) = parse_frame_content(b"  12.345 0\r").unwrap();
        assert_eq!(degrees, 12.345);
        assert_eq!(validity, CHAR_FAULT);
    }

    #[test]
    fn test_leading_terminator_bytes_are_skipped() {
        // The delimiter strategy hands over frames that start with the
        // previous frame's LF.
        let (degrees, validity) = parse_frame_content(b"\n  12.345 1").unwrap();
        assert_eq!(degrees, 12.345);
        assert_eq!(validity, '1');
    }

    #[test]
    fn test_missing_decimal_point_is_hard_failure() {
        assert!(matches!(
            parse_frame_content(b"  12345 1\r"),
            Err(ConvertError::MissingDecimalPoint)
        ));
        // Validity character does not rescue it
        assert!(matches!(
            parse_frame_content(b"  12345 0\r"),
            Err(ConvertError::MissingDecimalPoint)
        ));
    }

    #[test]
    fn test_empty_frame_fails() {
        assert!(parse_frame_content(b"").is_err());
        assert!(parse_frame_content(b"   \r\n").is_err());
    }

    #[test]
    fn test_missing_validity_fails() {
        assert!(matches!(
            parse_frame_content(b"  12.345  \r"),
            Err(ConvertError::MissingValidity)
        ));
    }

    #[test]
    fn test_garbage_value_fails() {
        assert!(matches!(
            parse_frame_content(b"  1b.3c5 1\r"),
            Err(ConvertError::BadNumber(_))
        ));
    }

    #[test]
    fn test_non_ascii_fails() {
        assert!(matches!(
            parse_frame_content(&[0xFF, 0xFE, b'.', b' ', b'1']),
            Err(ConvertError::NotAscii)
        ));
    }
}
