//! Tab-separated dump format for recorded capture sessions
//!
//! One record per line: mode code, measured time, available time, validity,
//! sequence id, value. A header block of `#` comment lines describes the
//! columns; the reader skips comments and blank lines, so dumps can be
//! concatenated. Times carry six fractional digits, values ten — reloading
//! a dump reproduces every field, with timestamps within a microsecond.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::measurement::{Measurement, Mode, UnknownMode};
use crate::time::Timestamp;

/// A record line that could not be parsed.
#[derive(Error, Debug)]
pub enum RecordError {
    /// Wrong number of tab-separated fields.
    #[error("expected 6 tab-separated fields, found {0}")]
    FieldCount(usize),

    /// A field failed to parse.
    #[error("unparseable {field} field {text:?}")]
    BadField { field: &'static str, text: String },

    /// Mode code outside the three known values.
    #[error(transparent)]
    UnknownMode(#[from] UnknownMode),
}

/// Failure while reading a whole dump.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: RecordError,
    },
}

/// Write the column-description header, with an optional host identifier.
pub fn write_header<W: Write>(out: &mut W, hostname: Option<&str>) -> io::Result<()> {
    if let Some(host) = hostname {
        writeln!(out, "# host: {host}")?;
    }
    writeln!(out, "# DSP3000 record format:")?;
    writeln!(out, "# 1:  mode (0 = rate, 1 = incremental, 2 = integrated)")?;
    writeln!(out, "# 2:  measured time [s]")?;
    writeln!(out, "# 3:  available time [s]")?;
    writeln!(out, "# 4:  validity")?;
    writeln!(out, "# 5:  measurement id")?;
    writeln!(out, "# 6:  measurement [rad] or [rad/s] (depends on 1)")?;
    Ok(())
}

/// Append one measurement as a record line.
pub fn write_record<W: Write>(out: &mut W, m: &Measurement) -> io::Result<()> {
    writeln!(
        out,
        "{}\t{:.6}\t{:.6}\t{}\t{}\t{:.10}",
        m.mode.code(),
        m.measured_at.as_secs(),
        m.available_at.as_secs(),
        m.valid as u8,
        m.sequence_id,
        m.value,
    )
}

fn bad_field(field: &'static str, text: &str) -> RecordError {
    RecordError::BadField {
        field,
        text: text.to_string(),
    }
}

/// Parse one record line (neither a comment nor blank).
pub fn parse_record(line: &str) -> Result<Measurement, RecordError> {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if fields.len() != 6 {
        return Err(RecordError::FieldCount(fields.len()));
    }

    let mode_code: u8 = fields[0]
        .trim()
        .parse()
        .map_err(|_| bad_field("mode", fields[0]))?;
    let mode = Mode::try_from(mode_code)?;
    let measured_at: f64 = fields[1]
        .trim()
        .parse()
        .map_err(|_| bad_field("measured time", fields[1]))?;
    let available_at: f64 = fields[2]
        .trim()
        .parse()
        .map_err(|_| bad_field("available time", fields[2]))?;
    let valid: u8 = fields[3]
        .trim()
        .parse()
        .map_err(|_| bad_field("validity", fields[3]))?;
    let sequence_id: u64 = fields[4]
        .trim()
        .parse()
        .map_err(|_| bad_field("measurement id", fields[4]))?;
    let value: f64 = fields[5]
        .trim()
        .parse()
        .map_err(|_| bad_field("measurement", fields[5]))?;

    Ok(Measurement {
        mode,
        value,
        valid: valid != 0,
        sequence_id,
        measured_at: Timestamp::from_secs(measured_at),
        available_at: Timestamp::from_secs(available_at),
    })
}

/// Read every record from a dump, skipping comments and blank lines.
///
/// Stops at the first malformed record line; `parse_dump` iterates lines
/// itself when per-line classification is wanted instead.
pub fn read_records<R: BufRead>(input: R) -> Result<Vec<Measurement>, ReadError> {
    let mut records = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = parse_record(&line).map_err(|source| ReadError::Malformed {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Measurement {
        Measurement {
            mode: Mode::Integrated,
            value: -0.0123456789,
            valid: true,
            sequence_id: 42,
            measured_at: Timestamp::from_secs(1150000000.123456),
            available_at: Timestamp::from_secs(1150000000.123480),
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let m = sample();
        let mut buf = Vec::new();
        write_record(&mut buf, &m).unwrap();

        let line = String::from_utf8(buf).unwrap();
        let parsed = parse_record(&line).unwrap();

        assert_eq!(parsed.mode, m.mode);
        assert_eq!(parsed.valid, m.valid);
        assert_eq!(parsed.sequence_id, m.sequence_id);
        assert_relative_eq!(parsed.value, m.value, epsilon = 1e-9);
        assert_relative_eq!(
            parsed.measured_at.as_secs(),
            m.measured_at.as_secs(),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            parsed.available_at.as_secs(),
            m.available_at.as_secs(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_header_lines_are_comments() {
        let mut buf = Vec::new();
        write_header(&mut buf, Some("bench-01")).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.lines().all(|l| l.starts_with('#')));
        assert!(text.contains("bench-01"));
    }

    #[test]
    fn test_read_records_skips_header_and_blanks() {
        let mut buf = Vec::new();
        write_header(&mut buf, None).unwrap();
        write_record(&mut buf, &sample()).unwrap();
        buf.extend_from_slice(b"\n");
        write_record(&mut buf, &sample()).unwrap();

        let records = read_records(&buf[..]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence_id, 42);
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        assert!(matches!(
            parse_record("0\t1.0\t1.0\t1\t0"),
            Err(RecordError::FieldCount(5))
        ));
    }

    #[test]
    fn test_unknown_mode_code_is_rejected() {
        let err = parse_record("9\t1.0\t1.0\t1\t0\t0.5").unwrap_err();
        assert!(matches!(err, RecordError::UnknownMode(UnknownMode(9))));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dump = "# header\n0\t1.0\t1.0\t1\t0\t0.5\nnot a record\n";
        let err = read_records(dump.as_bytes()).unwrap_err();
        match err {
            ReadError::Malformed { line, .. } => assert_eq!(line, 3),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }
}
