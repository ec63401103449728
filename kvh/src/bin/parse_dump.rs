use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};

use kvh::record;
use kvh::Mode;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <dump_file>", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    let file = File::open(path).expect("Failed to open file");
    let reader = BufReader::new(file);

    let mut total = 0usize;
    let mut valid = 0usize;
    let mut faulted = 0usize;
    let mut malformed = 0usize;
    let mut by_mode = [0usize; 3];
    let mut first_stamp: Option<f64> = None;
    let mut last_stamp: Option<f64> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.expect("Failed to read line");
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match record::parse_record(&line) {
            Ok(m) => {
                total += 1;
                if m.valid {
                    valid += 1;
                } else {
                    faulted += 1;
                }
                by_mode[m.mode.code() as usize] += 1;

                let stamp = m.measured_at.as_secs();
                if first_stamp.is_none() {
                    first_stamp = Some(stamp);
                }
                last_stamp = Some(stamp);
            }
            Err(e) => {
                malformed += 1;
                eprintln!("line {}: {e}", idx + 1);
            }
        }
    }

    println!("Parsed {total} records from {path} ({malformed} malformed lines)");
    println!("Validity: {valid} valid, {faulted} faulted");
    for mode in [Mode::Rate, Mode::Incremental, Mode::Integrated] {
        println!("  {mode}: {}", by_mode[mode.code() as usize]);
    }

    if let (Some(first), Some(last)) = (first_stamp, last_stamp) {
        let span = last - first;
        println!("Span: {span:.3} s");
        if span > 0.0 && total > 1 {
            println!("Mean rate: {:.1} Hz", (total as f64 - 1.0) / span);
        }
    }
}
