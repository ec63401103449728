//! Stream measurements from a DSP-3000 gyro to the console, optionally
//! recording them to a dump file readable by `parse_dump`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use hardware::dsp3000::{CapturePriority, Dsp3000};
use kvh::{record, Mode, Timestamp};
use tracing::info;

/// DSP-3000 gyro capture tool
#[derive(Parser, Debug)]
#[command(name = "listen_gyro")]
#[command(about = "Stream measurements from a KVH DSP-3000 fiber optic gyro")]
#[command(version)]
struct Args {
    /// Serial port the gyro is attached to
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Operating mode: rate, incremental, or integrated
    #[arg(long, default_value = "rate")]
    mode: Mode,

    /// Zero the integrated angle before capturing
    #[arg(long)]
    zero: bool,

    /// Latitude in degrees; prints the earth-rate compensation term next to
    /// integrated-angle samples
    #[arg(long)]
    latitude_deg: Option<f64>,

    /// How long to capture, in seconds (0 = run until killed)
    #[arg(long, default_value = "10")]
    seconds: f64,

    /// Record samples to this dump file
    #[arg(short, long)]
    output: Option<String>,

    /// Try to run the capture thread at realtime priority
    #[arg(long)]
    realtime: bool,

    /// Read a single frame and exit instead of capturing continuously
    #[arg(long)]
    oneshot: bool,

    /// Serial read timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut gyro = Dsp3000::open(&args.port, Duration::from_millis(args.timeout_ms))?;
    gyro.switch_mode(args.mode)?;
    if args.zero {
        gyro.zero_integrated_angle()?;
        info!("integrated angle zeroed");
    }

    if args.oneshot {
        let m = gyro.sample_once(args.mode)?;
        println!("{m}");
        return Ok(());
    }

    gyro.resync()?;
    let priority = if args.realtime {
        CapturePriority::Realtime
    } else {
        CapturePriority::Default
    };
    gyro.start_capture(args.mode, priority)?;

    let mut dump = match &args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            record::write_header(&mut writer, None)?;
            Some(writer)
        }
        None => None,
    };

    let started = Instant::now();
    let mut last_seq: Option<u64> = None;
    while args.seconds <= 0.0 || started.elapsed().as_secs_f64() < args.seconds {
        thread::sleep(Duration::from_millis(100));
        let Some(m) = gyro.latest() else { continue };
        if last_seq == Some(m.sequence_id) {
            continue;
        }
        last_seq = Some(m.sequence_id);

        match args.latitude_deg {
            Some(lat) if args.mode == Mode::Integrated => {
                let comp = gyro
                    .earth_rate_compensation(Timestamp::now(), lat.to_radians())
                    .unwrap_or(0.0);
                info!("{m} compensation={comp:.10} rad");
            }
            _ => info!("{m}"),
        }
        if let Some(writer) = dump.as_mut() {
            record::write_record(writer, &m)?;
        }
    }

    gyro.stop_capture()?;
    if let Some(mut writer) = dump {
        writer.flush()?;
        info!("dump written to {}", args.output.as_deref().unwrap_or(""));
    }
    Ok(())
}
