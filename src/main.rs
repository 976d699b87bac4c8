//! Pressure Recorder
//!
//! Locates the Teensy pressure rig, records its telemetry to a timestamped CSV
//! log until Ctrl+C, then optionally plots the recording.
//!
//! Usage:
//!   pressure-recorder --output-dir runs --clock-rate 1000

use clap::Parser;
use serial_pressure_recorder::config::{
    DEFAULT_BAUD, DEFAULT_CLOCK_RATE_HZ, DEFAULT_READ_TIMEOUT, EXIT_GRACE,
};
use serial_pressure_recorder::locator::{self, MatchMethod, Resolution};
use serial_pressure_recorder::{
    acquisition, choose_port, wait_for_enter, AcquisitionConfig, PortDescriptor,
    PortEnumerator, RecorderError, Recording, SessionToggles, SystemPorts,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pressure-recorder")]
#[command(about = "Record pressure rig telemetry from a serial port to CSV", long_about = None)]
struct Args {
    /// Serial port to use, skipping device discovery
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Acquisition loop rate in Hz
    #[arg(short, long, default_value_t = DEFAULT_CLOCK_RATE_HZ)]
    clock_rate: u32,

    /// Per-record read timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_millis() as u64)]
    read_timeout_ms: u64,

    /// Directory the recording is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Do not write the column header into a new log
    #[arg(long)]
    no_header: bool,

    /// Skip the post-capture plot prompt
    #[arg(long)]
    no_plot: bool,

    /// Do not open the rendered image
    #[arg(long)]
    no_show: bool,
}

impl Args {
    fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            baud: self.baud,
            clock_rate_hz: self.clock_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            toggles: SessionToggles {
                emit_header: !self.no_header,
                post_plot: !self.no_plot,
            },
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,serial_pressure_recorder=info")),
        )
        .init();

    let args = Args::parse();

    let code = match record(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\nError: {}", e);
            ExitCode::FAILURE
        }
    };

    std::thread::sleep(EXIT_GRACE);
    code
}

fn record(args: &Args) -> Result<(), RecorderError> {
    let config = args.acquisition_config();
    config.validate()?;

    println!("Pressure Recorder");
    println!("=================");

    let port = match &args.port {
        Some(path) => path.clone(),
        None => match locate(&SystemPorts)? {
            Some(port) => port.path,
            None => return Ok(()),
        },
    };

    println!("Connecting to {} at {} baud...", port, config.baud);
    let mut source = match acquisition::open_serial(&port, &config) {
        Ok(source) => source,
        Err(e @ RecorderError::PortUnavailable { .. }) => {
            eprintln!("Uhh, port seems busy... Is another program using it?");
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    println!("Connected!\n");

    let recording = Recording::now(&args.output_dir);
    println!("Clock rate: {} Hz", config.clock_rate_hz);
    println!("Output file: {}", recording.csv_path().display());
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    wait_for_enter(&mut stdin.lock(), &mut stdout, "Press [Enter] to start recording")?;

    let stop = Arc::new(AtomicBool::new(false));
    let captured = Arc::new(AtomicBool::new(false));
    let (s, c) = (stop.clone(), captured.clone());
    if let Err(e) = ctrlc::set_handler(move || {
        if abort_on_interrupt(&s, &c) {
            println!("\nAborted.");
            std::thread::sleep(EXIT_GRACE);
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }) {
        tracing::warn!("could not install Ctrl+C handler: {}", e);
    }

    println!("Recording... Press Ctrl+C to stop\n");
    let result = acquisition::run(&mut source, &recording, &config, &stop);
    captured.store(true, Ordering::SeqCst);
    let report = result?;
    drop(source);

    println!("\nFinishing up... Data saved!");
    println!("Total records: {}", report.ticks);
    println!("Empty reads: {}", report.empty_reads);
    println!("Overrun ticks: {}", report.overruns);
    println!("Elapsed time: {:.2} seconds", report.elapsed.as_secs_f64());
    println!("Actual loop rate: {:.1} Hz", report.achieved_rate_hz());
    println!("File: {}", report.path.display());

    if config.toggles.post_plot {
        plot_prompt(&recording, !args.no_show)?;
    }

    Ok(())
}

/// Conventional status for a process ended by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Ctrl+C ends the capture while it runs; once the log is closed it aborts
/// the program instead, so the plot prompt can be left
fn abort_on_interrupt(stop: &AtomicBool, captured: &AtomicBool) -> bool {
    if captured.load(Ordering::SeqCst) {
        return true;
    }
    stop.store(true, Ordering::SeqCst);
    false
}

/// Walk the operator through device discovery
fn locate<E: PortEnumerator>(enumerator: &E) -> io::Result<Option<PortDescriptor>> {
    println!("Looking for a device...");

    let mut prompt_error = None;
    let search = locator::resolve(locator::search(enumerator.ports()), |candidates| {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        choose_port(&mut stdin.lock(), &mut stdout, candidates).unwrap_or_else(|e| {
            prompt_error = Some(e);
            None
        })
    });
    if let Some(e) = prompt_error {
        return Err(e);
    }

    match search {
        Resolution::Found { port, method } => {
            match method {
                MatchMethod::VendorId {
                    after_description_miss: true,
                } => {
                    println!("Hm, there's no device clearly labeled a USB-Serial Controller...");
                    println!("Oh wait, I found something!");
                }
                MatchMethod::VendorId { .. } => {
                    println!("Going by vendor ID instead.");
                }
                MatchMethod::Description | MatchMethod::OperatorChoice => {}
            }
            println!("Found MCU: {}\n", port);
            Ok(Some(port))
        }
        Resolution::NotFound { ports, declined } => {
            if declined.is_empty() {
                println!("Hm, there's no device clearly labeled a USB-Serial Controller...");
            } else {
                println!("No controller picked, and no port carries the Teensy vendor ID.");
            }
            println!("No MCU found. Available ports:");
            if ports.is_empty() {
                println!("  (none)");
            }
            for port in &ports {
                println!("  {}", port);
            }
            Ok(None)
        }
    }
}

#[cfg(feature = "plot")]
fn plot_prompt(recording: &Recording, show: bool) -> Result<(), RecorderError> {
    use serial_pressure_recorder::{confirm, present, reconstruct_file, render, RenderOptions};

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if !confirm(&mut stdin.lock(), &mut stdout, "\nPlot data into PNG? [y/N] ")? {
        return Ok(());
    }

    let reconstruction = reconstruct_file(&recording.csv_path())?;
    if reconstruction.samples == 0 {
        println!("Nothing was recorded, skipping plot.");
        return Ok(());
    }

    let path = render(&reconstruction, &RenderOptions::for_recording(recording))?;
    println!("Plot saved: {}", path.display());
    stdout.flush()?;

    if show {
        if let Err(e) = present(&path) {
            tracing::warn!("could not open viewer: {}", e);
        }
    }

    Ok(())
}

#[cfg(not(feature = "plot"))]
fn plot_prompt(_recording: &Recording, _show: bool) -> Result<(), RecorderError> {
    tracing::debug!("built without plotting support");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_stops_capture_first() {
        let stop = AtomicBool::new(false);
        let captured = AtomicBool::new(false);

        assert!(!abort_on_interrupt(&stop, &captured));
        assert!(stop.load(Ordering::SeqCst));

        // A second press during the same capture still only stops it
        assert!(!abort_on_interrupt(&stop, &captured));
    }

    #[test]
    fn test_interrupt_after_capture_aborts() {
        let stop = AtomicBool::new(true);
        let captured = AtomicBool::new(true);

        assert!(abort_on_interrupt(&stop, &captured));
    }
}
