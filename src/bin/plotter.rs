//! Pressure Recording Plotter
//!
//! Renders an existing recording to PNG and optionally prints its summary.
//!
//! Usage:
//!   plotter data_2024-03-07_09-05-42.csv --show
//!   plotter data_2024-03-07_09-05-42.csv --summary --report summary.txt

use clap::Parser;
use serial_pressure_recorder::{
    present, reconstruct_file, render, summarize, RecorderError, Recording, RenderOptions,
};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plotter")]
#[command(about = "Plot a pressure recording to PNG", long_about = None)]
struct Args {
    /// Recording CSV log
    input: PathBuf,

    /// Output PNG path (default: next to the log)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Open the image once written
    #[arg(long)]
    show: bool,

    /// Print a summary of the recording
    #[arg(long)]
    summary: bool,

    /// Write the summary to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,serial_pressure_recorder=info")),
        )
        .init();

    let args = Args::parse();

    match plot(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn plot(args: &Args) -> Result<(), RecorderError> {
    let recording = Recording::from_log_path(&args.input);

    println!("Loading data from {}...", args.input.display());
    let reconstruction = reconstruct_file(&args.input)?;
    println!(
        "Loaded {} samples ({:.2}s)",
        reconstruction.samples,
        reconstruction.duration().as_secs_f64()
    );

    let mut options = RenderOptions::for_recording(&recording);
    if let Some(output) = &args.output {
        options.output = output.clone();
    }

    let path = render(&reconstruction, &options)?;
    println!("Plot saved: {}", path.display());

    if args.summary || args.report.is_some() {
        let mut output: Box<dyn Write> = match &args.report {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout()),
        };
        writeln!(output)?;
        summarize(&reconstruction).write_report(&mut output)?;
        output.flush()?;
    }

    if args.show {
        if let Err(e) = present(&path) {
            tracing::warn!("could not open viewer: {}", e);
        }
    }

    Ok(())
}
