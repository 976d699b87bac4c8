//! Fixed-rate serial acquisition loop
//!
//! Each tick performs one bounded read of a newline-delimited record, appends
//! the raw bytes to the recording's log, then sleeps for whatever is left of
//! the tick period. There is no catch-up: a tick that overruns its period is
//! followed immediately by the next one.

use crate::config::AcquisitionConfig;
use crate::recording::{Recording, RecordingWriter};
use crate::{RecorderError, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Producer of one raw record per call
pub trait LineSource {
    /// Read bytes up to and including the next `\n` into `record`.
    ///
    /// Returns early with whatever has arrived (possibly nothing) once the
    /// source's timeout elapses.
    fn read_record(&mut self, record: &mut Vec<u8>) -> Result<()>;
}

/// Byte stream whose blocking reads can be bounded
///
/// `LineReader` narrows the bound before every read so that a record never
/// waits longer than its own timeout in total.
pub trait TimedRead: Read {
    /// Limit how long the next `read` may block. Streams that never block
    /// keep the default no-op.
    fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

impl TimedRead for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Deadline-bounded line reader over any byte stream
///
/// Bytes received past a newline are held back for the next call, so records
/// are neither split nor duplicated across ticks beyond what the timeout cuts.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    timeout: Duration,
}

impl<R: TimedRead> LineReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(256),
            timeout,
        }
    }

    fn take_line(&mut self, record: &mut Vec<u8>) -> bool {
        match self.pending.iter().position(|&b| b == b'\n') {
            Some(end) => {
                record.extend(self.pending.drain(..=end));
                true
            }
            None => false,
        }
    }
}

impl<R: TimedRead> LineSource for LineReader<R> {
    fn read_record(&mut self, record: &mut Vec<u8>) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut chunk = [0u8; 256];

        loop {
            if self.take_line(record) {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                record.append(&mut self.pending);
                return Ok(());
            }
            self.inner.set_read_timeout(deadline - now)?;

            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    record.append(&mut self.pending);
                    return Ok(());
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Line source over an open serial connection
pub type SerialSource = LineReader<Box<dyn SerialPort>>;

/// Open `port` as 8N1 without flow control
///
/// The connection is released when the returned source is dropped.
pub fn open_serial(port: &str, config: &AcquisitionConfig) -> Result<SerialSource> {
    config.validate()?;

    let serial = serialport::new(port, config.baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|source| RecorderError::PortUnavailable {
            port: port.to_string(),
            source,
        })?;

    tracing::info!(port, baud = config.baud, "serial port opened");
    Ok(LineReader::new(serial, config.read_timeout))
}

/// Outcome of one acquisition run
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionReport {
    /// Log the records were appended to
    pub path: PathBuf,
    /// Loop iterations, one record each
    pub ticks: u64,
    /// Ticks whose read returned nothing before the timeout
    pub empty_reads: u64,
    /// Ticks whose read and write outlasted the tick period
    pub overruns: u64,
    /// Bytes appended to the log, header included
    pub bytes_written: u64,
    pub elapsed: Duration,
}

impl AcquisitionReport {
    /// Achieved loop rate over the whole run
    pub fn achieved_rate_hz(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.ticks as f64 / secs
        } else {
            0.0
        }
    }
}

/// Record from `source` into `recording` until `stop` is raised
///
/// The log is opened before the first tick and closed exactly once, whether
/// the loop ends through `stop` or through an error.
pub fn run<S>(
    source: &mut S,
    recording: &Recording,
    config: &AcquisitionConfig,
    stop: &AtomicBool,
) -> Result<AcquisitionReport>
where
    S: LineSource + ?Sized,
{
    config.validate()?;
    if config.timeout_exceeds_tick() {
        tracing::warn!(
            timeout = ?config.read_timeout,
            tick = ?config.tick_period(),
            "read timeout is longer than one tick; silent ticks will run slow"
        );
    }

    let mut writer = RecordingWriter::open(recording, config.toggles.emit_header)?;
    let report = pace(source, &mut writer, config.tick_period(), stop)?;
    writer.finish()?;

    Ok(report)
}

fn pace<S>(
    source: &mut S,
    writer: &mut RecordingWriter,
    tick_period: Duration,
    stop: &AtomicBool,
) -> Result<AcquisitionReport>
where
    S: LineSource + ?Sized,
{
    let started = Instant::now();
    let mut record = Vec::with_capacity(128);
    let mut ticks = 0u64;
    let mut empty_reads = 0u64;
    let mut overruns = 0u64;

    tracing::info!(path = %writer.path().display(), ?tick_period, "acquisition started");

    while !stop.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        record.clear();
        source.read_record(&mut record)?;
        writer.append(&record)?;

        ticks += 1;
        if record.is_empty() {
            empty_reads += 1;
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick_period {
            thread::sleep(tick_period - elapsed);
        } else {
            overruns += 1;
        }
    }

    let elapsed = started.elapsed();
    tracing::info!(ticks, empty_reads, overruns, ?elapsed, "acquisition stopped");

    Ok(AcquisitionReport {
        path: writer.path().to_path_buf(),
        ticks,
        empty_reads,
        overruns,
        bytes_written: writer.bytes_written(),
        elapsed,
    })
}
