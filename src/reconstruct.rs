//! Interval reconstruction from a closed recording
//!
//! Reads a log back into one series per pressure channel and, for each
//! discrete device state, the list of `[start, end)` sample ranges during
//! which the device was on.
//!
//! # Example
//! ```
//! use serial_pressure_recorder::reconstruct::{reconstruct, DeviceState};
//!
//! let log = "\
//! state,P_lower,P_middle,P_upper,P_average,valve_is_on,buzzer_is_on
//! hold,10.0,11.0,12.0,11.0,0,0
//! fill,10.5,11.5,12.5,11.5,1,0
//! fill,11.0,12.0,13.0,12.0,1,1
//! hold,11.0,12.0,13.0,12.0,0,0
//! ";
//! let reconstruction = reconstruct(log.as_bytes())?;
//! assert_eq!(reconstruction.samples, 4);
//!
//! let valve = reconstruction.intervals(DeviceState::Valve);
//! assert_eq!((valve[0].start, valve[0].end), (1, 3));
//! # Ok::<(), serial_pressure_recorder::RecorderError>(())
//! ```

use crate::config::SAMPLE_PERIOD;
use crate::recording::HEADER;
use crate::{RecorderError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

/// Columns per row: state label, four pressures, two flags
pub const COLUMNS: usize = 7;

/// Continuous pressure channels, in column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressureChannel {
    Lower,
    Middle,
    Upper,
    Average,
}

impl PressureChannel {
    pub const ALL: [PressureChannel; 4] = [
        PressureChannel::Lower,
        PressureChannel::Middle,
        PressureChannel::Upper,
        PressureChannel::Average,
    ];

    pub fn column(self) -> usize {
        match self {
            PressureChannel::Lower => 1,
            PressureChannel::Middle => 2,
            PressureChannel::Upper => 3,
            PressureChannel::Average => 4,
        }
    }

    /// Column name in the log header
    pub fn name(self) -> &'static str {
        match self {
            PressureChannel::Lower => "P_lower",
            PressureChannel::Middle => "P_middle",
            PressureChannel::Upper => "P_upper",
            PressureChannel::Average => "P_average",
        }
    }

    /// Legend label
    pub fn label(self) -> &'static str {
        match self {
            PressureChannel::Lower => "Lower pressure",
            PressureChannel::Middle => "Middle pressure",
            PressureChannel::Upper => "Upper pressure",
            PressureChannel::Average => "Average pressure",
        }
    }
}

/// Discrete on/off device states, in column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Valve,
    Buzzer,
}

impl DeviceState {
    pub const ALL: [DeviceState; 2] = [DeviceState::Valve, DeviceState::Buzzer];

    pub fn column(self) -> usize {
        match self {
            DeviceState::Valve => 5,
            DeviceState::Buzzer => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceState::Valve => "valve_is_on",
            DeviceState::Buzzer => "buzzer_is_on",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeviceState::Valve => "Valve activated",
            DeviceState::Buzzer => "Buzzer activated",
        }
    }
}

/// Elapsed time of sample `index`, in seconds
pub fn sample_time(index: usize) -> f64 {
    index as f64 * SAMPLE_PERIOD.as_secs_f64()
}

/// Elapsed time covered by `count` samples
pub fn samples_duration(count: usize) -> Duration {
    let period = SAMPLE_PERIOD.as_nanos() as u64;
    Duration::from_nanos(period.saturating_mul(count as u64))
}

/// Half-open sample range `[start, end)` during which a state was on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInterval {
    pub start: usize,
    pub end: usize,
}

impl StateInterval {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn duration(&self) -> Duration {
        samples_duration(self.len())
    }

    /// `(start, end)` in seconds
    pub fn span_secs(&self) -> (f64, f64) {
        (sample_time(self.start), sample_time(self.end))
    }
}

/// One continuous channel, index-aligned with the sample index
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    pub channel: PressureChannel,
    pub values: Vec<f64>,
}

impl ChannelSeries {
    /// `(seconds, value)` points
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + Clone + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (sample_time(i), v))
    }
}

/// Reconstructed intervals of one device state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateIntervals {
    pub state: DeviceState,
    pub intervals: Vec<StateInterval>,
}

/// Everything recovered from one log
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub series: Vec<ChannelSeries>,
    pub states: Vec<StateIntervals>,
    /// Number of sample rows (header and blank lines excluded)
    pub samples: usize,
}

impl Reconstruction {
    pub fn series(&self, channel: PressureChannel) -> &[f64] {
        self.series
            .iter()
            .find(|s| s.channel == channel)
            .map(|s| s.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn intervals(&self, state: DeviceState) -> &[StateInterval] {
        self.states
            .iter()
            .find(|s| s.state == state)
            .map(|s| s.intervals.as_slice())
            .unwrap_or(&[])
    }

    /// Elapsed time covered by the recording
    pub fn duration(&self) -> Duration {
        samples_duration(self.samples)
    }
}

/// Edge-triggered tracker for one discrete channel
///
/// The tracked state starts unknown, so the first row always produces an
/// edge. Repeats of the current state produce none.
#[derive(Debug, Default, Clone)]
pub struct EdgeDetector {
    state: Option<bool>,
    rising: Vec<usize>,
    falling: Vec<usize>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, index: usize, on: bool) {
        if self.state == Some(on) {
            return;
        }
        self.state = Some(on);
        if on {
            self.rising.push(index);
        } else {
            self.falling.push(index);
        }
    }

    /// Pair edges into intervals once `samples` rows have been observed
    pub fn finish(mut self, samples: usize) -> Vec<StateInterval> {
        // Close whatever is still open at the end of the recording
        self.falling.push(samples);

        // A leading off-edge has no interval to close
        if let Some(&first_fall) = self.falling.first() {
            if self.rising.first().map_or(true, |&rise| first_fall < rise) {
                self.falling.remove(0);
            }
        }

        self.rising
            .iter()
            .zip(&self.falling)
            .map(|(&start, &end)| StateInterval { start, end })
            .collect()
    }
}

/// Reconstruct the intervals of a single flag sequence
pub fn intervals_of(values: &[bool]) -> Vec<StateInterval> {
    let mut detector = EdgeDetector::new();
    for (index, &on) in values.iter().enumerate() {
        detector.observe(index, on);
    }
    detector.finish(values.len())
}

fn malformed(line: u64, reason: impl Into<String>) -> RecorderError {
    RecorderError::MalformedRow {
        line,
        reason: reason.into(),
    }
}

fn is_header(record: &csv::StringRecord) -> bool {
    record.iter().eq(HEADER.split(','))
}

/// Reconstruct series and state intervals from a log
///
/// Any malformed row fails the whole pass; no partial result is returned.
pub fn reconstruct<R: Read>(reader: R) -> Result<Reconstruction> {
    let mut rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); PressureChannel::ALL.len()];
    let mut detectors: Vec<EdgeDetector> = DeviceState::ALL.iter().map(|_| EdgeDetector::new()).collect();
    let mut samples = 0usize;
    let mut record = csv::StringRecord::new();
    let mut first_row = true;

    loop {
        match rows.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_io_error() => return Err(RecorderError::Io(e.into())),
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                return Err(malformed(line, e.to_string()));
            }
        }

        let line = record.position().map_or(0, |p| p.line());

        if first_row {
            first_row = false;
            if is_header(&record) {
                continue;
            }
        }

        if record.len() != COLUMNS {
            return Err(malformed(
                line,
                format!("expected {} columns, found {}", COLUMNS, record.len()),
            ));
        }

        for (channel, series) in PressureChannel::ALL.iter().zip(values.iter_mut()) {
            let field = &record[channel.column()];
            let value = field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(line, format!("{} is not numeric: {:?}", channel.name(), field)))?;
            series.push(value);
        }

        for (state, detector) in DeviceState::ALL.iter().zip(detectors.iter_mut()) {
            let on = match &record[state.column()] {
                "1" => true,
                "0" => false,
                other => {
                    return Err(malformed(
                        line,
                        format!("{} must be 0 or 1, got {:?}", state.name(), other),
                    ))
                }
            };
            detector.observe(samples, on);
        }

        samples += 1;
    }

    tracing::debug!(samples, "recording reconstructed");

    Ok(Reconstruction {
        series: PressureChannel::ALL
            .iter()
            .zip(values)
            .map(|(&channel, values)| ChannelSeries { channel, values })
            .collect(),
        states: DeviceState::ALL
            .iter()
            .zip(detectors)
            .map(|(&state, detector)| StateIntervals {
                state,
                intervals: detector.finish(samples),
            })
            .collect(),
        samples,
    })
}

/// Reconstruct from a log on disk; the file is opened read-only
pub fn reconstruct_file(path: &Path) -> Result<Reconstruction> {
    let file = File::open(path)?;
    reconstruct(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn flags(values: &[u8]) -> Vec<bool> {
        values.iter().map(|&v| v == 1).collect()
    }

    fn interval(start: usize, end: usize) -> StateInterval {
        StateInterval { start, end }
    }

    fn log_with_valve(valve: &[u8]) -> String {
        let mut log = format!("{}\n", HEADER);
        for (i, v) in valve.iter().enumerate() {
            log.push_str(&format!("s,{i}.0,{i}.1,{i}.2,{i}.1,{v},0\n"));
        }
        log
    }

    #[test]
    fn test_intervals_from_edges() {
        assert_eq!(
            intervals_of(&flags(&[0, 0, 1, 1, 1, 0, 0, 1, 0])),
            vec![interval(2, 5), interval(7, 8)]
        );
    }

    #[test]
    fn test_leading_off_is_not_an_interval() {
        assert_eq!(intervals_of(&flags(&[0, 1, 1, 0])), vec![interval(1, 3)]);
    }

    #[test]
    fn test_interval_open_at_end_is_closed() {
        assert_eq!(
            intervals_of(&flags(&[1, 1, 0, 1, 1])),
            vec![interval(0, 2), interval(3, 5)]
        );
    }

    #[test]
    fn test_constant_channels() {
        assert_eq!(intervals_of(&flags(&[0, 0, 0])), vec![]);
        assert_eq!(intervals_of(&flags(&[1, 1, 1])), vec![interval(0, 3)]);
        assert_eq!(intervals_of(&[]), vec![]);
    }

    #[test]
    fn test_reconstruct_log() {
        let reconstruction = reconstruct(log_with_valve(&[0, 0, 1, 1, 1, 0, 0, 1, 0]).as_bytes()).unwrap();

        assert_eq!(reconstruction.samples, 9);
        assert_eq!(
            reconstruction.intervals(DeviceState::Valve),
            &[interval(2, 5), interval(7, 8)]
        );
        assert!(reconstruction.intervals(DeviceState::Buzzer).is_empty());
        assert_eq!(reconstruction.series(PressureChannel::Upper)[3], 3.2);
        assert_eq!(reconstruction.series(PressureChannel::Average).len(), 9);
    }

    #[test]
    fn test_headerless_log_keeps_first_sample() {
        let log = "a,1.0,2.0,3.0,2.0,1,0\nb,1.0,2.0,3.0,2.0,0,1\n";
        let reconstruction = reconstruct(log.as_bytes()).unwrap();

        assert_eq!(reconstruction.samples, 2);
        assert_eq!(reconstruction.intervals(DeviceState::Valve), &[interval(0, 1)]);
        assert_eq!(reconstruction.intervals(DeviceState::Buzzer), &[interval(1, 2)]);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let log = format!("{}\r\n\r\nx,1,2,3,2,1,0\r\n\nx,1,2,3,2,0,0\r\n", HEADER);
        let reconstruction = reconstruct(log.as_bytes()).unwrap();

        assert_eq!(reconstruction.samples, 2);
        assert_eq!(reconstruction.intervals(DeviceState::Valve), &[interval(0, 1)]);
    }

    #[test]
    fn test_short_row_fails() {
        let log = format!("{}\nx,1,2,3,2,0,0\nx,1,2,3,0,0\n", HEADER);
        match reconstruct(log.as_bytes()) {
            Err(RecorderError::MalformedRow { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("columns"));
            }
            other => panic!("expected malformed row, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_pressure_fails() {
        let log = "x,1,2,abc,2,0,0\n";
        assert!(matches!(
            reconstruct(log.as_bytes()),
            Err(RecorderError::MalformedRow { line: 1, .. })
        ));
    }

    #[test]
    fn test_non_finite_pressure_fails() {
        assert!(reconstruct("x,1,NaN,3,2,0,0\n".as_bytes()).is_err());
        assert!(reconstruct("x,1,2,inf,2,0,0\n".as_bytes()).is_err());
    }

    #[test]
    fn test_non_binary_flag_fails() {
        let log = "x,1,2,3,2,2,0\n";
        assert!(matches!(
            reconstruct(log.as_bytes()),
            Err(RecorderError::MalformedRow { .. })
        ));
    }

    #[test]
    fn test_repeated_header_fails() {
        let log = format!("{}\n{}\n", HEADER, HEADER);
        assert!(matches!(
            reconstruct(log.as_bytes()),
            Err(RecorderError::MalformedRow { line: 2, .. })
        ));
    }

    #[test]
    fn test_header_only_log_is_empty() {
        let reconstruction = reconstruct(format!("{}\n", HEADER).as_bytes()).unwrap();
        assert_eq!(reconstruction.samples, 0);
        assert!(reconstruction.states.iter().all(|s| s.intervals.is_empty()));
    }

    #[test]
    fn test_time_mapping() {
        assert_eq!(sample_time(0), 0.0);
        assert!((sample_time(250) - 2.5).abs() < 1e-12);

        let span = interval(100, 150);
        assert_eq!(span.duration(), Duration::from_millis(500));
        let (start, end) = span.span_secs();
        assert!((start - 1.0).abs() < 1e-12);
        assert!((end - 1.5).abs() < 1e-12);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_long_span_duration_does_not_wrap() {
        // 2^32 samples would wrap to zero in 32-bit arithmetic
        let count = 1usize << 32;
        let expected = Duration::from_millis(10 * (1u64 << 32));

        assert_eq!(samples_duration(count), expected);
        assert_eq!(interval(0, count).duration(), expected);

        let reconstruction = Reconstruction {
            series: Vec::new(),
            states: Vec::new(),
            samples: count,
        };
        assert_eq!(reconstruction.duration(), expected);
    }

    #[test]
    fn test_reconstruct_file_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_2024-01-01_00-00-00.csv");
        let log = log_with_valve(&[0, 1, 1, 0]);
        fs::write(&path, &log).unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();

        let reconstruction = reconstruct_file(&path).unwrap();

        assert_eq!(reconstruction.intervals(DeviceState::Valve), &[interval(1, 3)]);
        assert_eq!(fs::read_to_string(&path).unwrap(), log);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }
}
