//! Summary statistics over a reconstructed recording

use crate::reconstruct::{DeviceState, PressureChannel, Reconstruction};
use std::io::{self, Write};
use std::time::Duration;

/// Descriptive statistics of one pressure channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    /// `None` for an empty series
    pub fn of(data: &[f64]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }
}

/// Activity of one device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateActivity {
    pub state: DeviceState,
    pub activations: usize,
    pub total_on: Duration,
    pub longest: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub samples: usize,
    pub duration: Duration,
    pub channels: Vec<(PressureChannel, Option<Stats>)>,
    pub states: Vec<StateActivity>,
}

pub fn summarize(reconstruction: &Reconstruction) -> Summary {
    let channels = reconstruction
        .series
        .iter()
        .map(|s| (s.channel, Stats::of(&s.values)))
        .collect();

    let states = reconstruction
        .states
        .iter()
        .map(|s| StateActivity {
            state: s.state,
            activations: s.intervals.len(),
            total_on: s.intervals.iter().map(|i| i.duration()).sum(),
            longest: s
                .intervals
                .iter()
                .map(|i| i.duration())
                .max()
                .unwrap_or_default(),
        })
        .collect();

    Summary {
        samples: reconstruction.samples,
        duration: reconstruction.duration(),
        channels,
        states,
    }
}

impl Summary {
    /// Plain-text report
    pub fn write_report(&self, output: &mut dyn Write) -> io::Result<()> {
        writeln!(output, "{}", "=".repeat(72))?;
        writeln!(output, "RECORDING SUMMARY")?;
        writeln!(output, "{}", "=".repeat(72))?;
        writeln!(output, "  Samples: {}", self.samples)?;
        writeln!(output, "  Duration: {:.2}s", self.duration.as_secs_f64())?;

        writeln!(output)?;
        writeln!(output, "Pressure (mmHg):")?;
        writeln!(output, "{:-<72}", "")?;
        writeln!(
            output,
            "{:<18} {:>12} {:>12} {:>12} {:>12}",
            "Channel", "Mean", "Std Dev", "Min", "Max"
        )?;
        writeln!(output, "{:-<72}", "")?;
        for (channel, stats) in &self.channels {
            match stats {
                Some(s) => writeln!(
                    output,
                    "{:<18} {:>12.3} {:>12.3} {:>12.3} {:>12.3}",
                    channel.label(),
                    s.mean,
                    s.std_dev,
                    s.min,
                    s.max
                )?,
                None => writeln!(output, "{:<18} {:>12}", channel.label(), "no data")?,
            }
        }

        writeln!(output)?;
        writeln!(output, "Device states:")?;
        writeln!(output, "{:-<72}", "")?;
        writeln!(
            output,
            "{:<18} {:>12} {:>12} {:>12}",
            "State", "Activations", "Total on", "Longest"
        )?;
        writeln!(output, "{:-<72}", "")?;
        for activity in &self.states {
            writeln!(
                output,
                "{:<18} {:>12} {:>11.2}s {:>11.2}s",
                activity.state.label(),
                activity.activations,
                activity.total_on.as_secs_f64(),
                activity.longest.as_secs_f64()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::reconstruct;

    #[test]
    fn test_stats() {
        let stats = Stats::of(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.std_dev - 1.118_034).abs() < 1e-6);
        assert!(Stats::of(&[]).is_none());
    }

    #[test]
    fn test_state_activity() {
        let log = "\
s,1,1,1,1,0,1
s,1,1,1,1,1,1
s,1,1,1,1,1,0
s,1,1,1,1,0,0
s,1,1,1,1,1,0
";
        let summary = summarize(&reconstruct(log.as_bytes()).unwrap());

        assert_eq!(summary.samples, 5);
        assert_eq!(summary.duration, Duration::from_millis(50));

        let valve = summary.states[0];
        assert_eq!(valve.state, DeviceState::Valve);
        assert_eq!(valve.activations, 2);
        assert_eq!(valve.total_on, Duration::from_millis(30));
        assert_eq!(valve.longest, Duration::from_millis(20));

        let buzzer = summary.states[1];
        assert_eq!(buzzer.activations, 1);
        assert_eq!(buzzer.total_on, Duration::from_millis(20));
    }

    #[test]
    fn test_report_lists_every_channel() {
        let summary = summarize(&reconstruct("s,1,2,3,2,0,0\n".as_bytes()).unwrap());
        let mut out = Vec::new();
        summary.write_report(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        for channel in PressureChannel::ALL {
            assert!(text.contains(channel.label()));
        }
        assert!(text.contains("Valve activated"));
        assert!(text.contains("Buzzer activated"));
    }
}
