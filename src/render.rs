//! Static PNG rendering of a reconstructed recording
//!
//! Pressure channels are drawn as lines against elapsed time; each device
//! state's intervals are drawn as translucent bands spanning the plot height.

use crate::reconstruct::{sample_time, DeviceState, PressureChannel, Reconstruction};
use crate::recording::Recording;
use crate::{RecorderError, Result};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Output image size in pixels
pub const IMAGE_SIZE: (u32, u32) = (1300, 600);

const BAND_ALPHA: f64 = 0.2;
const LINE_ALPHA: f64 = 0.7;

/// Stroke of one pressure trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceStyle {
    pub color: RGBColor,
    pub width: u32,
    pub alpha: f64,
    /// `(dash, gap)` in pixels; solid when absent
    pub dash: Option<(u32, u32)>,
}

impl TraceStyle {
    fn shape(&self) -> ShapeStyle {
        self.color.mix(self.alpha).stroke_width(self.width)
    }
}

pub fn trace_style(channel: PressureChannel) -> TraceStyle {
    match channel {
        PressureChannel::Lower => TraceStyle {
            color: RGBColor(0x40, 0x40, 0x96),
            width: 2,
            alpha: LINE_ALPHA,
            dash: Some((2, 4)),
        },
        PressureChannel::Middle => TraceStyle {
            color: RGBColor(0x57, 0xa3, 0xad),
            width: 2,
            alpha: LINE_ALPHA,
            dash: Some((12, 4)),
        },
        PressureChannel::Upper => TraceStyle {
            color: RGBColor(0xde, 0xa7, 0x3a),
            width: 2,
            alpha: LINE_ALPHA,
            dash: Some((8, 8)),
        },
        PressureChannel::Average => TraceStyle {
            color: RGBColor(0xd9, 0x21, 0x20),
            width: 3,
            alpha: 1.0,
            dash: None,
        },
    }
}

pub fn band_color(state: DeviceState) -> RGBColor {
    match state {
        DeviceState::Valve => RGBColor(0x88, 0xcc, 0xee),
        DeviceState::Buzzer => RGBColor(0xcc, 0x66, 0x77),
    }
}

/// Where and under which title to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub title: String,
    pub output: PathBuf,
}

impl RenderOptions {
    /// Image next to the recording's log, titled with its name
    pub fn for_recording(recording: &Recording) -> Self {
        Self {
            title: recording.name().to_string(),
            output: recording.png_path(),
        }
    }
}

/// Vertical axis range covering every trace, with a small margin
pub fn value_range(reconstruction: &Reconstruction) -> (f64, f64) {
    let (min, max) = reconstruction
        .series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }

    let span = max - min;
    if span <= f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min - span * 0.05, max + span * 0.05)
    }
}

/// Render to `options.output`, returning the written path
pub fn render(reconstruction: &Reconstruction, options: &RenderOptions) -> Result<PathBuf> {
    if reconstruction.samples == 0 {
        return Err(RecorderError::EmptyRecording);
    }

    draw(reconstruction, options).map_err(|e| RecorderError::Render(e.to_string()))?;
    tracing::info!(path = %options.output.display(), "figure written");

    Ok(options.output.clone())
}

fn draw(
    reconstruction: &Reconstruction,
    options: &RenderOptions,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(&options.output, IMAGE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_end = sample_time(reconstruction.samples);
    let (y_min, y_max) = value_range(reconstruction);

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(65)
        .build_cartesian_2d(0f64..x_end, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time (seconds)")
        .y_desc("Pressure (mmHg)")
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    // Bands first so the traces stay on top
    for states in &reconstruction.states {
        if states.intervals.is_empty() {
            continue;
        }

        let fill = band_color(states.state).mix(BAND_ALPHA).filled();
        chart
            .draw_series(states.intervals.iter().map(|interval| {
                let (start, end) = interval.span_secs();
                Rectangle::new([(start, y_min), (end, y_max)], fill)
            }))?
            .label(states.state.label())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 20, y + 6)], fill));
    }

    for series in &reconstruction.series {
        let style = trace_style(series.channel);
        let shape = style.shape();

        let annotation = match style.dash {
            Some((dash, gap)) => {
                chart.draw_series(DashedLineSeries::new(series.points(), dash, gap, shape))?
            }
            None => chart.draw_series(LineSeries::new(series.points(), shape))?,
        };
        annotation
            .label(series.channel.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], shape));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Open a rendered image in the platform's default viewer
pub fn present(path: &Path) -> io::Result<()> {
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let mut command = Command::new("xdg-open");

    command.arg(path).spawn()?;
    tracing::debug!(path = %path.display(), "viewer launched");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::{reconstruct, reconstruct_file};
    use std::fs;

    #[test]
    fn test_value_range_pads_span() {
        let reconstruction =
            reconstruct("s,10,20,30,20,0,0\ns,0,10,20,10,1,0\n".as_bytes()).unwrap();
        let (lo, hi) = value_range(&reconstruction);
        assert!((lo - -1.5).abs() < 1e-9);
        assert!((hi - 31.5).abs() < 1e-9);
    }

    #[test]
    fn test_value_range_flat_signal() {
        let reconstruction = reconstruct("s,5,5,5,5,0,0\n".as_bytes()).unwrap();
        assert_eq!(value_range(&reconstruction), (4.0, 6.0));
    }

    #[test]
    fn test_styles_are_distinct() {
        let styles: Vec<TraceStyle> = PressureChannel::ALL.iter().map(|&c| trace_style(c)).collect();
        for (i, a) in styles.iter().enumerate() {
            for b in &styles[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(trace_style(PressureChannel::Average).dash.is_none());
        assert_ne!(band_color(DeviceState::Valve), band_color(DeviceState::Buzzer));
    }

    #[test]
    fn test_options_follow_recording() {
        let recording = Recording::from_log_path(Path::new("out/data_2024-05-01_12-00-00.csv"));
        let options = RenderOptions::for_recording(&recording);
        assert_eq!(options.title, "data_2024-05-01_12-00-00");
        assert_eq!(options.output, PathBuf::from("out/data_2024-05-01_12-00-00.png"));
    }

    #[test]
    fn test_empty_recording_is_not_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let reconstruction = reconstruct("".as_bytes()).unwrap();
        let options = RenderOptions {
            title: "empty".to_string(),
            output: dir.path().join("empty.png"),
        };

        assert!(matches!(
            render(&reconstruction, &options),
            Err(RecorderError::EmptyRecording)
        ));
        assert!(!options.output.exists());
    }

    #[test]
    fn test_render_leaves_log_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let recording = Recording::from_log_path(&dir.path().join("data_2024-05-01_12-00-00.csv"));
        let log = "\
s,10.0,11.0,12.0,11.0,0,0
s,10.5,11.5,12.5,11.5,1,0
s,11.0,12.0,13.0,12.0,1,1
s,11.0,12.0,13.0,12.0,0,0
";
        fs::write(recording.csv_path(), log).unwrap();

        let reconstruction = reconstruct_file(&recording.csv_path()).unwrap();
        // Font availability depends on the host; the log must survive either way
        if let Ok(path) = render(&reconstruction, &RenderOptions::for_recording(&recording)) {
            assert!(path.exists());
        }

        assert_eq!(fs::read_to_string(recording.csv_path()).unwrap(), log);
        assert_eq!(reconstruct_file(&recording.csv_path()).unwrap(), reconstruction);
    }
}
