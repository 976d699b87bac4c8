//! Serial pressure recorder
//!
//! Records line-oriented telemetry from a Teensy pressure rig over a serial
//! link into a CSV log, then reconstructs and plots the valve and buzzer
//! activity against the three pressure sensors.
//!
//! # Quick Start
//!
//! ## Finding the Device
//! ```no_run
//! use serial_pressure_recorder::{find_device, SystemPorts};
//!
//! match find_device(&SystemPorts, |_| None) {
//!     Some(port) => println!("Found MCU: {}", port),
//!     None => println!("No device found"),
//! }
//! ```
//!
//! ## Recording Until Interrupted
//! ```no_run
//! use serial_pressure_recorder::{acquisition, AcquisitionConfig, Recording};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let config = AcquisitionConfig::default();
//! let mut source = acquisition::open_serial("/dev/ttyACM0", &config)?;
//! let recording = Recording::now(".");
//!
//! let stop = Arc::new(AtomicBool::new(false));
//! let s = stop.clone();
//! ctrlc::set_handler(move || s.store(true, Ordering::SeqCst)).unwrap();
//!
//! let report = acquisition::run(&mut source, &recording, &config, &stop)?;
//! println!("{} records in {:.1}s", report.ticks, report.elapsed.as_secs_f64());
//! # Ok::<(), serial_pressure_recorder::RecorderError>(())
//! ```
//!
//! ## Plotting a Recording
//! ```no_run
//! use serial_pressure_recorder::{reconstruct_file, render, Recording, RenderOptions};
//! use std::path::Path;
//!
//! let recording = Recording::from_log_path(Path::new("data_2024-03-07_09-05-42.csv"));
//! let reconstruction = reconstruct_file(&recording.csv_path())?;
//! render(&reconstruction, &RenderOptions::for_recording(&recording))?;
//! # Ok::<(), serial_pressure_recorder::RecorderError>(())
//! ```

pub mod acquisition;
pub mod common;
pub mod config;
pub mod error;
pub mod locator;
pub mod reconstruct;
pub mod recording;
#[cfg(feature = "plot")]
pub mod render;
pub mod summary;

// Re-export public API
pub use acquisition::{AcquisitionReport, LineReader, LineSource, SerialSource, TimedRead};
pub use common::{choose_port, confirm, wait_for_enter};
pub use config::{AcquisitionConfig, SessionToggles};
pub use error::{RecorderError, Result};
pub use locator::{
    find_device, DeviceSearch, MatchMethod, PortDescriptor, PortEnumerator, Resolution, SystemPorts,
};
pub use reconstruct::{
    reconstruct, reconstruct_file, DeviceState, PressureChannel, Reconstruction, StateInterval,
};
pub use recording::{Recording, RecordingWriter};
#[cfg(feature = "plot")]
pub use render::{present, render, RenderOptions};
pub use summary::{summarize, Summary};
