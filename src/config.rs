//! Session defaults and acquisition configuration

use crate::{RecorderError, Result};
use std::time::Duration;

/// USB vendor id assigned to PJRC (Teensy boards)
pub const TEENSY_VENDOR_ID: u16 = 5824;

/// Port description that identifies a USB-serial controller
pub const USB_SERIAL_DESCRIPTION: &str = "USB-Serial Controller";

/// Default serial baud rate
pub const DEFAULT_BAUD: u32 = 115_200;

/// Default acquisition loop rate in Hz
pub const DEFAULT_CLOCK_RATE_HZ: u32 = 1000;

/// Upper bound accepted for the acquisition loop rate
pub const MAX_CLOCK_RATE_HZ: u32 = 100_000;

/// Default per-read timeout. A line may not have arrived yet when a tick starts.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Spacing between samples as emitted by the firmware.
///
/// The log carries no per-row timestamp; sample `n` sits at `n * SAMPLE_PERIOD`
/// regardless of how fast the acquisition loop ran.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(10);

/// `chrono` format for session names
pub const SESSION_NAME_FORMAT: &str = "data_%Y-%m-%d_%H-%M-%S";

/// Delay honoured before the process exits
pub const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Independent toggles of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToggles {
    /// Write the column header before the first record
    pub emit_header: bool,
    /// Offer to render the recording once capture ends
    pub post_plot: bool,
}

impl Default for SessionToggles {
    fn default() -> Self {
        Self {
            emit_header: true,
            post_plot: true,
        }
    }
}

/// Serial link and pacing parameters for one acquisition run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionConfig {
    pub baud: u32,
    pub clock_rate_hz: u32,
    pub read_timeout: Duration,
    pub toggles: SessionToggles,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            clock_rate_hz: DEFAULT_CLOCK_RATE_HZ,
            read_timeout: DEFAULT_READ_TIMEOUT,
            toggles: SessionToggles::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Target duration of one tick
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.clock_rate_hz.max(1) as u64)
    }

    /// Reject settings the loop cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.baud == 0 {
            return Err(RecorderError::InvalidParameter(
                "Baud rate must be non-zero".to_string(),
            ));
        }

        if self.clock_rate_hz == 0 || self.clock_rate_hz > MAX_CLOCK_RATE_HZ {
            return Err(RecorderError::InvalidParameter(format!(
                "Clock rate must be between 1-{} Hz, got {}",
                MAX_CLOCK_RATE_HZ, self.clock_rate_hz
            )));
        }

        if self.read_timeout.is_zero() {
            return Err(RecorderError::InvalidParameter(
                "Read timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// True when one read may outlast a whole tick
    pub fn timeout_exceeds_tick(&self) -> bool {
        self.read_timeout > self.tick_period()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tick_period() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.tick_period(), Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_clock_rate() {
        let config = AcquisitionConfig {
            clock_rate_hz: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RecorderError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_excessive_clock_rate() {
        let config = AcquisitionConfig {
            clock_rate_hz: MAX_CLOCK_RATE_HZ + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_exceeds_tick() {
        // 10 ms timeout against a 1 ms tick
        assert!(AcquisitionConfig::default().timeout_exceeds_tick());

        let slow = AcquisitionConfig {
            clock_rate_hz: 50,
            ..Default::default()
        };
        assert!(!slow.timeout_exceeds_tick());
    }
}
