//! Error types for the pressure recorder

use thiserror::Error;

/// Error type for recording and analysis operations
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Serial port could not be opened (busy, missing, or permission denied)
    #[error("Serial port {port} unavailable: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Filesystem or serial I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A log row that cannot be reconstructed
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// Log holds no samples to reconstruct
    #[error("Recording contains no samples")]
    EmptyRecording,

    /// Drawing backend failure
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;
