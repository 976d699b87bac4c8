//! Recording naming and the append-only log writer
//!
//! A recording is one capture session. Its log is a CSV file named after the
//! session start time; the rendered image sits next to it with the same stem.

use crate::config::SESSION_NAME_FORMAT;
use crate::Result;
use chrono::{DateTime, Local, TimeZone};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Column header written at the top of a fresh log
pub const HEADER: &str = "state,P_lower,P_middle,P_upper,P_average,valve_is_on,buzzer_is_on";

/// One capture session, identified by its timestamp-derived name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    name: String,
    directory: PathBuf,
}

impl Recording {
    /// Name a recording after the given session start time
    pub fn starting_at<Tz: TimeZone>(start: &DateTime<Tz>, directory: impl Into<PathBuf>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            name: start.format(SESSION_NAME_FORMAT).to_string(),
            directory: directory.into(),
        }
    }

    /// Name a recording after the current local time
    pub fn now(directory: impl Into<PathBuf>) -> Self {
        Self::starting_at(&Local::now(), directory)
    }

    /// Recover the recording a log file belongs to
    pub fn from_log_path(path: &Path) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { name, directory }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn csv_path(&self) -> PathBuf {
        self.directory.join(format!("{}.csv", self.name))
    }

    pub fn png_path(&self) -> PathBuf {
        self.directory.join(format!("{}.png", self.name))
    }
}

/// Exclusive, append-only handle on a recording's log
///
/// The log is flushed and released exactly once: by [`RecordingWriter::finish`]
/// on the normal path, or by `Drop` when the loop unwinds through an error.
pub struct RecordingWriter {
    inner: Option<BufWriter<File>>,
    path: PathBuf,
    records: u64,
    bytes: u64,
}

impl RecordingWriter {
    /// Open (or create) the log in append mode
    ///
    /// The header is only written into an empty file so that appending to an
    /// existing log never puts a header row mid-file.
    pub fn open(recording: &Recording, emit_header: bool) -> Result<Self> {
        let path = recording.csv_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = Self {
            inner: Some(BufWriter::new(file)),
            path,
            records: 0,
            bytes: 0,
        };

        if emit_header && is_empty {
            writer.write_raw(format!("{}\n", HEADER).as_bytes())?;
            tracing::debug!(path = %writer.path.display(), "wrote log header");
        }

        Ok(writer)
    }

    /// Append one record exactly as received
    pub fn append(&mut self, record: &[u8]) -> Result<()> {
        self.write_raw(record)?;
        self.records += 1;
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(inner) = self.inner.as_mut() {
            inner.write_all(bytes)?;
            self.bytes += bytes.len() as u64;
        }
        Ok(())
    }

    /// Number of records appended through this handle
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Bytes written through this handle, header included
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, sync and release the log
    pub fn finish(mut self) -> Result<PathBuf> {
        self.close()?;
        Ok(self.path.clone())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut inner) = self.inner.take() {
            inner.flush()?;
            inner.get_ref().sync_all()?;
            tracing::info!(
                path = %self.path.display(),
                records = self.records,
                bytes = self.bytes,
                "log closed"
            );
        }
        Ok(())
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(path = %self.path.display(), "failed to close log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_session_name_format() {
        let start = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 42).unwrap();
        let recording = Recording::starting_at(&start, "/tmp");
        assert_eq!(recording.name(), "data_2024-03-07_09-05-42");
        assert_eq!(
            recording.csv_path(),
            PathBuf::from("/tmp/data_2024-03-07_09-05-42.csv")
        );
        assert_eq!(
            recording.png_path(),
            PathBuf::from("/tmp/data_2024-03-07_09-05-42.png")
        );
    }

    #[test]
    fn test_from_log_path() {
        let recording = Recording::from_log_path(Path::new("runs/data_2024-01-01_00-00-00.csv"));
        assert_eq!(recording.name(), "data_2024-01-01_00-00-00");
        assert_eq!(
            recording.png_path(),
            PathBuf::from("runs/data_2024-01-01_00-00-00.png")
        );
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let recording = Recording::now(dir.path());

        let mut writer = RecordingWriter::open(&recording, true).unwrap();
        writer.append(b"idle,1.0,2.0,3.0,2.0,0,0\n").unwrap();
        writer.finish().unwrap();

        // Reopening an existing log appends without a second header
        let mut writer = RecordingWriter::open(&recording, true).unwrap();
        writer.append(b"idle,1.5,2.5,3.5,2.5,1,0\n").unwrap();
        assert_eq!(writer.records(), 1);
        writer.finish().unwrap();

        let contents = fs::read_to_string(recording.csv_path()).unwrap();
        assert_eq!(
            contents,
            format!(
                "{}\nidle,1.0,2.0,3.0,2.0,0,0\nidle,1.5,2.5,3.5,2.5,1,0\n",
                HEADER
            )
        );
    }

    #[test]
    fn test_no_header_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let recording = Recording::now(dir.path());

        let mut writer = RecordingWriter::open(&recording, false).unwrap();
        writer.append(b"a,1,2,3,2,0,1\n").unwrap();
        writer.append(b"").unwrap();
        assert_eq!(writer.records(), 2);
        assert_eq!(writer.bytes_written(), 14);
        writer.finish().unwrap();

        let contents = fs::read_to_string(recording.csv_path()).unwrap();
        assert_eq!(contents, "a,1,2,3,2,0,1\n");
    }

    #[test]
    fn test_drop_flushes_log() {
        let dir = tempfile::tempdir().unwrap();
        let recording = Recording::now(dir.path());

        {
            let mut writer = RecordingWriter::open(&recording, false).unwrap();
            writer.append(b"x,1,1,1,1,0,0\n").unwrap();
        }

        let contents = fs::read_to_string(recording.csv_path()).unwrap();
        assert_eq!(contents, "x,1,1,1,1,0,0\n");
    }
}
