//! # Track Recorder
//!
//! Owns at most one active track log and drives it through
//! `Idle -> Recording -> Idle`.
//!
//! The state and the open writer live behind one mutex, so an append racing a
//! stop is serialized: the stop waits for the in-flight append, then closes.

use std::fs;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::log::TrackLogWriter;
use super::sample::Sample;
use super::{GPX_EXTENSION, LOG_EXTENSION};
use crate::config::RecordingConfig;
use crate::error::{Result, SporError};
use crate::gpx;

/// File name pattern for a session started at a given UTC time
const FILE_NAME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// Result of a best-effort cleanup step
#[derive(Debug)]
pub enum Cleanup {
    /// Binary log deleted
    Removed,
    /// Binary log deliberately kept on disk
    Retained,
    /// Deleting the binary log failed; the log is still on disk
    Failed(io::Error),
}

impl Cleanup {
    /// Delete `path`, logging instead of failing
    pub(crate) fn remove(path: &Path) -> Self {
        match fs::remove_file(path) {
            Ok(()) => Cleanup::Removed,
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                Cleanup::Failed(e)
            }
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Cleanup::Removed)
    }
}

/// Outcome of a successful `stop_recording`
#[derive(Debug)]
pub struct StoppedRecording {
    /// Exported GPX document
    pub gpx_path: PathBuf,
    /// Track points in the document
    pub points: u64,
    /// Deletion of the binary log
    pub cleanup: Cleanup,
}

/// Open session
#[derive(Debug)]
struct ActiveRecording {
    writer: TrackLogWriter,
    gpx_path: PathBuf,
}

#[derive(Debug)]
enum RecorderState {
    Idle,
    Recording(ActiveRecording),
}

/// Single-session track recorder
///
/// One instance per process; the owner hands it around by reference (or
/// `Arc`) rather than relying on global state.
#[derive(Debug)]
pub struct Recorder {
    /// Directory for logs and exported documents
    storage_dir: PathBuf,
    /// `creator` attribute for exported documents
    creator: String,
    /// Sync the log every N samples (0 = only at stop)
    sync_interval: u32,
    state: Mutex<RecorderState>,
    #[cfg(test)]
    before_cleanup: Option<fn(&Path)>,
}

impl Recorder {
    /// Create an idle recorder
    ///
    /// # Arguments
    ///
    /// * `storage_dir` - Directory for `.spor` logs and `.gpx` documents
    /// * `creator` - Producer name written into exported documents
    /// * `config` - Recording settings
    pub fn new<P: Into<PathBuf>>(storage_dir: P, creator: &str, config: &RecordingConfig) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            creator: creator.to_string(),
            sync_interval: config.sync_interval,
            state: Mutex::new(RecorderState::Idle),
            #[cfg(test)]
            before_cleanup: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a session named after the current UTC time
    ///
    /// # Returns
    ///
    /// * `Result<PathBuf>` - Path of the new binary log
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRecording` if a session is active (the active session is
    /// left untouched), or `Io` if the log cannot be created
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spor::config::RecordingConfig;
    /// use spor::track::Recorder;
    ///
    /// let recorder = Recorder::new("./spor", "spor", &RecordingConfig::default());
    /// let log = recorder.start_recording()?;
    /// recorder.record_data_point(1_700_000_000_000, 59.0, 10.0, 12.0)?;
    /// let stopped = recorder.stop_recording()?;
    /// println!("{} -> {}", log.display(), stopped.gpx_path.display());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn start_recording(&self) -> Result<PathBuf> {
        self.start_recording_at(Utc::now())
    }

    /// Start a session named after `now`
    pub fn start_recording_at(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        let mut state = self.lock();

        if let RecorderState::Recording(active) = &*state {
            error!("Attempted to start recorder while recording active");
            return Err(SporError::AlreadyRecording(active.writer.path().to_path_buf()));
        }

        if !self.storage_dir.is_dir() {
            fs::create_dir_all(&self.storage_dir)?;
            info!("Created storage directory {}", self.storage_dir.display());
        }

        let base = now.format(FILE_NAME_FORMAT).to_string();
        let (log_path, gpx_path) = self.session_paths(&base);
        let writer = TrackLogWriter::create(&log_path)?;

        info!("Recording to {}", log_path.display());
        *state = RecorderState::Recording(ActiveRecording { writer, gpx_path });

        Ok(log_path)
    }

    /// Pick `<base>.spor`/`<base>.gpx`, adding `-N` while either already exists
    fn session_paths(&self, base: &str) -> (PathBuf, PathBuf) {
        let mut suffix = 0u32;
        loop {
            let stem = if suffix == 0 {
                base.to_string()
            } else {
                format!("{}-{}", base, suffix)
            };

            let log_path = self.storage_dir.join(format!("{}.{}", stem, LOG_EXTENSION));
            let gpx_path = self.storage_dir.join(format!("{}.{}", stem, GPX_EXTENSION));
            if !log_path.exists() && !gpx_path.exists() {
                if suffix > 0 {
                    warn!("Session name {} taken, using {}", base, stem);
                }
                return (log_path, gpx_path);
            }

            suffix += 1;
        }
    }

    /// Whether a session is active
    pub fn is_recording(&self) -> bool {
        matches!(*self.lock(), RecorderState::Recording(_))
    }

    /// Path of the active binary log, if any
    pub fn active_log(&self) -> Option<PathBuf> {
        match &*self.lock() {
            RecorderState::Recording(active) => Some(active.writer.path().to_path_buf()),
            RecorderState::Idle => None,
        }
    }

    /// Number of samples in the active session
    pub fn sample_count(&self) -> Option<u64> {
        match &*self.lock() {
            RecorderState::Recording(active) => Some(active.writer.samples()),
            RecorderState::Idle => None,
        }
    }

    /// Append one sample to the active log
    ///
    /// # Arguments
    ///
    /// * `timestamp_ms` - Sample time, ms since epoch
    /// * `lat`, `lng` - Position in degrees
    /// * `alt` - Altitude in meters
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` while idle. An `Io` error abandons the session:
    /// the recorder goes back to idle and the partial log stays on disk for
    /// recovery.
    pub fn record_data_point(&self, timestamp_ms: i64, lat: f64, lng: f64, alt: f64) -> Result<()> {
        let mut state = self.lock();

        let RecorderState::Recording(active) = &mut *state else {
            return Err(SporError::NotRecording);
        };

        let sample = Sample::new(lat, lng, alt, timestamp_ms);
        let result = active.writer.append(&sample).and_then(|()| {
            let written = active.writer.samples();
            if self.sync_interval > 0 && written % u64::from(self.sync_interval) == 0 {
                active.writer.sync()?;
            }
            Ok(())
        });

        if let Err(e) = result {
            error!(
                "Failed to write {}, abandoning session: {}",
                active.writer.path().display(),
                e
            );
            *state = RecorderState::Idle;
            return Err(e);
        }

        debug!("Recorded sample {} at {}", active.writer.samples(), timestamp_ms);
        Ok(())
    }

    /// Close the active log, export it as GPX and delete the log
    ///
    /// The recorder is idle afterwards whatever the outcome. A failed deletion
    /// is reported in [`StoppedRecording::cleanup`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` while idle. Close or export failures are
    /// returned as-is and the binary log is kept for recovery.
    pub fn stop_recording(&self) -> Result<StoppedRecording> {
        let mut state = self.lock();

        let RecorderState::Recording(mut active) = mem::replace(&mut *state, RecorderState::Idle) else {
            return Err(SporError::NotRecording);
        };

        let log_path = active.writer.path().to_path_buf();
        let gpx_path = active.gpx_path;

        let exported = active
            .writer
            .close()
            .and_then(|()| gpx::export(&log_path, &gpx_path, &self.creator));

        let points = match exported {
            Ok(points) => points,
            Err(e) => {
                error!("Failed to export {}, keeping it for recovery: {}", log_path.display(), e);
                return Err(e);
            }
        };

        info!("Saved {} ({} points)", gpx_path.display(), points);

        #[cfg(test)]
        if let Some(hook) = self.before_cleanup {
            hook(&log_path);
        }

        let cleanup = Cleanup::remove(&log_path);

        Ok(StoppedRecording {
            gpx_path,
            points,
            cleanup,
        })
    }
}
