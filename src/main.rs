//! # Spor
//!
//! Crash-safe GPS track recorder.
//!
//! Reads position fixes from stdin, persists every accepted fix to a binary
//! track log and exports the session as GPX when the input ends or on Ctrl+C.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use spor::config::{Config, LoggingConfig};
use spor::geo::Odometer;
use spor::source::{parse_fix, UpdatePolicy};
use spor::track::{recover_recordings, Cleanup, Recorder, RecoveryOutcome, RECORD_SIZE};

/// Seconds between trip summary log messages
const SUMMARY_INTERVAL_SECS: u64 = 60;

/// File name prefix for rotated log files
const LOG_FILE_PREFIX: &str = "spor.log";

/// Main entry point for Spor
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, defaults otherwise)
///    - Set up logging with tracing subscriber
///    - Recover track logs orphaned by a previous run
///
/// 2. **Main Loop**
///    - Read `lat lng alt` fixes from stdin
///    - Throttle them by time / distance
///    - Append accepted fixes to the track log off the async runtime
///    - Log a trip summary every minute
///
/// 3. **Shutdown** (stdin closed or Ctrl+C)
///    - Close the log, export GPX, delete the log
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The recording cannot be started
/// - A sample cannot be written (the partial log is recovered on next start)
///
/// # Examples
///
/// ```bash
/// printf "59.91 10.75 23.0\n59.92 10.76 25.5\n" | spor config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load config {}", path))?,
        None => Config::default(),
    };

    let _guard = init_logging(&config.logging);

    info!("Spor v{} starting...", env!("CARGO_PKG_VERSION"));

    if config.recovery.enabled {
        recover(&config).await?;
    }

    let recorder = Arc::new(Recorder::new(
        &config.storage.dir,
        &config.export.creator,
        &config.recording,
    ));
    recorder.start_recording().context("Failed to start recording")?;

    let mut odometer = Odometer::start(Instant::now(), Utc::now().timestamp_millis());
    let mut policy = UpdatePolicy::from_config(&config.recording);

    info!("Reading fixes from stdin, press Ctrl+C to stop");
    track(BufReader::new(tokio::io::stdin()), &recorder, &mut odometer, &mut policy).await?;

    let rec = Arc::clone(&recorder);
    let stopped = tokio::task::spawn_blocking(move || rec.stop_recording())
        .await?
        .context("Failed to export recording")?;

    if let Cleanup::Failed(e) = &stopped.cleanup {
        warn!("Track log left on disk: {}", e);
    }

    info!("Trip: {}", odometer.summary(Instant::now()));
    info!("Track saved to {}", stopped.gpx_path.display());

    Ok(())
}

/// Record fixes from `input` until it ends or Ctrl+C
///
/// Lines that are not valid UTF-8 or not a valid fix are skipped. Any other
/// read error ends the session like end of input, so the caller still exports
/// what was recorded.
///
/// # Errors
///
/// Returns error if a sample cannot be written
async fn track<R: AsyncBufRead + Unpin>(
    input: R,
    recorder: &Arc<Recorder>,
    odometer: &mut Odometer,
    policy: &mut UpdatePolicy,
) -> Result<()> {
    let mut lines = input.lines();
    let mut summary_interval = interval(Duration::from_secs(SUMMARY_INTERVAL_SECS));
    summary_interval.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Position source closed");
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                        warn!("Ignoring unreadable line: {}", e);
                        continue;
                    }
                    Err(e) => {
                        error!("Position source failed: {}", e);
                        break;
                    }
                };

                if line.trim().is_empty() {
                    continue;
                }

                let fix = match parse_fix(&line, Instant::now()) {
                    Ok(fix) => fix,
                    Err(e) => {
                        warn!("Ignoring fix: {}", e);
                        continue;
                    }
                };

                if !policy.accept(&fix) {
                    debug!("Throttled fix {:.6} {:.6}", fix.latitude, fix.longitude);
                    continue;
                }

                let timestamp = odometer.update(fix.latitude, fix.longitude, fix.altitude, fix.received);

                let rec = Arc::clone(recorder);
                let written = tokio::task::spawn_blocking(move || {
                    rec.record_data_point(timestamp, fix.latitude, fix.longitude, fix.altitude)
                })
                .await?;

                if let Err(e) = written {
                    error!("Recording aborted: {}", e);
                    return Err(e.into());
                }
            }

            _ = summary_interval.tick() => {
                info!("Trip: {}", odometer.summary(Instant::now()));
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Export logs left behind by a previous run
async fn recover(config: &Config) -> Result<()> {
    let dir = config.storage.dir.clone();
    let creator = config.export.creator.clone();
    let recovery = config.recovery.clone();

    let report = tokio::task::spawn_blocking(move || recover_recordings(&dir, &creator, &recovery)).await?;

    for outcome in &report.outcomes {
        if let RecoveryOutcome::Failed { log, .. } = outcome {
            warn!("Could not recover {}", log.display());
        }
    }

    if !report.is_empty() {
        info!(
            "Recovery finished: {} exported, {} failed, {} scanned",
            report.exported(),
            report.failed(),
            report.outcomes.len()
        );
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard must be kept
/// alive for file logging to flush.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_interval_constant() {
        assert_eq!(SUMMARY_INTERVAL_SECS, 60, "Summary should be logged once a minute");
    }

    #[test]
    fn test_log_file_prefix() {
        assert!(LOG_FILE_PREFIX.starts_with("spor"));
    }

    #[tokio::test]
    async fn test_track_skips_non_utf8_line() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::new(dir.path(), "spor", &Default::default()));
        let log = recorder.start_recording().unwrap();

        let input: &[u8] = b"59.0 10.0 0.0\n\xff\xfe garbage\n59.001 10.001 5.0\n";
        let mut odometer = Odometer::start(Instant::now(), 0);
        let mut policy = UpdatePolicy::new(Duration::from_secs(5), 5.0);

        track(input, &recorder, &mut odometer, &mut policy).await.unwrap();

        assert_eq!(recorder.sample_count(), Some(2));
        assert_eq!(std::fs::metadata(&log).unwrap().len(), 2 * RECORD_SIZE as u64);
        assert!(odometer.distance_cm() > 0);

        let stopped = recorder.stop_recording().unwrap();
        assert_eq!(stopped.points, 2);
        assert!(stopped.gpx_path.exists());
    }

    #[tokio::test]
    async fn test_track_stops_at_end_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::new(dir.path(), "spor", &Default::default()));
        recorder.start_recording().unwrap();

        let input: &[u8] = b"not a fix\n\n91 10 0\n";
        let mut odometer = Odometer::start(Instant::now(), 0);
        let mut policy = UpdatePolicy::new(Duration::from_secs(5), 5.0);

        track(input, &recorder, &mut odometer, &mut policy).await.unwrap();

        assert!(recorder.is_recording());
        assert_eq!(recorder.sample_count(), Some(0));
    }

    #[tokio::test]
    async fn test_recover_exports_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.dir = dir.path().to_string_lossy().into_owned();

        std::fs::write(dir.path().join("x.spor"), [0u8; 32]).unwrap();
        recover(&config).await.unwrap();

        assert!(!dir.path().join("x.spor").exists());
        assert!(dir.path().join("x.gpx").exists());
    }
}
