//! # Track Recovery
//!
//! Startup scan for track logs that were never closed.
//!
//! Every `.spor` file directly inside the storage directory is an orphan: the
//! recorder deletes its log after a successful stop, so anything left over
//! belongs to a session whose process died. Each orphan is exported next to
//! itself as `.gpx` and then deleted. Files are handled independently; one
//! failure never stops the scan.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::log::complete_records;
use super::recorder::Cleanup;
use super::{GPX_EXTENSION, LOG_EXTENSION};
use crate::config::RecoveryConfig;
use crate::error::SporError;
use crate::gpx;

/// What happened to one orphaned log
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// Exported to `gpx`
    Exported {
        log: PathBuf,
        gpx: PathBuf,
        points: u64,
        cleanup: Cleanup,
    },
    /// Shorter than one record, nothing to export
    Empty { log: PathBuf, cleanup: Cleanup },
    /// Export failed
    Failed {
        log: PathBuf,
        error: SporError,
        cleanup: Cleanup,
    },
}

impl RecoveryOutcome {
    /// The orphaned log this outcome is about
    pub fn log(&self) -> &Path {
        match self {
            RecoveryOutcome::Exported { log, .. }
            | RecoveryOutcome::Empty { log, .. }
            | RecoveryOutcome::Failed { log, .. } => log,
        }
    }

    /// What happened to the log file afterwards
    pub fn cleanup(&self) -> &Cleanup {
        match self {
            RecoveryOutcome::Exported { cleanup, .. }
            | RecoveryOutcome::Empty { cleanup, .. }
            | RecoveryOutcome::Failed { cleanup, .. } => cleanup,
        }
    }
}

/// Per-file results of a recovery scan
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub outcomes: Vec<RecoveryOutcome>,
}

impl RecoveryReport {
    /// Number of logs turned into GPX documents
    pub fn exported(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecoveryOutcome::Exported { .. }))
            .count()
    }

    /// Number of logs whose export failed
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecoveryOutcome::Failed { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Export and remove every orphaned log in `storage_dir`
///
/// Never fails: problems are logged and reported per file. A missing or
/// unreadable directory yields an empty report.
///
/// # Arguments
///
/// * `storage_dir` - Directory holding `.spor` logs
/// * `creator` - Producer name written into exported documents
/// * `config` - Recovery settings
///
/// # Examples
///
/// ```no_run
/// use spor::config::RecoveryConfig;
/// use spor::track::recover_recordings;
///
/// let report = recover_recordings("./spor", "spor", &RecoveryConfig::default());
/// println!("Recovered {} tracks", report.exported());
/// ```
pub fn recover_recordings<P: AsRef<Path>>(storage_dir: P, creator: &str, config: &RecoveryConfig) -> RecoveryReport {
    let storage_dir = storage_dir.as_ref();
    let mut report = RecoveryReport::default();

    if !storage_dir.is_dir() {
        return report;
    }

    let entries = match fs::read_dir(storage_dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to scan {}: {}", storage_dir.display(), e);
            return report;
        }
    };

    let mut orphans: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == LOG_EXTENSION))
        .collect();
    orphans.sort();

    for log in orphans {
        report.outcomes.push(recover_one(log, creator, config));
    }

    report
}

fn recover_one(log: PathBuf, creator: &str, config: &RecoveryConfig) -> RecoveryOutcome {
    let gpx_path = log.with_extension(GPX_EXTENSION);

    let exported = complete_records(&log).and_then(|records| {
        if records == 0 {
            Ok(None)
        } else {
            gpx::export(&log, &gpx_path, creator).map(Some)
        }
    });

    match exported {
        Ok(Some(points)) => {
            info!("Recovered {}", gpx_path.display());
            let cleanup = Cleanup::remove(&log);
            RecoveryOutcome::Exported {
                log,
                gpx: gpx_path,
                points,
                cleanup,
            }
        }
        Ok(None) => {
            info!("Discarding {}: no complete samples", log.display());
            let cleanup = Cleanup::remove(&log);
            RecoveryOutcome::Empty { log, cleanup }
        }
        Err(e) => {
            error!("Failed to recover {}: {}", log.display(), e);
            let cleanup = if config.keep_failed_logs {
                warn!("Keeping {} after failed recovery", log.display());
                Cleanup::Retained
            } else {
                Cleanup::remove(&log)
            };
            RecoveryOutcome::Failed {
                log,
                error: e,
                cleanup,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::log::TrackLogWriter;
    use crate::track::sample::Sample;
    use tempfile::tempdir;

    fn orphan(dir: &Path, name: &str, samples: &[Sample]) -> PathBuf {
        let path = dir.join(name);
        let mut writer = TrackLogWriter::create(&path).unwrap();
        for sample in samples {
            writer.append(sample).unwrap();
        }
        // No close: the process "died" here
        path
    }

    fn two_samples() -> Vec<Sample> {
        vec![
            Sample::new(59.0, 10.0, 0.0, 1_714_564_800_000),
            Sample::new(59.001, 10.001, 5.0, 1_714_564_805_000),
        ]
    }

    #[test]
    fn test_missing_directory_is_empty_report() {
        let dir = tempdir().unwrap();
        let report = recover_recordings(dir.path().join("nope"), "spor", &RecoveryConfig::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_well_formed_and_zero_byte_orphans() {
        let dir = tempdir().unwrap();
        let good = orphan(dir.path(), "20240501120000Z.spor", &two_samples());
        let empty = orphan(dir.path(), "20240501130000Z.spor", &[]);

        let report = recover_recordings(dir.path(), "spor", &RecoveryConfig::default());

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.exported(), 1);
        assert_eq!(report.failed(), 0);
        assert!(!good.exists());
        assert!(!empty.exists());

        let gpx = dir.path().join("20240501120000Z.gpx");
        let xml = fs::read_to_string(&gpx).unwrap();
        assert_eq!(xml.matches("<trkpt ").count(), 2);
        assert!(!dir.path().join("20240501130000Z.gpx").exists());

        match &report.outcomes[0] {
            RecoveryOutcome::Exported { points, cleanup, .. } => {
                assert_eq!(*points, 2);
                assert!(cleanup.is_removed());
            }
            other => panic!("Expected Exported, got: {:?}", other),
        }
        assert!(matches!(report.outcomes[1], RecoveryOutcome::Empty { .. }));
    }

    #[test]
    fn test_torn_record_is_dropped() {
        let dir = tempdir().unwrap();
        let path = orphan(dir.path(), "torn.spor", &two_samples());
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0x40; 20]);
        fs::write(&path, bytes).unwrap();

        let report = recover_recordings(dir.path(), "spor", &RecoveryConfig::default());
        match &report.outcomes[0] {
            RecoveryOutcome::Exported { points, .. } => assert_eq!(*points, 2),
            other => panic!("Expected Exported, got: {:?}", other),
        }
    }

    #[test]
    fn test_only_log_files_are_touched() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("old.gpx"), b"<gpx/>").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub.spor")).unwrap();
        orphan(&dir.path().join("sub.spor"), "nested.spor", &two_samples());

        let report = recover_recordings(dir.path(), "spor", &RecoveryConfig::default());

        assert!(report.is_empty());
        assert_eq!(fs::read(dir.path().join("old.gpx")).unwrap(), b"<gpx/>");
        assert!(dir.path().join("sub.spor").join("nested.spor").exists());
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = tempdir().unwrap();
        let bad = orphan(
            dir.path(),
            "a.spor",
            &[Sample::new(59.0, 10.0, 0.0, i64::MAX)],
        );
        let good = orphan(dir.path(), "b.spor", &two_samples());

        let report = recover_recordings(dir.path(), "spor", &RecoveryConfig::default());

        assert_eq!(report.exported(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!good.exists());
        assert!(dir.path().join("b.gpx").exists());

        // Default keeps the log whose export failed
        assert!(bad.exists());
        assert!(!dir.path().join("a.gpx").exists());
        match &report.outcomes[0] {
            RecoveryOutcome::Failed { error, cleanup, log } => {
                assert!(matches!(error, SporError::InvalidTimestamp(_)));
                assert!(matches!(cleanup, Cleanup::Retained));
                assert_eq!(log, &bad);
            }
            other => panic!("Expected Failed, got: {:?}", other),
        }
    }

    #[test]
    fn test_failed_log_deleted_when_not_kept() {
        let dir = tempdir().unwrap();
        let bad = orphan(
            dir.path(),
            "a.spor",
            &[Sample::new(59.0, 10.0, 0.0, i64::MIN)],
        );

        let config = RecoveryConfig {
            keep_failed_logs: false,
            ..RecoveryConfig::default()
        };
        let report = recover_recordings(dir.path(), "spor", &config);

        assert_eq!(report.failed(), 1);
        assert!(!bad.exists());
        assert!(report.outcomes[0].cleanup().is_removed());
        assert_eq!(report.outcomes[0].log(), bad.as_path());
    }

    #[test]
    fn test_existing_gpx_is_replaced() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x.gpx"), b"stale").unwrap();
        orphan(dir.path(), "x.spor", &two_samples());

        let report = recover_recordings(dir.path(), "spor", &RecoveryConfig::default());
        assert_eq!(report.exported(), 1);

        let xml = fs::read_to_string(dir.path().join("x.gpx")).unwrap();
        assert!(xml.contains("<trkseg>"));
    }
}
