//! # Track Module
//!
//! Crash-safe recording of position samples.
//!
//! This module handles:
//! - The 32-byte big-endian sample record
//! - Append-only track log writing and tolerant decoding
//! - The single-session recorder state machine
//! - Startup recovery of logs left behind by a killed process

pub mod log;
pub mod recorder;
pub mod recovery;
pub mod sample;

pub use recorder::{Cleanup, Recorder, StoppedRecording};
pub use recovery::{recover_recordings, RecoveryOutcome, RecoveryReport};
pub use sample::{Sample, RECORD_SIZE};

/// Extension of binary track logs
pub const LOG_EXTENSION: &str = "spor";

/// Extension of exported GPX documents
pub const GPX_EXTENSION: &str = "gpx";
