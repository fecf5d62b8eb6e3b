//! # GPX Export Module
//!
//! Converts a binary track log into a GPX 1.1 document.
//!
//! This module handles:
//! - Streaming samples from a track log into `<trkpt>` elements
//! - Formatting sample timestamps as UTC date-times
//! - Wrapping all points in a single `<trk>`/`<trkseg>`

pub mod writer;

pub use writer::{export, format_timestamp, GpxWriter, DEFAULT_CREATOR};

/// GPX 1.1 namespace
pub const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// GPX schema version written into the root element
pub const GPX_VERSION: &str = "1.1";
