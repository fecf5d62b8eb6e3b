//! # Spor Library
//!
//! Crash-safe GPS track recording with GPX export.
//!
//! This library provides the core functionality for persisting every position
//! sample to an append-only binary log as it arrives, turning finished (or
//! orphaned) logs into GPX documents, and keeping running trip statistics.

pub mod config;
pub mod error;
pub mod geo;
pub mod gpx;
pub mod source;
pub mod track;
