//! # Geo Module
//!
//! Geodetic math for position samples.
//!
//! This module handles:
//! - 3-D distance between two samples (haversine + altitude delta)
//! - Running trip distance, elapsed time and average speed

pub mod distance;
pub mod odometer;

pub use distance::distance;
pub use odometer::{Odometer, TripSummary};
