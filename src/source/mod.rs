//! # Position Source Module
//!
//! Adapter between an external positioning source and the recorder.
//!
//! This module handles:
//! - Parsing text fixes (`lat lng alt`, whitespace or comma separated)
//! - Throttling fixes by time or distance travelled, whichever comes first

use std::time::{Duration, Instant};

use crate::config::RecordingConfig;
use crate::error::{Result, SporError};
use crate::geo::distance;

/// One position fix from the positioning source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in meters
    pub altitude: f64,

    /// Monotonic arrival time
    pub received: Instant,
}

/// Parse a text fix
///
/// # Arguments
///
/// * `line` - `lat lng alt`, separated by whitespace and/or commas
/// * `received` - Arrival time of the line
///
/// # Errors
///
/// Returns `InvalidFix` if the line does not hold exactly three numbers or
/// the coordinates are out of range
///
/// # Examples
///
/// ```
/// use spor::source::parse_fix;
/// use std::time::Instant;
///
/// let fix = parse_fix("59.91, 10.75, 23.5", Instant::now())?;
/// assert_eq!(fix.altitude, 23.5);
/// # Ok::<(), spor::error::SporError>(())
/// ```
pub fn parse_fix(line: &str, received: Instant) -> Result<Fix> {
    let fields: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() != 3 {
        return Err(SporError::InvalidFix(format!(
            "expected 3 fields (lat lng alt), got {}",
            fields.len()
        )));
    }

    let mut values = [0.0f64; 3];
    for (value, field) in values.iter_mut().zip(&fields) {
        *value = field
            .parse()
            .map_err(|_| SporError::InvalidFix(format!("not a number: '{}'", field)))?;
    }
    let [latitude, longitude, altitude] = values;

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(SporError::InvalidFix(format!("latitude {} out of range", latitude)));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(SporError::InvalidFix(format!("longitude {} out of range", longitude)));
    }
    if !altitude.is_finite() {
        return Err(SporError::InvalidFix(format!("altitude {} is not finite", altitude)));
    }

    Ok(Fix {
        latitude,
        longitude,
        altitude,
        received,
    })
}

/// Delivery policy for fixes
///
/// The first fix always passes. After that a fix passes once `min_interval`
/// has elapsed or it is at least `min_distance_m` from the last accepted fix.
#[derive(Debug, Clone)]
pub struct UpdatePolicy {
    min_interval: Duration,
    min_distance_m: f64,
    last: Option<Fix>,
}

impl UpdatePolicy {
    pub fn new(min_interval: Duration, min_distance_m: f64) -> Self {
        Self {
            min_interval,
            min_distance_m,
            last: None,
        }
    }

    /// Build from the recording configuration
    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(Duration::from_millis(config.min_interval_ms), config.min_distance_m)
    }

    /// Decide whether `fix` should be recorded, remembering it if so
    pub fn accept(&mut self, fix: &Fix) -> bool {
        let accepted = match &self.last {
            None => true,
            Some(last) => {
                let waited = fix.received.saturating_duration_since(last.received) >= self.min_interval;
                let moved = distance(
                    last.latitude,
                    last.longitude,
                    last.altitude,
                    fix.latitude,
                    fix.longitude,
                    fix.altitude,
                ) >= self.min_distance_m;
                waited || moved
            }
        };

        if accepted {
            self.last = Some(*fix);
        }
        accepted
    }
}
