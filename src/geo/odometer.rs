//! # Trip Odometer
//!
//! Running distance, elapsed time and average speed for one recording session.
//!
//! Distance is accumulated in whole centimeters: every accepted position adds
//! the rounded (half-up) distance from the previous one.

use std::fmt;
use std::time::{Duration, Instant};

use super::distance::distance;

/// Running trip statistics
#[derive(Debug, Clone)]
pub struct Odometer {
    /// Accumulated distance in centimeters
    distance_cm: i64,

    /// Previous position (lat, lng, alt)
    last: Option<[f64; 3]>,

    /// Monotonic start of the session
    start: Instant,

    /// Wall-clock start of the session (ms since epoch)
    start_timestamp_ms: i64,

    /// Elapsed time at the last accepted position
    elapsed_last_update: Duration,
}

impl Odometer {
    /// Start a new trip
    ///
    /// # Arguments
    ///
    /// * `start` - Monotonic instant the session started
    /// * `start_timestamp_ms` - Wall-clock time of the same moment, ms since epoch
    pub fn start(start: Instant, start_timestamp_ms: i64) -> Self {
        Self {
            distance_cm: 0,
            last: None,
            start,
            start_timestamp_ms,
            elapsed_last_update: Duration::ZERO,
        }
    }

    /// Accept a new position
    ///
    /// Adds the distance from the previous position unless the previous one
    /// had a NaN coordinate, then remembers this one.
    ///
    /// # Arguments
    ///
    /// * `lat`, `lng` - Position in degrees
    /// * `alt` - Altitude in meters
    /// * `at` - Monotonic instant the position was observed
    ///
    /// # Returns
    ///
    /// * `i64` - Sample timestamp in ms since epoch (wall-clock start + monotonic elapsed)
    pub fn update(&mut self, lat: f64, lng: f64, alt: f64, at: Instant) -> i64 {
        if let Some([prev_lat, prev_lng, prev_alt]) = self.last {
            if !prev_lat.is_nan() && !prev_lng.is_nan() && !prev_alt.is_nan() {
                let meters = distance(prev_lat, prev_lng, prev_alt, lat, lng, alt);
                self.distance_cm += round_half_up(meters * 100.0);
            }
        }

        self.last = Some([lat, lng, alt]);
        self.elapsed_last_update = at.saturating_duration_since(self.start);

        self.start_timestamp_ms + self.elapsed_last_update.as_millis() as i64
    }

    /// Accumulated distance in centimeters
    pub fn distance_cm(&self) -> i64 {
        self.distance_cm
    }

    /// Accumulated distance in meters
    pub fn distance_m(&self) -> f64 {
        self.distance_cm as f64 / 100.0
    }

    /// Wall-clock start of the trip (ms since epoch)
    pub fn start_timestamp_ms(&self) -> i64 {
        self.start_timestamp_ms
    }

    /// Time since the trip started
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }

    /// Average speed in m/s up to the last accepted position
    ///
    /// Uses whole seconds; returns 0 during the first second.
    pub fn speed_mps(&self) -> f64 {
        let seconds = self.elapsed_last_update.as_secs();
        if seconds == 0 {
            0.0
        } else {
            self.distance_m() / seconds as f64
        }
    }

    /// Snapshot for display
    pub fn summary(&self, now: Instant) -> TripSummary {
        TripSummary {
            distance_m: self.distance_m(),
            speed_mps: self.speed_mps(),
            duration: self.elapsed(now),
        }
    }
}

/// Round half up: floor(x + 0.5)
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Display snapshot of a trip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripSummary {
    pub distance_m: f64,
    pub speed_mps: f64,
    pub duration: Duration,
}

impl fmt::Display for TripSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.duration.as_secs() / 60;
        write!(
            f,
            "{:.0}m {:.1}km/h {}h{}m",
            self.distance_m,
            3.6 * self.speed_mps,
            minutes / 60,
            minutes % 60
        )
    }
}
