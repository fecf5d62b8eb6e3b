//! # Track Samples
//!
//! One position observation and its fixed-size on-disk record.
//!
//! ```text
//! offset  size  field
//! 0       8     latitude      f64 big-endian (degrees)
//! 8       8     longitude     f64 big-endian (degrees)
//! 16      8     altitude      f64 big-endian (meters)
//! 24      8     timestamp     i64 big-endian (ms since epoch)
//! ```

use bytes::{Buf, BufMut};

/// Size of one encoded sample in bytes
pub const RECORD_SIZE: usize = 32;

/// One recorded position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in meters
    pub altitude: f64,

    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl Sample {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp_ms,
        }
    }

    /// Encode into a 32-byte record
    ///
    /// # Examples
    ///
    /// ```
    /// use spor::track::sample::{Sample, RECORD_SIZE};
    ///
    /// let record = Sample::new(59.0, 10.0, 0.0, 0).encode();
    /// assert_eq!(record.len(), RECORD_SIZE);
    /// ```
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut record = [0u8; RECORD_SIZE];
        let mut buf = &mut record[..];

        buf.put_f64(self.latitude);
        buf.put_f64(self.longitude);
        buf.put_f64(self.altitude);
        buf.put_i64(self.timestamp_ms);

        record
    }

    /// Decode a 32-byte record
    pub fn decode(record: &[u8; RECORD_SIZE]) -> Self {
        let mut buf = &record[..];

        Self {
            latitude: buf.get_f64(),
            longitude: buf.get_f64(),
            altitude: buf.get_f64(),
            timestamp_ms: buf.get_i64(),
        }
    }
}
