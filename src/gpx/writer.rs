//! # GPX Writer
//!
//! Streaming GPX 1.1 writer built on `quick_xml`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::DateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, warn};

use super::{GPX_NAMESPACE, GPX_VERSION};
use crate::error::{Result, SporError};
use crate::track::log::decode;
use crate::track::sample::Sample;

/// Default `creator` attribute
pub const DEFAULT_CREATOR: &str = "spor";

/// UTC date-time pattern for `<time>` (second precision)
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a millisecond timestamp as `yyyy-MM-ddTHH:mm:ssZ`
///
/// Sub-second precision is dropped.
///
/// # Errors
///
/// Returns `InvalidTimestamp` if the value is outside the representable range
///
/// # Examples
///
/// ```
/// use spor::gpx::format_timestamp;
///
/// assert_eq!(format_timestamp(0).unwrap(), "1970-01-01T00:00:00Z");
/// assert_eq!(format_timestamp(1_999).unwrap(), "1970-01-01T00:00:01Z");
/// ```
pub fn format_timestamp(timestamp_ms: i64) -> Result<String> {
    let time = DateTime::from_timestamp_millis(timestamp_ms)
        .ok_or(SporError::InvalidTimestamp(timestamp_ms))?;
    Ok(time.format(TIME_FORMAT).to_string())
}

/// Writes one track with one segment, point by point
pub struct GpxWriter<W: Write> {
    writer: Writer<W>,
    points: u64,
}

impl<W: Write> GpxWriter<W> {
    /// Start a document and open `<gpx>`, `<trk>` and `<trkseg>`
    ///
    /// # Arguments
    ///
    /// * `inner` - Output sink
    /// * `creator` - Producer written into the `creator` attribute
    /// * `name` - Track name, also used as the metadata name
    pub fn new(inner: W, creator: &str, name: &str) -> Result<Self> {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let mut root = BytesStart::new("gpx");
        root.push_attribute(("version", GPX_VERSION));
        root.push_attribute(("creator", creator));
        root.push_attribute(("xmlns", GPX_NAMESPACE));
        writer.write_event(Event::Start(root))?;

        writer.write_event(Event::Start(BytesStart::new("metadata")))?;
        write_text_element(&mut writer, "name", name)?;
        writer.write_event(Event::End(BytesEnd::new("metadata")))?;

        writer.write_event(Event::Start(BytesStart::new("trk")))?;
        write_text_element(&mut writer, "name", name)?;
        writer.write_event(Event::Start(BytesStart::new("trkseg")))?;

        Ok(Self { writer, points: 0 })
    }

    /// Write one `<trkpt>`
    pub fn write_point(&mut self, sample: &Sample) -> Result<()> {
        let time = format_timestamp(sample.timestamp_ms)?;
        let lat = sample.latitude.to_string();
        let lon = sample.longitude.to_string();

        let mut point = BytesStart::new("trkpt");
        point.push_attribute(("lat", lat.as_str()));
        point.push_attribute(("lon", lon.as_str()));
        self.writer.write_event(Event::Start(point))?;

        write_text_element(&mut self.writer, "ele", &sample.altitude.to_string())?;
        write_text_element(&mut self.writer, "time", &time)?;

        self.writer.write_event(Event::End(BytesEnd::new("trkpt")))?;
        self.points += 1;
        Ok(())
    }

    /// Points written so far
    pub fn points(&self) -> u64 {
        self.points
    }

    /// Close all open elements and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        self.writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
        self.writer.write_event(Event::End(BytesEnd::new("trk")))?;
        self.writer.write_event(Event::End(BytesEnd::new("gpx")))?;
        Ok(self.writer.into_inner())
    }
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Convert a track log into a GPX document
///
/// Samples are streamed; the log is never held in memory as a whole. The
/// output file is created (or truncated) and synced before returning.
///
/// # Arguments
///
/// * `log_path` - Binary track log to read
/// * `gpx_path` - Document to write
/// * `creator` - Producer written into the `creator` attribute
///
/// # Returns
///
/// * `Result<u64>` - Number of track points written
///
/// # Errors
///
/// Returns error if the log cannot be read, the output cannot be written,
/// or a sample carries an unrepresentable timestamp
///
/// # Examples
///
/// ```no_run
/// use spor::gpx::export;
///
/// let points = export("20240501120000Z.spor", "20240501120000Z.gpx", "spor")?;
/// println!("Exported {} points", points);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn export<P: AsRef<Path>, Q: AsRef<Path>>(log_path: P, gpx_path: Q, creator: &str) -> Result<u64> {
    let log_path = log_path.as_ref();
    let gpx_path = gpx_path.as_ref();

    let samples = decode(log_path)?;
    let name = gpx_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = File::create(gpx_path)?;
    let written = (|| -> Result<u64> {
        let mut gpx = GpxWriter::new(BufWriter::new(file), creator, &name)?;
        for sample in samples {
            gpx.write_point(&sample?)?;
        }

        let points = gpx.points();
        let mut out = gpx.finish()?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(points)
    })();

    // Drop partial output
    let points = match written {
        Ok(points) => points,
        Err(e) => {
            if let Err(remove_err) = std::fs::remove_file(gpx_path) {
                warn!("Failed to delete partial {}: {}", gpx_path.display(), remove_err);
            }
            return Err(e);
        }
    };

    debug!(
        "Exported {} points from {} to {}",
        points,
        log_path.display(),
        gpx_path.display()
    );

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::log::TrackLogWriter;
    use tempfile::tempdir;

    /// Pull (lat, lon, ele, time) out of every `<trkpt>`
    fn track_points(xml: &str) -> Vec<(f64, f64, f64, String)> {
        let mut points = Vec::new();
        for chunk in xml.split("<trkpt ").skip(1) {
            let attr = |name: &str| -> f64 {
                let start = chunk.find(&format!("{}=\"", name)).unwrap() + name.len() + 2;
                let end = start + chunk[start..].find('"').unwrap();
                chunk[start..end].parse().unwrap()
            };
            let text = |tag: &str| -> String {
                let open = format!("<{}>", tag);
                let start = chunk.find(&open).unwrap() + open.len();
                let end = start + chunk[start..].find('<').unwrap();
                chunk[start..end].to_string()
            };
            points.push((attr("lat"), attr("lon"), text("ele").parse().unwrap(), text("time")));
        }
        points
    }

    #[test]
    fn test_format_timestamp_truncates_millis() {
        assert_eq!(format_timestamp(1_700_000_000_999).unwrap(), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_format_timestamp_before_epoch() {
        assert_eq!(format_timestamp(-1).unwrap(), "1969-12-31T23:59:59Z");
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert!(matches!(
            format_timestamp(i64::MAX),
            Err(SporError::InvalidTimestamp(i64::MAX))
        ));
    }

    #[test]
    fn test_document_structure() {
        let mut gpx = GpxWriter::new(Vec::new(), "spor-test", "morning").unwrap();
        gpx.write_point(&Sample::new(59.0, 10.0, 0.0, 0)).unwrap();
        let xml = String::from_utf8(gpx.finish().unwrap()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(xml.contains("<gpx version=\"1.1\" creator=\"spor-test\" xmlns=\"http://www.topografix.com/GPX/1/1\">"));
        assert!(xml.contains("<name>morning</name>"));
        assert_eq!(xml.matches("<trk>").count(), 1);
        assert_eq!(xml.matches("<trkseg>").count(), 1);
        assert_eq!(xml.matches("<trkpt ").count(), 1);
        assert!(xml.trim_end().ends_with("</gpx>"));
    }

    #[test]
    fn test_coordinates_written_exactly() {
        let sample = Sample::new(59.123456789012, -10.000000000001, 1234.5678901, 0);
        let mut gpx = GpxWriter::new(Vec::new(), DEFAULT_CREATOR, "t").unwrap();
        gpx.write_point(&sample).unwrap();
        let xml = String::from_utf8(gpx.finish().unwrap()).unwrap();

        let points = track_points(&xml);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].0, sample.latitude);
        assert_eq!(points[0].1, sample.longitude);
        assert_eq!(points[0].2, sample.altitude);
    }

    #[test]
    fn test_creator_is_escaped() {
        let gpx = GpxWriter::new(Vec::new(), "a&b", "t").unwrap();
        let xml = String::from_utf8(gpx.finish().unwrap()).unwrap();
        assert!(xml.contains("creator=\"a&amp;b\""));
    }

    #[test]
    fn test_export_log_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("20240501120000Z.spor");
        let gpx_path = dir.path().join("20240501120000Z.gpx");

        let t0 = 1_714_564_800_000;
        let mut writer = TrackLogWriter::create(&log_path).unwrap();
        writer.append(&Sample::new(59.0, 10.0, 0.0, t0)).unwrap();
        writer.append(&Sample::new(59.001, 10.001, 5.0, t0 + 5_500)).unwrap();
        writer.close().unwrap();

        let points = export(&log_path, &gpx_path, DEFAULT_CREATOR).unwrap();
        assert_eq!(points, 2);

        let xml = std::fs::read_to_string(&gpx_path).unwrap();
        assert!(xml.contains("<name>20240501120000Z</name>"));

        let parsed = track_points(&xml);
        assert_eq!(
            parsed,
            vec![
                (59.0, 10.0, 0.0, "2024-05-01T12:00:00Z".to_string()),
                (59.001, 10.001, 5.0, "2024-05-01T12:00:05Z".to_string()),
            ]
        );

        // Log is left in place, deleting it is the caller's call
        assert!(log_path.exists());
    }

    #[test]
    fn test_export_empty_log() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("empty.spor");
        let gpx_path = dir.path().join("empty.gpx");
        std::fs::write(&log_path, b"").unwrap();

        assert_eq!(export(&log_path, &gpx_path, DEFAULT_CREATOR).unwrap(), 0);
        let xml = std::fs::read_to_string(&gpx_path).unwrap();
        assert!(xml.contains("<trkseg>"));
        assert_eq!(xml.matches("<trkpt ").count(), 0);
    }

    #[test]
    fn test_export_failure_removes_partial_output() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("bad.spor");
        let gpx_path = dir.path().join("bad.gpx");

        let mut writer = TrackLogWriter::create(&log_path).unwrap();
        writer.append(&Sample::new(59.0, 10.0, 0.0, 0)).unwrap();
        writer.append(&Sample::new(59.0, 10.0, 0.0, i64::MAX)).unwrap();
        writer.close().unwrap();

        let result = export(&log_path, &gpx_path, DEFAULT_CREATOR);
        assert!(matches!(result, Err(SporError::InvalidTimestamp(i64::MAX))));
        assert!(!gpx_path.exists());
        assert!(log_path.exists());
    }

    #[test]
    fn test_export_missing_log() {
        let dir = tempdir().unwrap();
        let result = export(dir.path().join("gone.spor"), dir.path().join("gone.gpx"), DEFAULT_CREATOR);
        assert!(matches!(result, Err(SporError::Io(_))));
        assert!(!dir.path().join("gone.gpx").exists());
    }
}
