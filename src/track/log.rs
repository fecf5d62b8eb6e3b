//! # Track Log
//!
//! Append-only binary file of fixed-size sample records.
//!
//! No header, footer or checksum: the file is a plain sequence of
//! [`RECORD_SIZE`]-byte records. A trailing remainder shorter than one record
//! is a torn write from a crash and is ignored by the reader.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::sample::{Sample, RECORD_SIZE};
use crate::error::Result;

/// Writer for one track log
///
/// Each record goes to the file with a single unbuffered write, so a killed
/// process loses at most the record being written.
#[derive(Debug)]
pub struct TrackLogWriter {
    /// Open log file, `None` once closed
    file: Option<File>,
    /// Path of the log file
    path: PathBuf,
    /// Records written so far
    samples: u64,
}

impl TrackLogWriter {
    /// Create a new, empty log for exclusive appending
    ///
    /// # Arguments
    ///
    /// * `path` - Log file path; must not exist yet
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists or the location is not writable
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)?;

        debug!("Opened track log {}", path.display());

        Ok(Self {
            file: Some(file),
            path,
            samples: 0,
        })
    }

    /// Append one sample
    ///
    /// # Errors
    ///
    /// Returns `Io` if the write fails or the log is already closed
    pub fn append(&mut self, sample: &Sample) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        file.write_all(&sample.encode())?;
        self.samples += 1;
        Ok(())
    }

    /// Flush written records to stable storage
    pub fn sync(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        file.sync_data()?;
        Ok(())
    }

    /// Sync and release the file handle
    ///
    /// Closing an already closed log is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
            debug!("Closed track log {} ({} samples)", self.path.display(), self.samples);
        }
        Ok(())
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended through this writer
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "track log is closed")
}

/// Sequential reader over the records of a track log
///
/// Yields samples in file order and stops silently at end of file or at a
/// trailing partial record.
#[derive(Debug)]
pub struct TrackLogReader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> TrackLogReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }

    /// Fill one record, `Ok(false)` if fewer than [`RECORD_SIZE`] bytes remain
    fn read_record(&mut self, record: &mut [u8; RECORD_SIZE]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match self.inner.read(&mut record[filled..]) {
                Ok(0) => return Ok(false),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for TrackLogReader<R> {
    type Item = io::Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut record = [0u8; RECORD_SIZE];
        match self.read_record(&mut record) {
            Ok(true) => Some(Ok(Sample::decode(&record))),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Open a track log for decoding
///
/// Every call starts a fresh pass from the beginning of the file.
///
/// # Errors
///
/// Returns `Io` if the file cannot be opened
///
/// # Examples
///
/// ```no_run
/// use spor::track::log::decode;
///
/// for sample in decode("track.spor")? {
///     let sample = sample?;
///     println!("{} {}", sample.latitude, sample.longitude);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn decode<P: AsRef<Path>>(path: P) -> Result<TrackLogReader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(TrackLogReader::new(BufReader::new(file)))
}

/// Number of complete records in a log, judged from its length
pub fn complete_records<P: AsRef<Path>>(path: P) -> Result<u64> {
    let len = std::fs::metadata(path)?.len();
    Ok(len / RECORD_SIZE as u64)
}
