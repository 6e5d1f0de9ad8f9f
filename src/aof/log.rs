//! Append-Only Log File
//!
//! [`AppendLog`] owns the log file handle behind a mutex. Writers append
//! complete lines; the reader opens a second handle and scans from the
//! beginning, so replay never disturbs the append position.
//!
//! ## Lock Coupling
//!
//! The storage engine must write records in the same order it applies
//! mutations to memory. [`AppendLog::writer`] returns a guard holding the log
//! lock. The engine takes it before its map lock, applies the mutation,
//! releases the map lock, and only then performs the file write.

use crate::aof::Record;
use crate::config::SyncPolicy;
use parking_lot::{Mutex, MutexGuard};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors produced by the append-only log.
#[derive(Debug, Error)]
pub enum AofError {
    /// The underlying file operation failed
    #[error("AOF I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record could not be encoded as JSON
    #[error("AOF serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The log has been closed
    #[error("AOF is closed")]
    Closed,
}

/// Outcome of reading the whole log back.
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Records that parsed successfully, in file order
    pub records: Vec<Record>,

    /// Non-empty lines that failed to parse and were skipped
    pub skipped: u64,
}

/// An append-only, newline-delimited JSON record file.
#[derive(Debug)]
pub struct AppendLog {
    /// Location of the file (used to open replay handles)
    path: PathBuf,

    /// Append handle; `None` once closed
    file: Mutex<Option<File>>,

    /// When to force data to disk
    sync_policy: SyncPolicy,
}

impl AppendLog {
    /// Opens the log at `path`, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>, sync_policy: SyncPolicy) -> Result<Self, AofError> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        terminate_torn_tail(&mut file, &path)?;

        info!(path = %path.display(), ?sync_policy, "Append-only log opened");

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            sync_policy,
        })
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locks the log for appending.
    ///
    /// Appends through the returned guard are serialized with every other
    /// writer until the guard is dropped.
    pub fn writer(&self) -> LogWriter<'_> {
        LogWriter {
            file: self.file.lock(),
            sync_policy: self.sync_policy,
        }
    }

    /// Appends a single record.
    pub fn append(&self, record: &Record) -> Result<(), AofError> {
        self.writer().append(record)
    }

    /// Reads every parseable record from the start of the file.
    pub fn read_all(&self) -> Result<Vec<Record>, AofError> {
        Ok(self.read_all_with_report()?.records)
    }

    /// Reads every parseable record and reports how many lines were skipped.
    ///
    /// Blank lines are ignored. Lines that are not valid UTF-8 or not a valid
    /// record are skipped so the rest of the file can still be recovered.
    pub fn read_all_with_report(&self) -> Result<ReplayReport, AofError> {
        // Hold the writer lock so no half-written line is observed.
        let _guard = self.file.lock();

        let reader = BufReader::new(File::open(&self.path)?);
        let mut report = ReplayReport::default();

        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<Record>(&line) {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    report.skipped += 1;
                    warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping unreadable AOF record"
                    );
                }
            }
        }

        debug!(
            path = %self.path.display(),
            records = report.records.len(),
            skipped = report.skipped,
            "AOF read complete"
        );

        Ok(report)
    }

    /// Flushes and releases the file handle.
    ///
    /// Closing twice is a no-op. Any append after close fails with
    /// [`AofError::Closed`].
    pub fn close(&self) -> Result<(), AofError> {
        let mut file = self.file.lock();
        if let Some(mut handle) = file.take() {
            handle.flush()?;
            handle.sync_all()?;
            info!(path = %self.path.display(), "Append-only log closed");
        }
        Ok(())
    }

    /// Returns true once [`AppendLog::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }
}

/// Ends a partially written final line with a newline.
///
/// Without this, the first record appended after a crash would be glued to
/// the torn line and both would be lost on the next replay.
fn terminate_torn_tail(file: &mut File, path: &Path) -> Result<(), AofError> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;

    if last[0] != b'\n' {
        warn!(path = %path.display(), "AOF ends with a partial record, terminating it");
        file.write_all(b"\n")?;
    }

    Ok(())
}

/// Exclusive append access to an [`AppendLog`].
pub struct LogWriter<'a> {
    file: MutexGuard<'a, Option<File>>,
    sync_policy: SyncPolicy,
}

impl LogWriter<'_> {
    /// Writes the record as one line in a single `write_all`.
    ///
    /// This is blocking file I/O (plus `sync_data` under
    /// [`SyncPolicy::Always`]) performed on the calling thread.
    pub fn append(&mut self, record: &Record) -> Result<(), AofError> {
        let file = self.file.as_mut().ok_or(AofError::Closed)?;
        let line = record.to_line()?;

        file.write_all(&line)?;
        if self.sync_policy == SyncPolicy::Always {
            file.sync_data()?;
        }

        Ok(())
    }
}
