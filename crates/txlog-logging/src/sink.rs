use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};
use txlog_core::MessageRecord;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid record on line {line}: {source}")]
    InvalidLine {
        line: usize,
        source: serde_json::Error,
    },
}

/// Appends sealed records as JSON lines.
pub struct RecordWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RecordWriter {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "opened record file");

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Returns the path to the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record as a single line and flush it.
    pub fn write(&self, record: &MessageRecord) -> Result<(), SinkError> {
        let json = serde_json::to_string(record)?;
        let mut writer = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// A session callback that writes the sealed record here.
    ///
    /// Write failures are reported through `tracing`, since a callback has
    /// nowhere to return them.
    pub fn callback(self: &Arc<Self>) -> impl FnOnce(MessageRecord) + Send + 'static {
        self.callback_then(|_| {})
    }

    /// Like [`callback`](Self::callback), then hands the record to `next`.
    pub fn callback_then<F>(self: &Arc<Self>, next: F) -> impl FnOnce(MessageRecord) + Send + 'static
    where
        F: FnOnce(MessageRecord) + Send + 'static,
    {
        let writer = Arc::clone(self);
        move |record| {
            if let Err(e) = writer.write(&record) {
                warn!(path = %writer.path.display(), error = %e, "failed to write record");
            }
            next(record);
        }
    }
}

/// Read every record from a JSON lines file. Blank lines are skipped.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<MessageRecord>, SinkError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| SinkError::InvalidLine {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}
