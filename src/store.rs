//! Persistent event record stores.
//!
//! The file-backed store writes JSON Lines: one [`RunHeader`] object on the
//! first line, then one [`EventRecord`] object per event. The file is
//! recreated on open.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::record::{EventRecord, RunHeader};
use crate::error::{Error, Result};

/// Append-only sink for event records.
pub trait RecordStore {
    /// Append one record. Records are immutable once appended.
    fn append(&mut self, record: &EventRecord) -> Result<()>;

    /// Make every appended record durable. Further appends are an error.
    fn finalize(&mut self) -> Result<()>;
}

/// Default output file for this process: `<dir>/<pid>.jsonl`.
pub fn default_output_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(format!("{}.jsonl", std::process::id()))
}

/// JSON Lines file store.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    appended: u64,
}

impl JsonlStore {
    /// Create (or truncate) the file at `path`, creating its parent directory,
    /// and write the run header.
    ///
    /// Errors: `Error::StoreUnavailable` if the directory or file cannot be created.
    pub fn create(path: impl AsRef<Path>, header: &RunHeader) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |source| Error::StoreUnavailable {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(unavailable)?;
        }
        let file = File::create(&path).map_err(unavailable)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, header)?;
        writer.write_all(b"\n")?;

        log::info!("Opened record store {:?}", path);
        Ok(Self {
            path,
            writer: Some(writer),
            appended: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended so far.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn is_finalized(&self) -> bool {
        self.writer.is_none()
    }
}

impl RecordStore for JsonlStore {
    fn append(&mut self, record: &EventRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(Error::EventLifecycle("append after store was finalized"))?;
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        self.appended += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush()?;
        writer.get_ref().sync_all()?;
        log::info!(
            "Finalized record store {:?} ({} records)",
            self.path,
            self.appended
        );
        Ok(())
    }
}

impl Drop for JsonlStore {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            log::warn!(
                "Record store {:?} dropped without finalize; flushing {} records",
                self.path,
                self.appended
            );
            if let Err(e) = writer.flush() {
                log::error!("Failed to flush record store {:?}: {}", self.path, e);
            }
        }
    }
}

/// In-process store, keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<EventRecord>,
    finalized: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn into_records(self) -> Vec<EventRecord> {
        self.records
    }
}

impl RecordStore for MemoryStore {
    fn append(&mut self, record: &EventRecord) -> Result<()> {
        if self.finalized {
            return Err(Error::EventLifecycle("append after store was finalized"));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}

/// Read a JSON Lines run file back into its header and records.
///
/// Errors: `Error::MalformedRecord` for a record whose `Pos` and `Edep`
/// lengths differ; line numbers are 1-based and count the header.
pub fn read_run(path: impl AsRef<Path>) -> Result<(RunHeader, Vec<EventRecord>)> {
    let file = File::open(path.as_ref())?;
    let mut lines = BufReader::new(file).lines();

    let header_line = lines.next().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "run file has no header line",
        ))
    })??;
    let header: RunHeader = serde_json::from_str(&header_line)?;

    let mut records = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: EventRecord = serde_json::from_str(&line)?;
        record
            .check_columns()
            .map_err(|reason| Error::MalformedRecord { line: i + 2, reason })?;
        records.push(record);
    }
    log::info!("Loaded {} records from {:?}", records.len(), path.as_ref());
    Ok((header, records))
}
