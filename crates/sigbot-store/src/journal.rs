//! JSON Lines journal of signal snapshots.
//!
//! Each line is the full record after a write. Replaying the file and keeping
//! the last line per id rebuilds the store. A corrupt line only loses that
//! snapshot; replay skips it and carries on.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sigbot_core::Signal;
use tracing::{debug, info, warn};

use crate::error::StoreResult;

/// Append-only journal writer.
pub struct JournalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records_written: usize,
}

impl JournalWriter {
    /// Open `path` in append mode, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Opened signal journal (append mode)");

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    /// Append one snapshot and flush it to disk.
    pub fn append(&mut self, signal: &Signal) -> StoreResult<()> {
        let json = serde_json::to_string(signal)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        self.records_written += 1;
        Ok(())
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(?e, "Failed to flush journal on drop");
        }
        debug!(
            path = %self.path.display(),
            records = self.records_written,
            "Closed signal journal"
        );
    }
}

/// Read every snapshot in file order. A missing file is an empty journal.
pub fn replay(path: impl AsRef<Path>) -> StoreResult<Vec<Signal>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut snapshots = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Signal>(&line) {
            Ok(signal) => snapshots.push(signal),
            Err(e) => warn!(line = idx + 1, error = %e, "Skipping corrupt journal line"),
        }
    }

    debug!(path = %path.display(), snapshots = snapshots.len(), "Replayed signal journal");
    Ok(snapshots)
}

/// Rewrite `path` so it holds exactly `signals`, one line each.
///
/// Writes to a sibling temp file and renames it over the original.
pub fn compact(path: impl AsRef<Path>, signals: &[Signal]) -> StoreResult<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for signal in signals {
            writeln!(writer, "{}", serde_json::to_string(signal)?)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    debug!(path = %path.display(), records = signals.len(), "Compacted signal journal");
    Ok(())
}
