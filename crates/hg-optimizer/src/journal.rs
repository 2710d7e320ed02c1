//! Newline-delimited JSON journal of trial results.

use hg_types::{SweepResult, TrialResult};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Appends one serialized [`TrialResult`] per line.
///
/// The file is created on first write and never truncated, so several
/// sweeps may share one journal.
#[derive(Debug)]
pub struct TrialJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TrialJournal {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, result: &TrialResult) -> SweepResult<()> {
        let _guard = self.write_lock.lock();

        let line = serde_json::to_string(result)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Read every record back. A missing file is an empty journal.
    pub fn load(path: impl AsRef<Path>) -> SweepResult<Vec<TrialResult>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut results = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            results.push(serde_json::from_str(&line)?);
        }
        Ok(results)
    }
}
