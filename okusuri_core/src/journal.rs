//! Append-only journal of medication log revisions.
//!
//! Entries are appended to a JSONL (JSON Lines) file with file locking to
//! ensure safe concurrent access. Updating an entry appends a new revision
//! with the same id; readers keep the last revision of each id.

use crate::{LogEntry, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// JSONL-backed log journal
#[derive(Clone, Debug)]
pub struct LogJournal {
    path: PathBuf,
}

impl LogJournal {
    /// Create a journal at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append one revision of an entry
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;
        let torn = ends_mid_line(&mut file)?;

        let mut writer = std::io::BufWriter::new(&file);
        if torn {
            tracing::warn!("Journal {:?} ends with a partial line", self.path);
            writer.write_all(b"\n")?;
        }
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended log {} to journal", entry.id);
        Ok(())
    }

    /// Read the latest revision of every entry, in first-written order
    ///
    /// Lines that fail to parse are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let reader = BufReader::new(&file);
        let mut entries: Vec<LogEntry> = Vec::new();
        let mut positions = HashMap::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<LogEntry>(&line) {
                Ok(entry) => match positions.get(&entry.id) {
                    Some(&index) => entries[index] = entry,
                    None => {
                        positions.insert(entry.id, entries.len());
                        entries.push(entry);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to parse log at line {}: {}", line_num + 1, e);
                }
            }
        }

        file.unlock()?;
        tracing::debug!("Read {} logs from journal", entries.len());
        Ok(entries)
    }
}

/// True when a previous writer stopped before its trailing newline
fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
