//! JSON file storage for the whole session map.

use crate::Sessions;
use crate::record::Memory;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Single-file storage, rewritten as a whole on every save.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    /// Path to the JSON file
    path: Utf8PathBuf,
}

impl JsonStorage {
    /// Create a new storage instance.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get default storage path.
    ///
    /// Priority:
    /// 1. SESSION_MEMORY_PATH environment variable (if set)
    /// 2. <data dir>/session-memory/memory_data.json
    pub fn default_path() -> Utf8PathBuf {
        if let Ok(custom_path) = std::env::var("SESSION_MEMORY_PATH") {
            return Utf8PathBuf::from(custom_path);
        }

        dirs::data_dir()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .map(|dir| dir.join("session-memory").join("memory_data.json"))
            .unwrap_or_else(|| Utf8PathBuf::from("session-memory/memory_data.json"))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn lock_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.lock", self.path))
    }

    /// Where an unreadable store file is moved by [`JsonStorage::move_aside`].
    pub fn corrupt_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.corrupt", self.path))
    }

    fn dir(&self) -> &Utf8Path {
        match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        }
    }

    /// Ensure storage directory exists.
    pub fn ensure_dir(&self) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir))
    }

    /// Load the session map. A missing file is an empty store.
    ///
    /// Records that fail to parse are skipped with a warning; a file that is
    /// not a session map at all is an error.
    pub fn load(&self) -> Result<Sessions> {
        if !self.path.exists() {
            return Ok(Sessions::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read storage: {}", self.path))?;

        if content.trim().is_empty() {
            return Ok(Sessions::new());
        }

        let raw: BTreeMap<String, Vec<serde_json::Value>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse storage: {}", self.path))?;

        let mut sessions = Sessions::new();
        for (session_id, records) in raw {
            let mut memories = Vec::with_capacity(records.len());
            for record in records {
                match serde_json::from_value::<Memory>(record) {
                    Ok(memory) => memories.push(memory),
                    Err(e) => {
                        warn!(session = %session_id, error = %e, "skipping unreadable memory record");
                    }
                }
            }
            if !memories.is_empty() {
                sessions.insert(session_id, memories);
            }
        }

        debug!(path = %self.path, sessions = sessions.len(), "loaded memory store");
        Ok(sessions)
    }

    /// Rename the store file to [`JsonStorage::corrupt_path`], replacing any
    /// earlier one, so the next save cannot overwrite it.
    pub fn move_aside(&self) -> Result<Utf8PathBuf> {
        let target = self.corrupt_path();
        fs::rename(&self.path, &target)
            .with_context(|| format!("Failed to move aside storage: {}", self.path))?;
        Ok(target)
    }

    /// Replace the file with the given session map.
    ///
    /// Holds an exclusive lock on `<path>.lock` while writing. The data goes
    /// to a temp file in the same directory and is renamed into place.
    pub fn save(&self, sessions: &Sessions) -> Result<()> {
        self.ensure_dir()?;

        let lock = self.acquire_lock()?;
        let result = self.write_atomic(sessions);

        if let Err(e) = FileExt::unlock(&lock) {
            warn!(path = %self.lock_path(), error = %e, "failed to release storage lock");
        }

        if result.is_ok() {
            debug!(path = %self.path, sessions = sessions.len(), "saved memory store");
        }
        result
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.lock_path();
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path))?;

        lock.lock_exclusive()
            .with_context(|| format!("Failed to lock storage: {}", lock_path))?;
        Ok(lock)
    }

    fn write_atomic(&self, sessions: &Sessions) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(self.dir())
            .with_context(|| format!("Failed to create temp file in: {}", self.dir()))?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, sessions)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace storage: {}", self.path))?;
        Ok(())
    }
}
