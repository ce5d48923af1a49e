//! Running count persistence
//!
//! The not-yet-committed step tally is kept in a small JSON document so it
//! survives restarts until it is reset or committed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TallyError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct RunningCountFile {
    #[serde(default)]
    step_count: u32,
}

/// Key-value store for the running step count
#[derive(Debug)]
pub struct RunningCountStore {
    path: Option<PathBuf>,
    data: RunningCountFile,
}

impl RunningCountStore {
    /// Open the store at `path`; a missing file means a count of zero
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TallyError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents).map_err(|e| TallyError::RunningCount {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            RunningCountFile::default()
        };

        Ok(Self {
            path: Some(path),
            data,
        })
    }

    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RunningCountFile::default(),
        }
    }

    pub fn load(&self) -> u32 {
        self.data.step_count
    }

    /// Record `count` and write it out immediately
    pub fn save(&mut self, count: u32) -> Result<(), TallyError> {
        self.data.step_count = count;
        self.persist()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self) -> Result<(), TallyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.data)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_zero() {
        let dir = TempDir::new().unwrap();
        let store = RunningCountStore::open(dir.path().join("running.json")).unwrap();
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn test_save_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("running.json");

        let mut store = RunningCountStore::open(&path).unwrap();
        store.save(137).unwrap();

        let reopened = RunningCountStore::open(&path).unwrap();
        assert_eq!(reopened.load(), 137);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("running.json");
        fs::write(&path, "{ not json").unwrap();

        let result = RunningCountStore::open(&path);
        assert!(matches!(result, Err(TallyError::RunningCount { .. })));
    }

    #[test]
    fn test_in_memory_never_touches_disk() {
        let mut store = RunningCountStore::in_memory();
        store.save(9).unwrap();
        assert_eq!(store.load(), 9);
        assert!(store.path().is_none());
    }
}
