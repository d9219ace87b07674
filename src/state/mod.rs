//! Persisted state between runs
//!
//! A single JSON snapshot holding the last observed value and the time of
//! the last successful run. Each run overwrites it.

pub mod snapshot;

pub use snapshot::Snapshot;

use std::path::{Path, PathBuf};

/// JSON file holding the latest [`Snapshot`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous snapshot.
    ///
    /// A missing, unreadable or corrupt file yields `None` so the run
    /// proceeds as a first run.
    pub fn load(&self) -> Option<Snapshot> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable state file"
                );
                None
            }
        }
    }

    fn try_load(&self) -> Result<Option<Snapshot>, StateError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot = serde_json::from_slice(&data)
            .map_err(|e| StateError::Deserialization(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// Overwrite the stored snapshot
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        let data = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StateError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, data)?;

        tracing::debug!(path = %self.path.display(), date = %snapshot.date, "State saved");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    fn snapshot() -> Snapshot {
        Snapshot {
            date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
            value: 3.45,
            last_run: Utc.with_ymd_and_hms(2024, 1, 10, 7, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json"));

        store.save(&snapshot()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.date, snapshot().date);
        assert_eq!(loaded.value, 3.45);
        assert_eq!(loaded.last_run, snapshot().last_run);
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(temp_dir.path().join("nested/state.json"));

        store.save(&snapshot()).unwrap();
        let mut next = snapshot();
        next.value = 3.60;
        store.save(&next).unwrap();

        assert_eq!(store.load().unwrap().value, 3.60);
    }

    #[test]
    fn test_missing_file_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(temp_dir.path().join("missing.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_file_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(StateStore::new(&path).load().is_none());

        std::fs::write(&path, br#"{"fecha": "2024-01-09"}"#).unwrap();
        assert!(StateStore::new(&path).load().is_none());
    }
}
