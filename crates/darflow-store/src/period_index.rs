//! File-backed [`PeriodIndex`].

use std::io::Write;
use std::path::{Path, PathBuf};

use darflow_core::PeriodIndex;
use tracing::{debug, info};

use crate::StoreError;

/// The period index as a JSON file. Saves replace the file atomically.
#[derive(Debug, Clone)]
pub struct PeriodIndexStore {
    path: PathBuf,
}

impl PeriodIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the index. A missing file is an empty index.
    pub fn load(&self) -> Result<PeriodIndex, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no period index yet");
                return Ok(PeriodIndex::default());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        if text.trim().is_empty() {
            return Ok(PeriodIndex::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the index through a temp file in the same directory, then rename
    /// it over the old one.
    pub fn save(&self, index: &PeriodIndex) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_err(e))?;

        let json = serde_json::to_string_pretty(index)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        info!(path = %self.path.display(), periods = index.len(), "period index saved");
        Ok(())
    }

    /// Load, apply `f`, save. The index is only written if `f` succeeds.
    pub fn update<T, E>(&self, f: impl FnOnce(&mut PeriodIndex) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut index = self.load()?;
        let out = f(&mut index)?;
        self.save(&index)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darflow_core::{McmPeriod, PeriodError, PeriodKey, PeriodResources};

    #[derive(Debug)]
    enum TestError {
        Store(StoreError),
        Period(PeriodError),
    }

    impl From<StoreError> for TestError {
        fn from(e: StoreError) -> Self {
            Self::Store(e)
        }
    }

    impl From<PeriodError> for TestError {
        fn from(e: PeriodError) -> Self {
            Self::Period(e)
        }
    }

    fn period(year: i32, month: u32) -> McmPeriod {
        McmPeriod::new(
            PeriodKey::new(year, month).unwrap(),
            PeriodResources {
                folder_id: "f".into(),
                folder_url: "https://drive.example/f".into(),
                spreadsheet_id: "s".into(),
                spreadsheet_url: "https://sheets.example/s".into(),
            },
        )
    }

    #[test]
    fn missing_file_is_empty_index() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = PeriodIndexStore::new(tmp.path().join("mcm_periods.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("mcm_periods.json");
        let store = PeriodIndexStore::new(&path);

        let mut index = PeriodIndex::default();
        index.insert(period(2025, 4)).unwrap();
        store.save(&index).unwrap();

        assert_eq!(store.load().unwrap(), index);
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["2025-04"]["month_name"], "April");
        assert_eq!(raw["2025-04"]["active"], true);
    }

    #[test]
    fn failed_update_leaves_file_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = PeriodIndexStore::new(tmp.path().join("mcm_periods.json"));
        store
            .update(|idx| idx.insert(period(2025, 4)).map_err(TestError::from))
            .unwrap();

        let before = std::fs::read_to_string(store.path()).unwrap();
        let err = store
            .update(|idx| idx.insert(period(2025, 4)).map_err(TestError::from))
            .unwrap_err();
        assert!(matches!(err, TestError::Period(PeriodError::Duplicate(_))));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mcm_periods.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = PeriodIndexStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
