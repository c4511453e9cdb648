//! Settings shared by the CLI and library crates.
//!
//! Loaded from an optional JSON file; every field has a default so an empty
//! `{}` (or no file at all) is a valid configuration. Secrets (API key,
//! access token) are not stored here: the CLI takes them from the
//! environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Generative model name.
    pub model: String,
    /// Base URL of the generative language API.
    pub gemini_base_url: String,
    /// Retries after the first extraction attempt.
    pub max_retries: u32,
    /// Backoff unit after a malformed or schema-violating response.
    pub parse_backoff_secs: u64,
    /// Backoff unit after an empty response or API error.
    pub empty_backoff_secs: u64,
    /// Local working directory: period index, sheet mirror.
    pub data_dir: PathBuf,
    /// Username → account map for login. Defaults to
    /// `<data_dir>/credentials.json`.
    pub credentials_path: Option<PathBuf>,
    /// Drive folder new period folders are created under.
    pub drive_parent_folder_id: Option<String>,
    pub sheets_base_url: String,
    pub drive_base_url: String,
    pub drive_upload_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash-latest".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_retries: 2,
            parse_backoff_secs: 2,
            empty_backoff_secs: 1,
            data_dir: PathBuf::from("darflow-data"),
            credentials_path: None,
            drive_parent_folder_id: None,
            sheets_base_url: "https://sheets.googleapis.com".to_string(),
            drive_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            drive_upload_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// JSON blob holding the [`PeriodIndex`](crate::PeriodIndex).
    pub fn period_index_path(&self) -> PathBuf {
        self.data_dir.join("mcm_periods.json")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("credentials.json"))
    }

    /// DuckDB file mirroring period sheets locally.
    pub fn sheet_db_path(&self) -> PathBuf {
        self.data_dir.join("sheets.duckdb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_gives_defaults() {
        let s = Settings::load(None).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.max_retries, 2);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "max_retries": 4, "data_dir": "/tmp/dar" }}"#).unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.max_retries, 4);
        assert_eq!(s.period_index_path(), PathBuf::from("/tmp/dar/mcm_periods.json"));
        assert_eq!(s.model, Settings::default().model);
    }

    #[test]
    fn credentials_follow_data_dir_unless_set() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "data_dir": "/srv/dar" }}"#).unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.credentials_path(), PathBuf::from("/srv/dar/credentials.json"));

        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{ "data_dir": "/srv/dar", "credentials_path": "/etc/darflow/users.json" }}"#
        )
        .unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.credentials_path(), PathBuf::from("/etc/darflow/users.json"));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/darflow.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{ not json").unwrap();
        let err = Settings::load(Some(f.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
