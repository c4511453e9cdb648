use std::path::PathBuf;

use darflow_core::SheetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no results for query")]
    NoResults,

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("sheet data: {0}")]
    Sheet(#[from] SheetError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a remote sheet backend.
    #[error("sheet backend: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    Other(String),
}
