//! Storage layer: tracker sheet stores (in-memory, DuckDB mirror), the
//! submission contract, and the period index file.

mod error;
pub use error::StoreError;

pub mod period_index;
pub mod sheet;
pub mod submit;

pub use period_index::PeriodIndexStore;
pub use sheet::{MemorySheet, RowPredicate, SheetStore};
pub use submit::{SubmitError, SubmitReport, delete_dar, delete_group_rows, submit_rows};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckSheet;
