//! DuckDB-backed local mirror of tracker sheets.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use arrow::array::{Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use darflow_core::{SheetRow, dar};
use duckdb::{Connection, params};
use tracing::{debug, info};

use crate::StoreError;
use crate::sheet::{RowPredicate, SheetStore};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS sheet_headers (
    sheet VARCHAR PRIMARY KEY,
    header_json VARCHAR NOT NULL
);
CREATE SEQUENCE IF NOT EXISTS sheet_row_seq;
CREATE TABLE IF NOT EXISTS sheet_rows (
    sheet VARCHAR NOT NULL,
    seq BIGINT NOT NULL DEFAULT nextval('sheet_row_seq'),
    audit_group_number UINTEGER,
    gstin VARCHAR,
    trade_name VARCHAR,
    category VARCHAR,
    total_amount_detected_overall_rs DOUBLE,
    total_amount_recovered_overall_rs DOUBLE,
    audit_para_number UINTEGER,
    audit_para_heading VARCHAR,
    revenue_involved_lakhs_rs DOUBLE,
    revenue_recovered_lakhs_rs DOUBLE,
    dar_pdf_url VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL
);
";

/// Tracker sheets mirrored into DuckDB, one logical sheet per `sheet` key.
///
/// Supports both in-memory and persistent (file-backed) modes. Rows keep
/// append order via `seq` and come back through the Arrow projection in
/// [`dar`].
pub struct DuckSheet {
    conn: Mutex<Connection>,
}

impl DuckSheet {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened sheet mirror");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of data rows in `sheet`.
    pub fn row_count(&self, sheet: &str) -> Result<usize, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT count(*)::BIGINT FROM sheet_rows WHERE sheet = ?")?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([sheet])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    /// Rows of `sheet` as Arrow batches, with the `seq` column first.
    pub fn query_sheet(&self, sheet: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let sql = format!(
            "SELECT seq, {} FROM sheet_rows WHERE sheet = ? ORDER BY seq",
            dar::COLUMNS.join(", ")
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([sheet])?.collect();
        Ok(batches)
    }

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    fn rows_with_seq(&self, sheet: &str) -> Result<Vec<(i64, SheetRow)>, StoreError> {
        let mut out = Vec::new();
        for batch in self.query_sheet(sheet)? {
            let seq = cast(batch.column(0), &DataType::Int64)?;
            let seq = seq
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| StoreError::Other("seq column not i64".into()))?;
            let rows = dar::rows_from_batch(&batch)?;
            out.extend(rows.into_iter().enumerate().map(|(i, r)| (seq.value(i), r)));
        }
        Ok(out)
    }
}

#[async_trait]
impl SheetStore for DuckSheet {
    async fn header(&self, sheet: &str) -> Result<Option<Vec<String>>, StoreError> {
        let stored: Option<String> = {
            let conn = self.conn();
            let mut stmt = conn.prepare("SELECT header_json FROM sheet_headers WHERE sheet = ?")?;
            let mut rows = stmt.query([sheet])?;
            let json = match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            };
            json
        };
        if let Some(json) = stored {
            return Ok(Some(serde_json::from_str(&json)?));
        }
        Ok(self
            .rows_with_seq(sheet)?
            .into_iter()
            .next()
            .map(|(_, r)| r.to_cells()))
    }

    async fn write_header(&self, sheet: &str, header: &[String]) -> Result<(), StoreError> {
        if self.header(sheet).await?.is_some() {
            return Err(StoreError::Other(format!(
                "sheet '{sheet}' is not empty; refusing to write a header"
            )));
        }
        let json = serde_json::to_string(header)?;
        self.conn().execute(
            "INSERT INTO sheet_headers (sheet, header_json) VALUES (?, ?)",
            params![sheet, json],
        )?;
        Ok(())
    }

    async fn append_rows(&self, sheet: &str, rows: &[SheetRow]) -> Result<usize, StoreError> {
        let conn = self.conn();
        conn.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, StoreError> {
            let mut stmt = conn.prepare(
                "INSERT INTO sheet_rows (sheet, audit_group_number, gstin, trade_name, category,
                    total_amount_detected_overall_rs, total_amount_recovered_overall_rs,
                    audit_para_number, audit_para_heading, revenue_involved_lakhs_rs,
                    revenue_recovered_lakhs_rs, dar_pdf_url, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for r in rows {
                let f = &r.row;
                stmt.execute(params![
                    sheet,
                    f.audit_group_number,
                    f.gstin,
                    f.trade_name,
                    f.category,
                    f.total_amount_detected_overall_rs,
                    f.total_amount_recovered_overall_rs,
                    f.audit_para_number,
                    f.audit_para_heading,
                    f.revenue_involved_lakhs_rs,
                    f.revenue_recovered_lakhs_rs,
                    r.dar_pdf_url,
                    r.created_at,
                ])?;
            }
            Ok(rows.len())
        })();
        match result {
            Ok(n) => {
                conn.execute_batch("COMMIT")?;
                debug!(sheet, rows = n, "appended to mirror");
                Ok(n)
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK")?;
                Err(e)
            }
        }
    }

    async fn read_rows(&self, sheet: &str) -> Result<Vec<SheetRow>, StoreError> {
        Ok(self
            .rows_with_seq(sheet)?
            .into_iter()
            .map(|(_, r)| r)
            .collect())
    }

    async fn delete_rows(
        &self,
        sheet: &str,
        predicate: RowPredicate<'_>,
    ) -> Result<usize, StoreError> {
        let doomed: Vec<i64> = self
            .rows_with_seq(sheet)?
            .into_iter()
            .filter(|(_, r)| predicate(r))
            .map(|(seq, _)| seq)
            .collect();
        let conn = self.conn();
        let mut stmt = conn.prepare("DELETE FROM sheet_rows WHERE sheet = ? AND seq = ?")?;
        for seq in &doomed {
            stmt.execute(params![sheet, seq])?;
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darflow_core::FlattenedRow;

    fn row(url: &str, group: u32, para: Option<u32>) -> SheetRow {
        SheetRow {
            row: FlattenedRow {
                audit_group_number: Some(group),
                gstin: Some("29ABCDE1234F1Z5".into()),
                trade_name: Some("Acme Corp".into()),
                category: Some("Large".into()),
                total_amount_detected_overall_rs: Some(250_000.0),
                total_amount_recovered_overall_rs: None,
                audit_para_number: para,
                audit_para_heading: para.map(|p| format!("Para {p}")),
                revenue_involved_lakhs_rs: Some(2.5),
                revenue_recovered_lakhs_rs: None,
            },
            dar_pdf_url: url.into(),
            created_at: "2025-04-10 09:30:00".into(),
        }
    }

    #[test]
    fn open_in_memory() {
        let store = DuckSheet::open().unwrap();
        let batches = store.query_arrow("SELECT 1 AS x").unwrap();
        assert_eq!(batches[0].num_rows(), 1);
        assert_eq!(store.row_count("s").unwrap(), 0);
    }

    #[tokio::test]
    async fn rows_round_trip_through_arrow() {
        let store = DuckSheet::open().unwrap();
        let rows = vec![row("u1", 3, Some(1)), row("u1", 3, Some(2)), row("u2", 4, None)];
        assert_eq!(store.append_rows("s", &rows).await.unwrap(), 3);
        assert_eq!(store.row_count("s").unwrap(), 3);
        assert_eq!(store.read_rows("s").await.unwrap(), rows);
    }

    #[tokio::test]
    async fn header_stored_separately_from_rows() {
        let store = DuckSheet::open().unwrap();
        assert!(store.header("s").await.unwrap().is_none());
        let header = darflow_core::sheet::header_cells();
        store.write_header("s", &header).await.unwrap();
        assert_eq!(store.header("s").await.unwrap(), Some(header.clone()));
        assert!(store.write_header("s", &header).await.is_err());
        assert_eq!(store.row_count("s").unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_matching_rows() {
        let store = DuckSheet::open().unwrap();
        store
            .append_rows("s", &[row("u1", 3, Some(1)), row("u2", 3, Some(1)), row("u1", 3, None)])
            .await
            .unwrap();
        store.append_rows("other", &[row("u1", 3, Some(1))]).await.unwrap();

        let removed = store
            .delete_rows("s", &|r: &SheetRow| r.dar_pdf_url == "u1")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        let left = store.read_rows("s").await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].dar_pdf_url, "u2");
        assert_eq!(store.row_count("other").unwrap(), 1);
    }

    #[tokio::test]
    async fn persistent_reopen_keeps_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("mirror").join("sheets.duckdb");

        let store = DuckSheet::open_persistent(&db_path).unwrap();
        assert!(db_path.exists());
        store.append_rows("s", &[row("u1", 1, Some(1))]).await.unwrap();
        drop(store);

        let store = DuckSheet::open_persistent(&db_path).unwrap();
        assert_eq!(store.read_rows("s").await.unwrap().len(), 1);
    }
}
