//! The [`SheetStore`] seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use darflow_core::SheetRow;

use crate::StoreError;

/// Row filter for [`SheetStore::delete_rows`].
pub type RowPredicate<'a> = &'a (dyn Fn(&SheetRow) -> bool + Send + Sync);

/// A tabular store laid out like the tracker spreadsheet.
///
/// `sheet` identifies one tracker (one per period). Implementations keep rows
/// in append order.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Raw first row, or `None` if the sheet has no rows.
    async fn header(&self, sheet: &str) -> Result<Option<Vec<String>>, StoreError>;

    /// Write the header row into an empty sheet.
    async fn write_header(&self, sheet: &str, header: &[String]) -> Result<(), StoreError>;

    /// Append rows after any existing data. Returns the number appended.
    async fn append_rows(&self, sheet: &str, rows: &[SheetRow]) -> Result<usize, StoreError>;

    /// All data rows, header excluded, in append order.
    async fn read_rows(&self, sheet: &str) -> Result<Vec<SheetRow>, StoreError>;

    /// Remove every data row matching `predicate`. Returns the number removed.
    async fn delete_rows(&self, sheet: &str, predicate: RowPredicate<'_>)
    -> Result<usize, StoreError>;
}

#[derive(Debug, Default, Clone)]
struct Tab {
    header: Option<Vec<String>>,
    rows: Vec<SheetRow>,
}

/// Sheets held in process memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySheet {
    tabs: Mutex<HashMap<String, Tab>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a sheet whose first row is `header`, as an existing
    /// spreadsheet with foreign data would look.
    pub fn with_header(self, sheet: &str, header: Vec<String>) -> Self {
        self.tab(sheet, |t| t.header = Some(header));
        self
    }

    fn tab<T>(&self, sheet: &str, f: impl FnOnce(&mut Tab) -> T) -> T {
        let mut tabs = self.tabs.lock().unwrap_or_else(|e| e.into_inner());
        f(tabs.entry(sheet.to_string()).or_default())
    }
}

#[async_trait]
impl SheetStore for MemorySheet {
    async fn header(&self, sheet: &str) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.tab(sheet, |t| match &t.header {
            Some(h) => Some(h.clone()),
            None => t.rows.first().map(SheetRow::to_cells),
        }))
    }

    async fn write_header(&self, sheet: &str, header: &[String]) -> Result<(), StoreError> {
        self.tab(sheet, |t| {
            if t.header.is_some() || !t.rows.is_empty() {
                return Err(StoreError::Other(format!(
                    "sheet '{sheet}' is not empty; refusing to write a header"
                )));
            }
            t.header = Some(header.to_vec());
            Ok(())
        })
    }

    async fn append_rows(&self, sheet: &str, rows: &[SheetRow]) -> Result<usize, StoreError> {
        Ok(self.tab(sheet, |t| {
            t.rows.extend_from_slice(rows);
            rows.len()
        }))
    }

    async fn read_rows(&self, sheet: &str) -> Result<Vec<SheetRow>, StoreError> {
        Ok(self.tab(sheet, |t| t.rows.clone()))
    }

    async fn delete_rows(
        &self,
        sheet: &str,
        predicate: RowPredicate<'_>,
    ) -> Result<usize, StoreError> {
        Ok(self.tab(sheet, |t| {
            let before = t.rows.len();
            t.rows.retain(|r| !predicate(r));
            before - t.rows.len()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darflow_core::FlattenedRow;

    fn row(url: &str, group: u32) -> SheetRow {
        SheetRow {
            row: FlattenedRow {
                audit_group_number: Some(group),
                ..Default::default()
            },
            dar_pdf_url: url.into(),
            created_at: "2025-04-01 10:00:00".into(),
        }
    }

    #[tokio::test]
    async fn new_sheet_is_empty() {
        let sheet = MemorySheet::new();
        assert!(sheet.header("s").await.unwrap().is_none());
        assert!(sheet.read_rows("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn header_only_written_into_empty_sheet() {
        let sheet = MemorySheet::new();
        let header = vec!["A".to_string()];
        sheet.write_header("s", &header).await.unwrap();
        assert_eq!(sheet.header("s").await.unwrap(), Some(header.clone()));
        assert!(sheet.write_header("s", &header).await.is_err());
    }

    #[tokio::test]
    async fn delete_by_predicate_keeps_order() {
        let sheet = MemorySheet::new();
        sheet
            .append_rows("s", &[row("a", 1), row("b", 2), row("a", 1), row("c", 1)])
            .await
            .unwrap();
        let removed = sheet
            .delete_rows("s", &|r: &SheetRow| r.dar_pdf_url == "a")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        let urls: Vec<_> = sheet
            .read_rows("s")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.dar_pdf_url)
            .collect();
        assert_eq!(urls, ["b", "c"]);
    }

    #[tokio::test]
    async fn sheets_are_independent() {
        let sheet = MemorySheet::new();
        sheet.append_rows("april", &[row("a", 1)]).await.unwrap();
        assert!(sheet.read_rows("may").await.unwrap().is_empty());
    }
}
