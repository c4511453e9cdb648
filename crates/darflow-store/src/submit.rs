//! Appending validated rows to a tracker sheet.

use chrono::{DateTime, TimeZone};
use darflow_core::sheet::{self, HeaderCheck};
use darflow_core::{FlattenedRow, SheetRow};
use thiserror::Error;
use tracing::{info, warn};

use crate::sheet::{RowPredicate, SheetStore};
use crate::StoreError;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("nothing to submit")]
    NoRows,
    #[error("DAR PDF URL is required")]
    MissingUrl,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    pub appended: usize,
    /// What the sheet's first row looked like before this submission.
    pub header: HeaderCheck,
}

/// Stamp `rows` with the DAR URL and `now`, then append them to `sheet`.
///
/// An empty sheet gets the header row first. A sheet whose first row is our
/// header is appended to. Anything else is treated as an unheadered sheet:
/// rows are appended and the existing first row is left alone.
pub async fn submit_rows<S, Tz>(
    store: &S,
    sheet: &str,
    dar_pdf_url: &str,
    rows: Vec<FlattenedRow>,
    now: &DateTime<Tz>,
) -> Result<SubmitReport, SubmitError>
where
    S: SheetStore + ?Sized,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if rows.is_empty() {
        return Err(SubmitError::NoRows);
    }
    if dar_pdf_url.trim().is_empty() {
        return Err(SubmitError::MissingUrl);
    }

    let first = store.header(sheet).await?;
    let header = sheet::check_header(first.as_deref());
    match header {
        HeaderCheck::Empty => {
            store.write_header(sheet, &sheet::header_cells()).await?;
            info!(sheet, "wrote header row");
        }
        HeaderCheck::Matches => {}
        HeaderCheck::Unheadered => {
            warn!(sheet, found = ?first, "header differs from tracker layout; appending as unheadered");
        }
    }

    let stamped: Vec<SheetRow> = rows
        .into_iter()
        .map(|r| SheetRow::stamp(r, dar_pdf_url, now))
        .collect();
    let appended = store.append_rows(sheet, &stamped).await?;
    info!(sheet, rows = appended, url = dar_pdf_url, "submitted rows");
    Ok(SubmitReport { appended, header })
}

/// Remove every row belonging to one DAR.
pub async fn delete_dar<S: SheetStore + ?Sized>(
    store: &S,
    sheet: &str,
    dar_pdf_url: &str,
) -> Result<usize, StoreError> {
    let removed = store
        .delete_rows(sheet, &|r: &SheetRow| r.dar_pdf_url == dar_pdf_url)
        .await?;
    info!(sheet, url = dar_pdf_url, rows = removed, "deleted DAR rows");
    Ok(removed)
}

/// Remove every row of one audit group, optionally limited to one DAR.
pub async fn delete_group_rows<S: SheetStore + ?Sized>(
    store: &S,
    sheet: &str,
    group: u32,
    dar_pdf_url: Option<&str>,
) -> Result<usize, StoreError> {
    let predicate: RowPredicate<'_> = &|r: &SheetRow| {
        r.row.audit_group_number == Some(group)
            && dar_pdf_url.is_none_or(|url| r.dar_pdf_url == url)
    };
    let removed = store.delete_rows(sheet, predicate).await?;
    info!(sheet, group, rows = removed, "deleted group rows");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::MemorySheet;
    use chrono::{TimeZone, Utc};
    use darflow_core::{HEADER_ONLY_HEADING, SHEET_COLUMNS};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 9, 30, 0).unwrap()
    }

    fn rows(group: u32) -> Vec<FlattenedRow> {
        vec![
            FlattenedRow {
                audit_group_number: Some(group),
                trade_name: Some("Acme Corp".into()),
                audit_para_number: Some(1),
                ..Default::default()
            },
            FlattenedRow {
                audit_group_number: Some(group),
                audit_para_heading: Some(HEADER_ONLY_HEADING.into()),
                ..Default::default()
            },
        ]
    }

    #[tokio::test]
    async fn empty_sheet_gets_header_first() {
        let store = MemorySheet::new();
        let report = submit_rows(&store, "s", "https://d/1", rows(3), &now())
            .await
            .unwrap();
        assert_eq!(report.header, HeaderCheck::Empty);
        assert_eq!(report.appended, 2);

        let header = store.header("s").await.unwrap().unwrap();
        assert_eq!(header, SHEET_COLUMNS.map(String::from).to_vec());

        let stored = store.read_rows("s").await.unwrap();
        assert_eq!(stored[0].dar_pdf_url, "https://d/1");
        assert_eq!(stored[0].created_at, "2025-04-10 09:30:00");
    }

    #[tokio::test]
    async fn matching_header_is_appended_to() {
        let store = MemorySheet::new();
        submit_rows(&store, "s", "u1", rows(3), &now()).await.unwrap();
        let report = submit_rows(&store, "s", "u2", rows(4), &now())
            .await
            .unwrap();
        assert_eq!(report.header, HeaderCheck::Matches);
        assert_eq!(store.read_rows("s").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn foreign_header_is_left_alone() {
        let foreign = vec!["Group".to_string(), "GSTIN".to_string()];
        let store = MemorySheet::new().with_header("s", foreign.clone());
        let report = submit_rows(&store, "s", "u", rows(3), &now())
            .await
            .unwrap();
        assert_eq!(report.header, HeaderCheck::Unheadered);
        assert_eq!(store.header("s").await.unwrap(), Some(foreign));
        assert_eq!(store.read_rows("s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_submission_and_missing_url_are_rejected() {
        let store = MemorySheet::new();
        assert!(matches!(
            submit_rows(&store, "s", "u", vec![], &now()).await,
            Err(SubmitError::NoRows)
        ));
        assert!(matches!(
            submit_rows(&store, "s", " ", rows(1), &now()).await,
            Err(SubmitError::MissingUrl)
        ));
        assert!(store.header("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deletes_by_dar_and_group() {
        let store = MemorySheet::new();
        submit_rows(&store, "s", "u1", rows(3), &now()).await.unwrap();
        submit_rows(&store, "s", "u2", rows(3), &now()).await.unwrap();
        submit_rows(&store, "s", "u3", rows(5), &now()).await.unwrap();

        assert_eq!(delete_dar(&store, "s", "u1").await.unwrap(), 2);
        assert_eq!(
            delete_group_rows(&store, "s", 5, Some("u2")).await.unwrap(),
            0
        );
        assert_eq!(delete_group_rows(&store, "s", 3, None).await.unwrap(), 2);
        let left = store.read_rows("s").await.unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|r| r.dar_pdf_url == "u3"));
    }
}
