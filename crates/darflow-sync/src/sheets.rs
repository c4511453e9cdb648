//! Google Sheets v4 as a [`SheetStore`].
//!
//! The `sheet` argument of every [`SheetStore`] method is a spreadsheet id;
//! rows live on its first tab, columns `A:L`.

use async_trait::async_trait;
use darflow_core::SheetRow;
use darflow_core::sheet::{self, HeaderCheck};
use darflow_store::{RowPredicate, SheetStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::http::{GoogleAuth, SyncError, send_json, trim_base};

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

const HEADER_RANGE: &str = "A1:L1";
const DATA_RANGE: &str = "A:L";

/// Free-text columns: GSTIN, trade name, category, para heading, DAR URL.
const TEXT_COLUMNS: [usize; 5] = [1, 2, 3, 7, 10];

#[derive(Deserialize, Default)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct ValuesBody<'a> {
    values: &'a [Vec<String>],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: usize,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<TabMeta>,
}

#[derive(Deserialize)]
struct TabMeta {
    properties: TabProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabProperties {
    sheet_id: i64,
}

pub struct SheetsClient {
    auth: GoogleAuth,
    base_url: String,
}

impl SheetsClient {
    pub fn new(auth: GoogleAuth, base_url: &str) -> Self {
        Self {
            auth,
            base_url: trim_base(base_url),
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{spreadsheet_id}/values/{range}",
            self.base_url
        )
    }

    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        let url = self.values_url(spreadsheet_id, range);
        let vr: ValueRange = send_json(self.auth.get(&url)).await?;
        Ok(vr.values)
    }

    async fn first_tab_id(&self, spreadsheet_id: &str) -> Result<i64, SyncError> {
        let url = format!(
            "{}/v4/spreadsheets/{spreadsheet_id}?fields=sheets.properties",
            self.base_url
        );
        let meta: SpreadsheetMeta = send_json(self.auth.get(&url)).await?;
        meta.sheets
            .first()
            .map(|t| t.properties.sheet_id)
            .ok_or_else(|| SyncError::Unexpected(format!("spreadsheet {spreadsheet_id} has no tabs")))
    }
}

/// Data rows of a raw value grid, with their 0-based grid index.
///
/// A first row matching the tracker header is skipped. Blank rows are
/// skipped. Rows that do not decode (an unheadered sheet's foreign first
/// row, hand-typed text in a number column) are logged and skipped.
fn decode_grid(grid: &[Vec<String>]) -> Vec<(usize, SheetRow)> {
    let skip = match sheet::check_header(grid.first().map(Vec::as_slice)) {
        HeaderCheck::Matches => 1,
        HeaderCheck::Empty | HeaderCheck::Unheadered => 0,
    };
    grid.iter()
        .enumerate()
        .skip(skip)
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .filter_map(|(i, cells)| match SheetRow::from_cells(cells) {
            Ok(row) => Some((i, row)),
            Err(e) => {
                warn!(row = i + 1, error = %e, "skipping undecodable sheet row");
                None
            }
        })
        .collect()
}

/// Cells for a `USER_ENTERED` append. Free text that Sheets would parse as
/// a formula gets a leading `'`, which Sheets stores as a text marker.
fn entered_cells(row: &SheetRow) -> Vec<String> {
    let mut cells = row.to_cells();
    for i in TEXT_COLUMNS {
        if let Some(cell) = cells.get_mut(i)
            && cell.starts_with(['=', '+', '-', '@'])
        {
            cell.insert(0, '\'');
        }
    }
    cells
}

/// `deleteDimension` requests for the given grid rows, bottom-up so earlier
/// deletions do not shift later ones.
fn delete_requests(tab_id: i64, mut indices: Vec<usize>) -> serde_json::Value {
    indices.sort_unstable_by(|a, b| b.cmp(a));
    let requests: Vec<_> = indices
        .into_iter()
        .map(|i| {
            json!({
                "deleteDimension": {
                    "range": {
                        "sheetId": tab_id,
                        "dimension": "ROWS",
                        "startIndex": i,
                        "endIndex": i + 1
                    }
                }
            })
        })
        .collect();
    json!({ "requests": requests })
}

#[async_trait]
impl SheetStore for SheetsClient {
    async fn header(&self, sheet: &str) -> Result<Option<Vec<String>>, StoreError> {
        let values = self.get_values(sheet, HEADER_RANGE).await?;
        Ok(values.into_iter().next())
    }

    async fn write_header(&self, sheet: &str, header: &[String]) -> Result<(), StoreError> {
        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(sheet, HEADER_RANGE)
        );
        let rows = [header.to_vec()];
        let _: serde_json::Value =
            send_json(self.auth.put(&url).json(&ValuesBody { values: &rows })).await?;
        Ok(())
    }

    async fn append_rows(&self, sheet: &str, rows: &[SheetRow]) -> Result<usize, StoreError> {
        let url = format!(
            "{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.values_url(sheet, DATA_RANGE)
        );
        let cells: Vec<Vec<String>> = rows.iter().map(entered_cells).collect();
        let resp: AppendResponse =
            send_json(self.auth.post(&url).json(&ValuesBody { values: &cells })).await?;
        let appended = resp.updates.map_or(cells.len(), |u| u.updated_rows);
        info!(spreadsheet = sheet, rows = appended, "appended to Google Sheet");
        Ok(appended)
    }

    async fn read_rows(&self, sheet: &str) -> Result<Vec<SheetRow>, StoreError> {
        let grid = self.get_values(sheet, DATA_RANGE).await?;
        Ok(decode_grid(&grid).into_iter().map(|(_, r)| r).collect())
    }

    async fn delete_rows(
        &self,
        sheet: &str,
        predicate: RowPredicate<'_>,
    ) -> Result<usize, StoreError> {
        let grid = self.get_values(sheet, DATA_RANGE).await?;
        let doomed: Vec<usize> = decode_grid(&grid)
            .into_iter()
            .filter(|(_, r)| predicate(r))
            .map(|(i, _)| i)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        let count = doomed.len();
        let tab_id = self.first_tab_id(sheet).await?;
        let url = format!("{}/v4/spreadsheets/{sheet}:batchUpdate", self.base_url);
        let _: serde_json::Value =
            send_json(self.auth.post(&url).json(&delete_requests(tab_id, doomed))).await?;
        info!(spreadsheet = sheet, rows = count, "deleted rows from Google Sheet");
        Ok(count)
    }
}
