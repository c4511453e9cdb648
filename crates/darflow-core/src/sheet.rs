//! The shared tracker sheet: fixed 12-column layout and cell encoding.
//!
//! Column order and header text are a compatibility contract with data
//! already in the coordinating office's spreadsheets. Do not reorder.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::lenient;
use crate::row::FlattenedRow;

/// Header row, in column order.
pub const SHEET_COLUMNS: [&str; 12] = [
    "Audit Group Number",
    "GSTIN",
    "Trade Name",
    "Category",
    "Total Amount Detected (Overall Rs)",
    "Total Amount Recovered (Overall Rs)",
    "Audit Para Number",
    "Audit Para Heading",
    "Revenue Involved (Lakhs Rs)",
    "Revenue Recovered (Lakhs Rs)",
    "DAR PDF URL",
    "Record Created Date",
];

/// Format of the `Record Created Date` column.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("column '{column}': {message}")]
    Cell {
        column: &'static str,
        message: String,
    },
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),
}

/// A validated row plus the submission metadata stored with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(flatten)]
    pub row: FlattenedRow,
    pub dar_pdf_url: String,
    pub created_at: String,
}

impl SheetRow {
    /// Attach the uploaded DAR's URL and a creation timestamp.
    pub fn stamp<Tz: TimeZone>(row: FlattenedRow, dar_pdf_url: &str, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            row,
            dar_pdf_url: dar_pdf_url.to_string(),
            created_at: now.format(CREATED_AT_FORMAT).to_string(),
        }
    }

    /// Encode as sheet cells, in [`SHEET_COLUMNS`] order. Absent values are blank.
    pub fn to_cells(&self) -> Vec<String> {
        let r = &self.row;
        vec![
            int_cell(r.audit_group_number),
            text_cell(&r.gstin),
            text_cell(&r.trade_name),
            text_cell(&r.category),
            amount_cell(r.total_amount_detected_overall_rs),
            amount_cell(r.total_amount_recovered_overall_rs),
            int_cell(r.audit_para_number),
            text_cell(&r.audit_para_heading),
            amount_cell(r.revenue_involved_lakhs_rs),
            amount_cell(r.revenue_recovered_lakhs_rs),
            self.dar_pdf_url.clone(),
            self.created_at.clone(),
        ]
    }

    /// Decode from sheet cells. Trailing cells may be missing: the Sheets
    /// API drops empty cells at the end of a row.
    pub fn from_cells(cells: &[String]) -> Result<Self, SheetError> {
        let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");
        let text = |i: usize| {
            let s = cell(i);
            (!s.is_empty()).then(|| s.to_string())
        };
        let int = |i: usize| {
            lenient::parse_int(cell(i)).map_err(|message| SheetError::Cell {
                column: SHEET_COLUMNS[i],
                message,
            })
        };
        let amount = |i: usize| {
            lenient::parse_amount(cell(i)).map_err(|message| SheetError::Cell {
                column: SHEET_COLUMNS[i],
                message,
            })
        };

        Ok(Self {
            row: FlattenedRow {
                audit_group_number: int(0)?,
                gstin: text(1),
                trade_name: text(2),
                category: text(3),
                total_amount_detected_overall_rs: amount(4)?,
                total_amount_recovered_overall_rs: amount(5)?,
                audit_para_number: int(6)?,
                audit_para_heading: text(7),
                revenue_involved_lakhs_rs: amount(8)?,
                revenue_recovered_lakhs_rs: amount(9)?,
            },
            dar_pdf_url: cell(10).to_string(),
            created_at: cell(11).to_string(),
        })
    }
}

fn int_cell(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn text_cell(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

fn amount_cell(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

/// How a sheet's first row relates to [`SHEET_COLUMNS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheck {
    /// Sheet has no rows: write the header before appending.
    Empty,
    /// First row is exactly our header.
    Matches,
    /// First row is something else: append without touching it.
    Unheadered,
}

/// Compare a sheet's first row against the expected header text.
pub fn check_header(first_row: Option<&[String]>) -> HeaderCheck {
    match first_row {
        None => HeaderCheck::Empty,
        Some(cells) if cells.iter().all(|c| c.trim().is_empty()) => HeaderCheck::Empty,
        Some(cells) => {
            let matches = cells.len() == SHEET_COLUMNS.len()
                && cells.iter().zip(SHEET_COLUMNS).all(|(c, h)| c.trim() == h);
            if matches {
                HeaderCheck::Matches
            } else {
                HeaderCheck::Unheadered
            }
        }
    }
}

/// The header row as owned cells.
pub fn header_cells() -> Vec<String> {
    SHEET_COLUMNS.iter().map(|s| s.to_string()).collect()
}
