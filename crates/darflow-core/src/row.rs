//! Flat, editable projection of an [`ExtractionResult`]: one row per
//! header × finding pair.

use serde::{Deserialize, Serialize};

use crate::report::{AuditFinding, ExtractionResult, ReportHeader};

/// Heading used for the single row of a report that has a header but no
/// findings yet. Such a row is exempt from the finding-level mandatory checks.
pub const HEADER_ONLY_HEADING: &str = "N/A - Header Info Only (Add Paras Manually)";

/// One reviewer-editable row destined for the shared sheet.
///
/// Category is kept as free text: reviewers type into it, and the validator
/// is what decides whether the value is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlattenedRow {
    #[serde(default)]
    pub audit_group_number: Option<u32>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub trade_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub total_amount_detected_overall_rs: Option<f64>,
    #[serde(default)]
    pub total_amount_recovered_overall_rs: Option<f64>,
    #[serde(default)]
    pub audit_para_number: Option<u32>,
    #[serde(default)]
    pub audit_para_heading: Option<String>,
    #[serde(default)]
    pub revenue_involved_lakhs_rs: Option<f64>,
    #[serde(default)]
    pub revenue_recovered_lakhs_rs: Option<f64>,
}

impl FlattenedRow {
    fn from_parts(header: &ReportHeader, finding: Option<&AuditFinding>) -> Self {
        let mut row = Self {
            audit_group_number: header.audit_group_number,
            gstin: header.gstin.clone(),
            trade_name: header.trade_name.clone(),
            category: header.category.map(|c| c.as_str().to_string()),
            total_amount_detected_overall_rs: header.total_amount_detected_overall_rs,
            total_amount_recovered_overall_rs: header.total_amount_recovered_overall_rs,
            ..Self::default()
        };
        match finding {
            Some(f) => {
                row.audit_para_number = f.audit_para_number;
                row.audit_para_heading = f.audit_para_heading.clone();
                row.revenue_involved_lakhs_rs = f.revenue_involved_lakhs_rs;
                row.revenue_recovered_lakhs_rs = f.revenue_recovered_lakhs_rs;
            }
            None => row.audit_para_heading = Some(HEADER_ONLY_HEADING.to_string()),
        }
        row
    }

    /// Header captured, findings pending manual entry.
    pub fn is_header_only(&self) -> bool {
        self.audit_para_number.is_none()
            && self.audit_para_heading.as_deref() == Some(HEADER_ONLY_HEADING)
    }

    /// Para number for messages, `"N/A"` when absent.
    pub fn para_label(&self) -> String {
        self.audit_para_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Flatten an extraction into rows.
///
/// A report with a header and no findings yields exactly one header-only
/// row. Findings without a header are kept with blank header fields so the
/// reviewer can fill them in. Nothing at all yields no rows.
pub fn flatten(result: &ExtractionResult) -> Vec<FlattenedRow> {
    let empty = ReportHeader::default();
    match (&result.header, result.audit_paras.is_empty()) {
        (None, true) => Vec::new(),
        (Some(header), true) => vec![FlattenedRow::from_parts(header, None)],
        (header, false) => {
            let header = header.as_ref().unwrap_or(&empty);
            result
                .audit_paras
                .iter()
                .map(|f| FlattenedRow::from_parts(header, Some(f)))
                .collect()
        }
    }
}

/// Set every row's audit group number to `group`. Returns how many rows
/// carried a different, non-empty group before.
pub fn assign_group(rows: &mut [FlattenedRow], group: u32) -> usize {
    let mut replaced = 0;
    for row in rows.iter_mut() {
        if row.audit_group_number.is_some_and(|g| g != group) {
            replaced += 1;
        }
        row.audit_group_number = Some(group);
    }
    replaced
}
