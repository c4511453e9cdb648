//! Per-audit-group totals over a period's sheet rows.

use std::collections::{BTreeMap, HashSet};

use crate::report::rupees_to_lakhs;
use crate::sheet::SheetRow;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSummary {
    pub audit_group_number: u32,
    /// Distinct DARs submitted.
    pub dars: usize,
    /// Finding rows (header-only rows excluded).
    pub paras: usize,
    /// Overall detection across distinct DARs, in lakhs.
    pub detected_lakhs: f64,
    /// Overall recovery across distinct DARs, in lakhs.
    pub recovered_lakhs: f64,
    /// Sum of per-para revenue involved, in lakhs.
    pub para_involved_lakhs: f64,
}

/// Aggregate rows by audit group, ordered by group number.
///
/// Overall amounts repeat on every row of a DAR, so they are counted once
/// per distinct DAR URL. Rows without a group number are skipped.
pub fn summarize(rows: &[SheetRow]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<u32, GroupSummary> = BTreeMap::new();
    let mut seen: HashSet<(u32, &str)> = HashSet::new();

    for sheet_row in rows {
        let row = &sheet_row.row;
        let Some(group) = row.audit_group_number else {
            continue;
        };
        let entry = groups.entry(group).or_insert_with(|| GroupSummary {
            audit_group_number: group,
            ..Default::default()
        });

        if seen.insert((group, sheet_row.dar_pdf_url.as_str())) {
            entry.dars += 1;
            entry.detected_lakhs +=
                rupees_to_lakhs(row.total_amount_detected_overall_rs.unwrap_or(0.0));
            entry.recovered_lakhs +=
                rupees_to_lakhs(row.total_amount_recovered_overall_rs.unwrap_or(0.0));
        }
        if !row.is_header_only() {
            entry.paras += 1;
            entry.para_involved_lakhs += row.revenue_involved_lakhs_rs.unwrap_or(0.0);
        }
    }

    groups.into_values().collect()
}
