//! Pre-submission checks over reviewer-edited rows.
//!
//! Validation never fails: it returns human-readable messages, and an empty
//! list is the only "ready to submit" signal. Messages are deduplicated and
//! sorted so repeated runs over unchanged rows are byte-identical.

use std::collections::{BTreeMap, BTreeSet};

use crate::report::Category;
use crate::row::FlattenedRow;

/// Valid audit group numbers.
pub const GROUP_RANGE: std::ops::RangeInclusive<u32> = 1..=30;
/// Valid audit para numbers.
pub const PARA_RANGE: std::ops::RangeInclusive<u32> = 1..=50;

struct Mandatory {
    key: &'static str,
    label: &'static str,
    /// Finding-level fields are waived on header-only rows.
    finding: bool,
    present: fn(&FlattenedRow) -> bool,
}

fn has_text(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

const MANDATORY: &[Mandatory] = &[
    Mandatory {
        key: "audit_group_number",
        label: "Audit Group Number",
        finding: false,
        present: |r| r.audit_group_number.is_some(),
    },
    Mandatory {
        key: "gstin",
        label: "GSTIN",
        finding: false,
        present: |r| has_text(&r.gstin),
    },
    Mandatory {
        key: "trade_name",
        label: "Trade Name",
        finding: false,
        present: |r| has_text(&r.trade_name),
    },
    Mandatory {
        key: "category",
        label: "Category",
        finding: false,
        present: |r| has_text(&r.category),
    },
    Mandatory {
        key: "total_amount_detected_overall_rs",
        label: "Total Amount Detected (Overall Rs)",
        finding: false,
        present: |r| r.total_amount_detected_overall_rs.is_some(),
    },
    Mandatory {
        key: "total_amount_recovered_overall_rs",
        label: "Total Amount Recovered (Overall Rs)",
        finding: false,
        present: |r| r.total_amount_recovered_overall_rs.is_some(),
    },
    Mandatory {
        key: "audit_para_number",
        label: "Audit Para Number",
        finding: true,
        present: |r| r.audit_para_number.is_some(),
    },
    Mandatory {
        key: "audit_para_heading",
        label: "Audit Para Heading",
        finding: true,
        present: |r| has_text(&r.audit_para_heading),
    },
    Mandatory {
        key: "revenue_involved_lakhs_rs",
        label: "Revenue Involved (Lakhs Rs)",
        finding: true,
        present: |r| r.revenue_involved_lakhs_rs.is_some(),
    },
    Mandatory {
        key: "revenue_recovered_lakhs_rs",
        label: "Revenue Recovered (Lakhs Rs)",
        finding: true,
        present: |r| r.revenue_recovered_lakhs_rs.is_some(),
    },
];

/// Validate rows before they are appended to the shared sheet.
pub fn validate_rows(rows: &[FlattenedRow]) -> Vec<String> {
    let mut errors = BTreeSet::new();

    for (i, row) in rows.iter().enumerate() {
        check_row(i + 1, row, &mut errors);
    }
    check_category_consistency(rows, &mut errors);

    errors.into_iter().collect()
}

fn check_row(n: usize, row: &FlattenedRow, errors: &mut BTreeSet<String>) {
    let para = row.para_label();
    let header_only = row.is_header_only();

    for field in MANDATORY {
        if field.finding && header_only {
            continue;
        }
        if !(field.present)(row) {
            errors.insert(format!(
                "Row {n} (Para {para}): '{}' ({}) is missing or empty.",
                field.key, field.label
            ));
        }
    }

    // A missing category is already reported above.
    if let Some(cat) = row.category.as_deref().map(str::trim)
        && !cat.is_empty()
        && Category::parse(cat).is_none()
    {
        errors.insert(format!(
            "Row {n} (Para {para}): invalid category '{cat}'; expected one of Large, Medium, Small."
        ));
    }

    if let Some(g) = row.audit_group_number
        && !GROUP_RANGE.contains(&g)
    {
        errors.insert(format!(
            "Row {n} (Para {para}): audit group number {g} is outside {}-{}.",
            GROUP_RANGE.start(),
            GROUP_RANGE.end()
        ));
    }

    if let Some(p) = row.audit_para_number
        && !PARA_RANGE.contains(&p)
    {
        errors.insert(format!(
            "Row {n} (Para {para}): audit para number {p} is outside {}-{}.",
            PARA_RANGE.start(),
            PARA_RANGE.end()
        ));
    }
}

/// Rows whose audit group number is set to a group other than `own`.
pub fn foreign_group_errors(rows: &[FlattenedRow], own: u32) -> Vec<String> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let g = row.audit_group_number.filter(|&g| g != own)?;
            Some(format!(
                "Row {} (Para {}): audit group {g} is not your group ({own}).",
                i + 1,
                row.para_label()
            ))
        })
        .collect()
}

/// One trade name must map to one category across all its rows.
fn check_category_consistency(rows: &[FlattenedRow], errors: &mut BTreeSet<String>) {
    let mut by_name: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();

    for row in rows {
        let Some(name) = row.trade_name.as_deref().map(str::trim) else {
            continue;
        };
        let Some(cat) = row.category.as_deref().map(str::trim) else {
            continue;
        };
        if name.is_empty() || cat.is_empty() {
            continue;
        }
        let cat = Category::parse(cat)
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| cat.to_string());
        by_name.entry(name).or_default().insert(cat);
    }

    for (name, cats) in by_name {
        if cats.len() > 1 {
            let listed: Vec<&str> = cats.iter().map(String::as_str).collect();
            errors.insert(format!(
                "Consistency error: trade name '{name}' has multiple categories across rows: {}.",
                listed.join(", ")
            ));
        }
    }
}
