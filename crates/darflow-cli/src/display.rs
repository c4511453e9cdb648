//! Terminal rendering: DAR cards, findings, validation errors, summaries.
//!
//! Cards render the first row of a tracker-sheet RecordBatch grouped by
//! section, with type-aware formatting for the column types the sheet uses.

use arrow::array::*;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use darflow_core::{GroupSummary, HEADER_ONLY_HEADING, McmPeriod, SheetRow, dar};

// ── Card section groupings ──

const TAXPAYER: &[&str] = &["audit_group_number", "gstin", "trade_name", "category"];

const OVERALL: &[&str] = &[
    "total_amount_detected_overall_rs",
    "total_amount_recovered_overall_rs",
];

const SOURCE: &[&str] = &["dar_pdf_url", "created_at"];

// ── Public API ──

/// Print one DAR as a card: header sections, then one line per finding.
pub fn print_dar_card(rows: &[SheetRow]) -> anyhow::Result<()> {
    let Some(first) = rows.first() else {
        println!("(no rows)");
        return Ok(());
    };
    let batch = dar::rows_to_batch(std::slice::from_ref(first))?;

    let name = first.row.trade_name.as_deref().unwrap_or("(unknown taxpayer)");
    println!("=== {name} ===");
    println!();

    print_section(&batch, "Taxpayer", TAXPAYER);
    print_section(&batch, "Overall Amounts (Rs)", OVERALL);
    print_section(&batch, "Source", SOURCE);

    println!("Findings");
    for line in finding_lines(rows) {
        println!("  {line}");
    }
    Ok(())
}

/// Print rows as a plain table via Arrow's pretty printer.
pub fn print_rows_table(rows: &[SheetRow]) -> anyhow::Result<()> {
    let batch = dar::rows_to_batch(rows)?;
    println!("{}", arrow::util::pretty::pretty_format_batches(&[batch])?);
    Ok(())
}

pub fn print_validation(errors: &[String]) {
    if errors.is_empty() {
        println!("Validation passed: ready to submit.");
        return;
    }
    println!("Validation failed ({} issue(s)):", errors.len());
    for e in errors {
        println!("  - {e}");
    }
}

pub fn print_summary(groups: &[GroupSummary]) {
    if groups.is_empty() {
        println!("No submitted DARs.");
        return;
    }
    for line in summary_lines(groups) {
        println!("{line}");
    }
}

pub fn print_periods<'a>(periods: impl Iterator<Item = (&'a str, &'a McmPeriod)>) {
    println!("{:<9} {:<16} {:<8} SPREADSHEET", "PERIOD", "MONTH", "STATUS");
    for (key, p) in periods {
        let status = if p.active { "active" } else { "inactive" };
        println!(
            "{key:<9} {:<16} {status:<8} {}",
            format!("{} {}", p.month_name, p.year),
            p.spreadsheet_url
        );
    }
}

// ── Section rendering ──

fn print_section(batch: &RecordBatch, header: &str, cols: &[&str]) {
    let has_data = cols.iter().any(|&col| {
        batch
            .schema()
            .index_of(col)
            .ok()
            .is_some_and(|i| !batch.column(i).is_null(0))
    });
    if !has_data {
        return;
    }

    println!("{header}");
    for &col_name in cols {
        let Ok(idx) = batch.schema().index_of(col_name) else {
            continue;
        };
        let col = batch.column(idx);
        if col.is_null(0) {
            continue;
        }
        if let Some(value) = scalar(col.as_ref()) {
            println!("  {col_name:<34} {value}");
        }
    }
    println!();
}

fn scalar(col: &dyn Array) -> Option<String> {
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| a.value(0).to_string()),
        DataType::UInt32 => col
            .as_any()
            .downcast_ref::<UInt32Array>()
            .map(|a| a.value(0).to_string()),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| format_amount(a.value(0))),
        _ => None,
    }
}

// ── Line builders ──

fn finding_lines(rows: &[SheetRow]) -> Vec<String> {
    rows.iter()
        .map(|r| {
            let f = &r.row;
            if f.is_header_only() {
                return format!("-   {HEADER_ONLY_HEADING}");
            }
            format!(
                "{:<3} {}  [involved {} L, recovered {} L]",
                f.para_label(),
                f.audit_para_heading.as_deref().unwrap_or("(no heading)"),
                opt_amount(f.revenue_involved_lakhs_rs),
                opt_amount(f.revenue_recovered_lakhs_rs),
            )
        })
        .collect()
}

fn summary_lines(groups: &[GroupSummary]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:>5} {:>5} {:>5} {:>14} {:>14} {:>14}",
        "GROUP", "DARS", "PARAS", "DETECTED (L)", "RECOVERED (L)", "PARAS (L)"
    )];
    let mut total = GroupSummary::default();
    for g in groups {
        lines.push(format!(
            "{:>5} {:>5} {:>5} {:>14} {:>14} {:>14}",
            g.audit_group_number,
            g.dars,
            g.paras,
            format_amount(g.detected_lakhs),
            format_amount(g.recovered_lakhs),
            format_amount(g.para_involved_lakhs),
        ));
        total.dars += g.dars;
        total.paras += g.paras;
        total.detected_lakhs += g.detected_lakhs;
        total.recovered_lakhs += g.recovered_lakhs;
        total.para_involved_lakhs += g.para_involved_lakhs;
    }
    lines.push(format!(
        "{:>5} {:>5} {:>5} {:>14} {:>14} {:>14}",
        "ALL",
        total.dars,
        total.paras,
        format_amount(total.detected_lakhs),
        format_amount(total.recovered_lakhs),
        format_amount(total.para_involved_lakhs),
    ));
    lines
}

// ── Helpers ──

fn format_amount(v: f64) -> String {
    format!("{v:.2}")
}

fn opt_amount(v: Option<f64>) -> String {
    v.map(format_amount).unwrap_or_else(|| "-".to_string())
}
