//! PDF bytes to model-ready report text.
//!
//! `pdf_extract` can panic on malformed input, so extraction runs inside
//! [`std::panic::catch_unwind`]. Every failure comes back as
//! [`PreprocessOutcome::Failed`] with a message starting `Error processing PDF`.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use darflow_core::PreprocessOutcome;
use tracing::{debug, warn};

const FAILURE_PREFIX: &str = "Error processing PDF";

fn failed(reason: impl std::fmt::Display) -> PreprocessOutcome {
    let outcome = PreprocessOutcome::Failed(format!("{FAILURE_PREFIX}: {reason}"));
    warn!(?outcome, "PDF preprocessing failed");
    outcome
}

fn extract_pages(data: &[u8]) -> Result<Vec<String>, String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(data)
    }));
    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(format!("text extraction failed: {e}")),
        Err(_) => Err("text extraction panicked (malformed document)".to_string()),
    }
}

/// Trim line ends, collapse runs of blank lines to two, trim the page.
fn clean_page(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0_u32;
    for line in raw.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim_matches('\n').to_string()
}

/// Join pages under `--- Page N ---` markers, numbering from 1 and skipping
/// pages with no text. `None` if every page is blank.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> Option<String> {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        let text = clean_page(page.as_ref());
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("--- Page {} ---\n{text}", i + 1));
    }
    (!out.is_empty()).then_some(out)
}

pub fn preprocess_bytes(data: &[u8]) -> PreprocessOutcome {
    let pages = match extract_pages(data) {
        Ok(pages) => pages,
        Err(reason) => return failed(reason),
    };
    match join_pages(&pages) {
        Some(text) => {
            debug!(pages = pages.len(), chars = text.len(), "PDF text extracted");
            PreprocessOutcome::Text(text)
        }
        None => failed("no extractable text (may be scanned or image-only)"),
    }
}

pub fn preprocess_file(path: &Path) -> PreprocessOutcome {
    match std::fs::read(path) {
        Ok(data) => preprocess_bytes(&data),
        Err(e) => failed(format!("reading {}: {e}", path.display())),
    }
}
