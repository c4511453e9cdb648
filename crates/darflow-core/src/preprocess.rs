//! Result of turning an uploaded PDF into model-ready text.

/// Prefixes that older preprocessors put at the start of the text channel
/// to signal failure. Text starting with one of these is a failure, not a
/// report.
pub const UPSTREAM_FAILURE_PREFIXES: &[&str] = &[
    "Error processing PDF",
    "Error extracting text",
    "Error in PDF preprocessing",
];

/// Tagged outcome of PDF preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreprocessOutcome {
    /// Full report text, pages concatenated.
    Text(String),
    /// Preprocessing failed; the reason is shown to the user as-is.
    Failed(String),
}

impl PreprocessOutcome {
    /// Classify text that may carry a failure sentinel.
    pub fn classify(text: impl Into<String>) -> Self {
        let text = text.into();
        if UPSTREAM_FAILURE_PREFIXES
            .iter()
            .any(|p| text.starts_with(p))
        {
            Self::Failed(text)
        } else {
            Self::Text(text)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
