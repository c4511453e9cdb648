//! One extraction attempt against the generative model.

use darflow_core::{ExtractionResult, PreprocessOutcome};
use thiserror::Error;
use tracing::{debug, info};

use crate::clean::{self, ParseFailure};
use crate::model::{GenerativeModel, ModelError};
use crate::prompt;

/// Returned when no model credential is configured.
pub const MISSING_CREDENTIAL: &str =
    "Configuration error: no API key is configured for the generative model.";

/// Returned when preprocessing succeeded but produced no text.
pub const NO_REPORT_TEXT: &str = "No report text to extract from.";

/// Why an attempt should be tried again.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("{0}")]
    Model(#[from] ModelError),
}

impl AttemptFailure {
    /// The model answered, but not with usable JSON.
    pub fn is_shape_error(&self) -> bool {
        match self {
            Self::Parse(p) => p.is_shape_error(),
            Self::Model(_) => false,
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt {
    Success(ExtractionResult),
    Retryable(AttemptFailure),
    /// Not worth retrying; the message is shown to the user as-is.
    Fatal(String),
}

/// Wraps a model with the extraction prompt and response contract.
///
/// `model` is `None` when no credential was configured: every attempt then
/// fails fatally without touching the network.
pub struct ExtractionClient<M> {
    model: Option<M>,
}

impl<M: GenerativeModel> ExtractionClient<M> {
    pub fn new(model: Option<M>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    /// Checks that need no model call. Upstream failure wins over a missing
    /// credential so the user sees the first thing that went wrong.
    pub fn preflight<'a>(&self, input: &'a PreprocessOutcome) -> Result<&'a str, String> {
        let text = match input {
            PreprocessOutcome::Failed(reason) => return Err(reason.clone()),
            PreprocessOutcome::Text(text) => text,
        };
        if self.model.is_none() {
            return Err(MISSING_CREDENTIAL.to_string());
        }
        if text.trim().is_empty() {
            return Err(NO_REPORT_TEXT.to_string());
        }
        Ok(text)
    }

    /// Run attempt number `attempt` (1-based).
    pub async fn attempt(&self, input: &PreprocessOutcome, attempt: u32) -> Attempt {
        let text = match self.preflight(input) {
            Ok(text) => text,
            Err(message) => return Attempt::Fatal(message),
        };
        let Some(model) = self.model.as_ref() else {
            return Attempt::Fatal(MISSING_CREDENTIAL.to_string());
        };

        let request = prompt::extraction_request(text, attempt);
        debug!(
            model = model.name(),
            attempt,
            chars = text.len(),
            "requesting extraction"
        );
        let response = match model.generate(&request).await {
            Ok(r) => r,
            Err(e) => return Attempt::Retryable(e.into()),
        };

        match clean::parse_response(&response.text) {
            Ok(result) => {
                info!(
                    attempt,
                    paras = result.audit_paras.len(),
                    tokens = response.tokens_used,
                    "extraction parsed"
                );
                Attempt::Success(result)
            }
            Err(e) => Attempt::Retryable(e.into()),
        }
    }

    /// Single attempt, flattened into a result. Never fails.
    pub async fn extract(&self, input: &PreprocessOutcome) -> ExtractionResult {
        match self.attempt(input, 1).await {
            Attempt::Success(result) => result,
            Attempt::Retryable(failure) => ExtractionResult::failure(failure.to_string()),
            Attempt::Fatal(message) => ExtractionResult::failure(message),
        }
    }
}
