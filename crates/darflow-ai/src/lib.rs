//! Extraction layer: turns DAR text into an [`ExtractionResult`] by way of a
//! hosted generative model, with response cleaning and bounded retry.
//!
//! [`ExtractionResult`]: darflow_core::ExtractionResult

pub mod clean;
pub mod client;
pub mod model;
pub mod prompt;
pub mod retry;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "pdf")]
pub mod pdf;

pub use clean::{ParseFailure, parse_response, strip_code_fences};
pub use client::{Attempt, AttemptFailure, ExtractionClient, MISSING_CREDENTIAL};
pub use model::{GenerateRequest, GenerateResponse, GenerativeModel, ModelError};
pub use retry::{RetryController, RetryOutcome, RetryPolicy};

#[cfg(feature = "gemini")]
pub use gemini::GeminiModel;
