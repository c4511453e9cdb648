//! Extraction pipeline: DAR PDF → text → model → flattened rows.

use std::path::Path;
use std::time::Instant;

use darflow_ai::pdf;
use darflow_ai::{
    ExtractionClient, GeminiModel, GenerativeModel, RetryController, RetryOutcome, RetryPolicy,
};
use darflow_core::{FlattenedRow, PreprocessOutcome, Settings, flatten};
use tracing::{info, warn};

pub struct Extracted {
    pub outcome: RetryOutcome,
    pub rows: Vec<FlattenedRow>,
    pub elapsed_secs: f64,
}

impl Extracted {
    /// Error text the reviewer should see, if any. A partial result can carry
    /// one alongside usable rows.
    pub fn error(&self) -> Option<&str> {
        self.outcome.result.error()
    }
}

/// Retry controller backed by the hosted model. A missing key still yields a
/// controller: every run then ends with the configuration error.
pub fn gemini_controller(
    settings: &Settings,
    api_key: Option<String>,
) -> RetryController<GeminiModel> {
    let model = GeminiModel::from_key(&settings.gemini_base_url, &settings.model, api_key);
    if model.is_none() {
        warn!("no generative model API key configured");
    }
    RetryController::new(
        ExtractionClient::new(model),
        RetryPolicy::from_settings(settings),
    )
}

/// Run extraction on already-preprocessed input.
pub async fn extract_rows<M: GenerativeModel>(
    controller: &RetryController<M>,
    input: &PreprocessOutcome,
) -> Extracted {
    let start = Instant::now();
    let outcome = controller.run_detailed(input).await;
    let rows = flatten(&outcome.result);
    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        attempts = outcome.attempts,
        rows = rows.len(),
        paras = outcome.result.audit_paras.len(),
        elapsed_secs,
        "extraction finished"
    );
    Extracted {
        outcome,
        rows,
        elapsed_secs,
    }
}

/// Read and preprocess a PDF on the blocking pool, then extract.
pub async fn extract_pdf<M: GenerativeModel>(
    controller: &RetryController<M>,
    path: &Path,
) -> anyhow::Result<Extracted> {
    let owned = path.to_path_buf();
    let input = tokio::task::spawn_blocking(move || pdf::preprocess_file(&owned)).await?;
    if let PreprocessOutcome::Text(text) = &input {
        info!(path = %path.display(), chars = text.len(), "PDF text extracted");
    }
    Ok(extract_rows(controller, &input).await)
}
