//! Bounded retry around [`ExtractionClient`].

use std::time::Duration;

use darflow_core::{ExtractionResult, PreprocessOutcome, Settings};
use tracing::{error, info, warn};

use crate::client::{Attempt, AttemptFailure, ExtractionClient};
use crate::model::GenerativeModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Multiplied by the attempt number after malformed or schema-violating output.
    pub parse_backoff: Duration,
    /// Multiplied by the attempt number after an empty response or API error.
    pub empty_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            parse_backoff: Duration::from_secs(2),
            empty_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.max_retries,
            parse_backoff: Duration::from_secs(settings.parse_backoff_secs),
            empty_backoff: Duration::from_secs(settings.empty_backoff_secs),
        }
    }

    /// Same budget, no waiting.
    pub fn no_delay(max_retries: u32) -> Self {
        Self {
            max_retries,
            parse_backoff: Duration::ZERO,
            empty_backoff: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before the attempt after `attempt` failed with `failure`. Never
    /// shorter than `previous`.
    pub fn delay(&self, attempt: u32, failure: &AttemptFailure, previous: Duration) -> Duration {
        let base = if failure.is_shape_error() {
            self.parse_backoff
        } else {
            self.empty_backoff
        };
        previous.max(base.saturating_mul(attempt))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    pub result: ExtractionResult,
    /// Attempts actually made, including ones short-circuited before a model call.
    pub attempts: u32,
}

/// Total function from report input to [`ExtractionResult`].
pub struct RetryController<M> {
    client: ExtractionClient<M>,
    policy: RetryPolicy,
}

impl<M: GenerativeModel> RetryController<M> {
    pub fn new(client: ExtractionClient<M>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &ExtractionClient<M> {
        &self.client
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn run(&self, input: &PreprocessOutcome) -> ExtractionResult {
        self.run_detailed(input).await.result
    }

    pub async fn run_detailed(&self, input: &PreprocessOutcome) -> RetryOutcome {
        let max_attempts = self.policy.max_attempts();
        let mut delay = Duration::ZERO;
        let mut last_failure: Option<AttemptFailure> = None;

        for attempt in 1..=max_attempts {
            let failure = match self.client.attempt(input, attempt).await {
                Attempt::Success(result) => {
                    if attempt > 1 {
                        info!(attempt, "extraction succeeded after retry");
                    }
                    return RetryOutcome {
                        result,
                        attempts: attempt,
                    };
                }
                Attempt::Fatal(message) => {
                    warn!(attempt, error = %message, "extraction not attempted");
                    return RetryOutcome {
                        result: ExtractionResult::failure(message),
                        attempts: attempt,
                    };
                }
                Attempt::Retryable(failure) => failure,
            };

            match &failure {
                AttemptFailure::Model(e) => {
                    error!(attempt, max_attempts, error = %e, "model API error")
                }
                AttemptFailure::Parse(e) => {
                    warn!(attempt, max_attempts, error = %e, "unusable model response")
                }
            }

            if attempt < max_attempts {
                delay = self.policy.delay(attempt, &failure, delay);
                info!(attempt, delay_ms = delay.as_millis() as u64, "retrying extraction");
                tokio::time::sleep(delay).await;
            }
            last_failure = Some(failure);
        }

        let last = last_failure
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        RetryOutcome {
            result: ExtractionResult::failure(format!(
                "Extraction failed after {max_attempts} attempt(s). Last error: {last}"
            )),
            attempts: max_attempts,
        }
    }
}
