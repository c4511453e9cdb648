//! The seam between extraction logic and whichever hosted model answers it.

use async_trait::async_trait;
use thiserror::Error;

/// One text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub tokens_used: u32,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("prompt blocked by the model: {0}")]
    Blocked(String),
    #[error("unreadable model API response: {0}")]
    Decode(String),
}

#[cfg(feature = "gemini")]
impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// A hosted generative model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ModelError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Replays canned replies in order; the last one repeats forever.
    pub struct ScriptedModel {
        replies: Vec<Result<String, String>>,
        calls: AtomicU32,
        pub prompts: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
            assert!(!replies.is_empty());
            Self {
                replies: replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
                calls: AtomicU32::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn always(reply: &str) -> Self {
            Self::new(vec![Ok(reply)])
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GenerateResponse, ModelError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.prompts.lock().unwrap().push(request.clone());
            match &self.replies[n.min(self.replies.len() - 1)] {
                Ok(text) => Ok(GenerateResponse {
                    text: text.clone(),
                    tokens_used: 10,
                }),
                Err(body) => Err(ModelError::Api {
                    status: 503,
                    body: body.clone(),
                }),
            }
        }
    }
}
