//! Google Gemini `generateContent` adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{GenerateRequest, GenerateResponse, GenerativeModel, ModelError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    /// `base_url` should not have a trailing slash; one is trimmed if present.
    pub fn new(base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    /// Build from an optional key: `None` (or a blank key) means no credential.
    pub fn from_key(base_url: &str, model: &str, api_key: Option<String>) -> Option<Self> {
        api_key
            .filter(|k| !k.trim().is_empty())
            .map(|k| Self::new(base_url, model, k))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<PartOut<'a>>,
}

#[derive(Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Deserialize)]
struct PartIn {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u32,
}

fn build_request(req: &GenerateRequest) -> ApiRequest<'_> {
    ApiRequest {
        system_instruction: req.system_prompt.as_deref().map(|s| Content {
            role: None,
            parts: vec![PartOut { text: s }],
        }),
        contents: vec![Content {
            role: Some("user"),
            parts: vec![PartOut {
                text: &req.user_prompt,
            }],
        }],
        generation_config: GenerationConfig {
            temperature: req.temperature,
            max_output_tokens: req.max_tokens,
            response_mime_type: "application/json",
        },
    }
}

/// Concatenate the first candidate's text parts. No candidates and a block
/// reason means the prompt was refused; no candidates otherwise is an empty
/// answer.
fn into_response(resp: ApiResponse) -> Result<GenerateResponse, ModelError> {
    let tokens_used = resp.usage_metadata.map_or(0, |u| u.total_token_count);
    let Some(candidate) = resp.candidates.into_iter().next() else {
        if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked(reason));
        }
        return Ok(GenerateResponse {
            text: String::new(),
            tokens_used,
        });
    };
    let text = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
        .unwrap_or_default();
    Ok(GenerateResponse { text, tokens_used })
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ModelError> {
        let url = self.endpoint();
        debug!(url = %url, "calling Gemini");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(request))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ApiResponse = resp.json().await?;
        into_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            system_prompt: Some("sys".into()),
            user_prompt: "user".into(),
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[test]
    fn request_body_uses_camel_case_and_json_mime() {
        let req = request();
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 100);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn response_text_parts_are_joined() {
        let json = r#"{
            "candidates": [{ "content": { "parts": [{"text": "{\"a\""}, {"text": ": 1}"}] },
                             "finishReason": "STOP" }],
            "usageMetadata": { "totalTokenCount": 42 }
        }"#;
        let resp = into_response(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(resp.text, "{\"a\": 1}");
        assert_eq!(resp.tokens_used, 42);
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let json = r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#;
        let err = into_response(serde_json::from_str(json).unwrap()).unwrap_err();
        assert!(matches!(err, ModelError::Blocked(r) if r == "SAFETY"));
    }

    #[test]
    fn no_candidates_is_empty_text() {
        let resp = into_response(ApiResponse::default()).unwrap();
        assert!(resp.text.is_empty());
    }

    #[test]
    fn blank_key_means_no_credential() {
        assert!(GeminiModel::from_key(DEFAULT_BASE_URL, "m", None).is_none());
        assert!(GeminiModel::from_key(DEFAULT_BASE_URL, "m", Some("  ".into())).is_none());
        let model = GeminiModel::from_key("http://localhost:8080/", "m", Some("k".into())).unwrap();
        assert_eq!(
            model.endpoint(),
            "http://localhost:8080/v1beta/models/m:generateContent"
        );
    }
}
