//! Gemini reasoning-backend client.
//!
//! Thin JSON client over the `generateContent` endpoint. The backend imposes
//! no output schema; all structure is recovered by the parser. Callers chain
//! models themselves (primary, then fallback) - this type only knows how to
//! issue one generation call and decode its envelope.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Fast model used for the first diagnosis pass.
pub const PRIMARY_MODEL: &str = "gemini-2.5-flash";

/// Deeper model used as fallback and for the smart retry.
pub const FALLBACK_MODEL: &str = "gemini-1.5-pro-latest";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default sampling temperature for diagnosis generation.
const TEMPERATURE: f32 = 0.5;
/// Output budget per generation call.
const MAX_OUTPUT_TOKENS: u32 = 4096;
/// Nucleus-sampling parameter.
const TOP_P: f32 = 0.9;

/// Errors from the reasoning backend.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("backend returned no text (finish_reason={finish_reason})")]
    Empty { finish_reason: String },
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
}

/// Diagnosis prompts quote raw cluster logs, which routinely trip content
/// filters; generation runs with filtering relaxed.
#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

fn relaxed_safety() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .iter()
    .map(|category| SafetySetting {
        category,
        threshold: "BLOCK_NONE",
    })
    .collect()
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Client for the Gemini `generateContent` API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client with the given API key.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the base URL (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Issue one generation call and return the concatenated response text.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, ReasoningError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                top_p: TOP_P,
            },
            safety_settings: relaxed_safety(),
        };

        debug!(model, prompt_len = prompt.len(), "Calling reasoning backend");

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ReasoningError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let decoded: GenerateResponse = response.json().await?;

        let mut finish_reason = "unknown".to_string();
        for candidate in decoded.candidates {
            if let Some(reason) = candidate.finish_reason {
                finish_reason = reason;
            }
            if let Some(content) = candidate.content {
                let text = content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n");
                let text = text.trim().to_string();
                if !text.is_empty() {
                    return Ok(text);
                }
            }
        }

        Err(ReasoningError::Empty { finish_reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Root Cause: ok")))
            .mount(&server)
            .await;

        let client = GeminiClient::new("key").with_base_url(server.uri());
        let text = client.generate("test-model", "prompt").await.unwrap();
        assert_eq!(text, "Root Cause: ok");
    }

    #[tokio::test]
    async fn test_generate_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("key").with_base_url(server.uri());
        let err = client.generate("test-model", "prompt").await.unwrap_err();
        match err {
            ReasoningError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_generate_empty_candidates_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("key").with_base_url(server.uri());
        let err = client.generate("test-model", "prompt").await.unwrap_err();
        match err {
            ReasoningError::Empty { finish_reason } => assert_eq!(finish_reason, "SAFETY"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
