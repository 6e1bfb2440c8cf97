//! Gemini adapter for structured generation.
//!
//! Uses the REST `generateContent` endpoint with a JSON response MIME type
//! and the caller's response schema.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{GenerationClient, GenerationRequest, ServiceError};

/// Default public API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Upper bound on error bodies carried into messages
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Gemini REST client
pub struct GeminiClient {
    /// API key (sent as a header, never in the URL)
    api_key: String,
    /// Model name, e.g. `gemini-2.0-flash`
    model: String,
    /// API base URL
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build API URL
    fn api_url(&self, suffix: &str) -> String {
        format!("{}/v1beta/models/{}{}", self.base_url, self.model, suffix)
    }

    /// Strip the key from anything that might echo it back
    fn redact(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            return text.to_string();
        }
        text.replace(&self.api_key, "[REDACTED]")
    }

    fn map_reqwest_error(&self, error: reqwest::Error) -> ServiceError {
        let message = self.redact(&error.to_string());
        if error.is_timeout() {
            ServiceError::Timeout(message)
        } else {
            ServiceError::Transport(message)
        }
    }

    async fn status_error(&self, response: reqwest::Response) -> ServiceError {
        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message: String = self.redact(body.trim()).chars().take(MAX_ERROR_BODY_CHARS).collect();
        ServiceError::Status { code, message }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.response_schema,
            },
        });

        let response = self
            .client
            .post(self.api_url(":generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ServiceError::EmptyResponse);
        }

        Ok(text)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        let response = self
            .client
            .get(self.api_url(""))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(
            "SECRET",
            "gemini-2.0-flash",
            "https://example.test/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_api_url() {
        assert_eq!(
            client().api_url(":generateContent"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_redacts_api_key() {
        assert_eq!(
            client().redact("bad key SECRET supplied"),
            "bad key [REDACTED] supplied"
        );
    }

    #[test]
    fn test_response_text_extraction_shape() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let parts = &parsed.candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts.len(), 2);
    }
}
