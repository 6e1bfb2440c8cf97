//! Adapter interfaces for the external generation service.
//!
//! The orchestrator never talks HTTP directly; every request goes through
//! a [`GenerationClient`], wrapped by `core::ResilientCaller`.

pub mod gemini;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

// Re-export the Gemini adapter
pub use gemini::GeminiClient;

/// HTTP statuses treated as transient (rate limited / service unavailable)
pub const TRANSIENT_STATUS_CODES: [u16; 2] = [429, 503];

/// A single structured-generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Prompt text
    pub prompt: String,

    /// Name of the expected document shape
    pub shape: &'static str,

    /// JSON schema the response should satisfy
    pub response_schema: Value,
}

/// Failure reported by the transport
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Service returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service returned no content")]
    EmptyResponse,
}

impl ServiceError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Rate-limited or service-unavailable
    pub fn is_transient(&self) -> bool {
        self.status_code()
            .map(|code| TRANSIENT_STATUS_CODES.contains(&code))
            .unwrap_or(false)
    }
}

/// Trait for generation backends
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Send one request and return the raw response text
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;

    /// Check the backend is reachable and configured
    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let rate_limited = ServiceError::Status {
            code: 429,
            message: "quota".into(),
        };
        let unavailable = ServiceError::Status {
            code: 503,
            message: "overloaded".into(),
        };
        let server_error = ServiceError::Status {
            code: 500,
            message: "boom".into(),
        };

        assert!(rate_limited.is_transient());
        assert!(unavailable.is_transient());
        assert!(!server_error.is_transient());
        assert!(!ServiceError::Timeout("30s".into()).is_transient());
        assert!(!ServiceError::EmptyResponse.is_transient());
    }
}
