//! HTTP chat-completions provider
//!
//! Talks to an OpenAI-style `/v1/chat/completions` endpoint. Retry lives in
//! [`crate::LlmInvoker`], not here: this provider performs exactly one
//! request and maps transport/status failures onto the error taxonomy.

use crate::{LlmError, LlmProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Chat-completions HTTP provider
pub struct HttpProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl HttpProvider {
    /// Create a provider for the given endpoint and model
    ///
    /// `endpoint` is the API base, e.g. `https://api.example.com`; the
    /// chat-completions path is appended.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            client,
        })
    }

    /// Set the bearer API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn classify_status(status: u16, body: String) -> LlmError {
        match status {
            401 | 403 => LlmError::Auth(body),
            400 | 404 | 422 => LlmError::MalformedRequest(body),
            408 => LlmError::Timeout,
            429 => LlmError::RateLimited,
            500..=599 => LlmError::Server { status },
            _ => LlmError::Network(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'));
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: 0.0,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Self::classify_status(status.as_u16(), text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response had no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = HttpProvider::new("https://api.example.com", "gpt-4o-mini").unwrap();
        assert_eq!(provider.endpoint, "https://api.example.com");
        assert_eq!(provider.model, "gpt-4o-mini");
        assert!(provider.api_key.is_none());

        let provider = provider.with_api_key("secret");
        assert!(provider.api_key.is_some());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            HttpProvider::classify_status(401, String::new()),
            LlmError::Auth(_)
        ));
        assert!(matches!(
            HttpProvider::classify_status(400, String::new()),
            LlmError::MalformedRequest(_)
        ));
        assert!(matches!(
            HttpProvider::classify_status(429, String::new()),
            LlmError::RateLimited
        ));
        assert!(matches!(
            HttpProvider::classify_status(503, String::new()),
            LlmError::Server { status: 503 }
        ));
        assert!(matches!(
            HttpProvider::classify_status(408, String::new()),
            LlmError::Timeout
        ));
    }

    #[test]
    fn test_retryability_of_mapped_statuses() {
        assert!(HttpProvider::classify_status(500, String::new()).is_retryable());
        assert!(HttpProvider::classify_status(429, String::new()).is_retryable());
        assert!(!HttpProvider::classify_status(401, String::new()).is_retryable());
        assert!(!HttpProvider::classify_status(400, String::new()).is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let provider = HttpProvider::new("http://127.0.0.1:1", "m").unwrap();
        let err = provider.complete("test").await.unwrap_err();
        assert!(matches!(err, LlmError::Network(_) | LlmError::Timeout));
    }
}
