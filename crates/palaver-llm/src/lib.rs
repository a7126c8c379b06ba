//! Palaver LLM Provider Layer
//!
//! Pluggable LLM providers plus the invoker that wraps one call with
//! bounded retry, backoff, and token-budget truncation.
//!
//! # Architecture
//!
//! This crate defines the [`LlmProvider`] boundary and its error taxonomy.
//! The taxonomy distinguishes retryable failures (timeout, rate limit,
//! server errors) from non-retryable ones (auth, malformed request); only
//! retryable failures are retried, under an explicit [`RetryPolicy`].
//!
//! # Providers
//!
//! - [`MockProvider`]: deterministic mock for testing, with call counting
//!   and an in-flight gauge for concurrency assertions
//! - [`HttpProvider`]: chat-completions HTTP API integration
//!
//! # Examples
//!
//! ```
//! use palaver_llm::{LlmProvider, MockProvider};
//!
//! # tokio_test::block_on(async {
//! let provider = MockProvider::new(r#"{"summary": "ok"}"#);
//! let result = provider.complete("test prompt").await.unwrap();
//! assert_eq!(result, r#"{"summary": "ok"}"#);
//! # });
//! ```

#![warn(missing_docs)]

pub mod http;
mod invoker;
mod retry;

pub use http::HttpProvider;
pub use invoker::{LlmInvoker, LlmOutcome, LlmRequest, TokenBudget};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// The request timed out
    #[error("request timed out")]
    Timeout,

    /// The provider rate-limited the request
    #[error("rate limit exceeded")]
    RateLimited,

    /// The provider returned a server error
    #[error("server error: HTTP {status}")]
    Server {
        /// HTTP status code
        status: u16,
    },

    /// Authentication or authorization failure
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request itself was malformed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Network or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The provider's response could not be read
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether a retry may succeed
    ///
    /// Transient conditions (timeout, rate limit, server errors, transport
    /// failures) are retryable; auth and malformed-request failures are not
    /// going to improve on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout
                | LlmError::RateLimited
                | LlmError::Server { .. }
                | LlmError::Network(_)
        )
    }
}

/// Trait for LLM completion providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given prompt
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without any network calls, counts
/// invocations, and tracks the peak number of concurrent calls so tests
/// can assert concurrency bounds.
pub struct MockProvider {
    default_response: String,
    responses: Mutex<HashMap<String, String>>,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fail_all: bool,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    /// A provider that returns a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            fail_all: false,
            delay: None,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A provider where every call fails with a retryable timeout
    pub fn failing() -> Self {
        let mut provider = Self::new("");
        provider.fail_all = true;
        provider
    }

    /// Sleep this long inside each call, to create observable overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a specific response for a given prompt
    pub fn add_response(&self, prompt: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(prompt.into(), response.into());
    }

    /// Queue a scripted result; scripted results are consumed in order
    /// before any per-prompt or default response applies
    pub fn push_result(&self, result: Result<String, LlmError>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Number of times `complete` was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Peak number of concurrent `complete` calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Reset the call counter
    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_all {
            Err(LlmError::Timeout)
        } else if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            scripted
        } else if let Some(response) = self.responses.lock().unwrap().get(prompt) {
            Ok(response.clone())
        } else {
            Ok(self.default_response.clone())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_default() {
        let provider = MockProvider::new("fixed");
        assert_eq!(provider.complete("anything").await.unwrap(), "fixed");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_specific_responses() {
        let provider = MockProvider::new("default");
        provider.add_response("hello", "world");

        assert_eq!(provider.complete("hello").await.unwrap(), "world");
        assert_eq!(provider.complete("other").await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_mock_provider_script_takes_precedence() {
        let provider = MockProvider::new("default");
        provider.push_result(Err(LlmError::Timeout));
        provider.push_result(Ok("after retry".to_string()));

        assert!(matches!(
            provider.complete("p").await,
            Err(LlmError::Timeout)
        ));
        assert_eq!(provider.complete("p").await.unwrap(), "after retry");
        assert_eq!(provider.complete("p").await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_mock_provider_failing() {
        let provider = MockProvider::failing();
        assert!(matches!(
            provider.complete("p").await,
            Err(LlmError::Timeout)
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout.is_retryable());
        assert!(LlmError::RateLimited.is_retryable());
        assert!(LlmError::Server { status: 503 }.is_retryable());
        assert!(LlmError::Network("reset".to_string()).is_retryable());

        assert!(!LlmError::Auth("bad key".to_string()).is_retryable());
        assert!(!LlmError::MalformedRequest("no model".to_string()).is_retryable());
        assert!(!LlmError::InvalidResponse("not json".to_string()).is_retryable());
    }
}
