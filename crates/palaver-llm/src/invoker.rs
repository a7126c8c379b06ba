//! One LLM call with retry, backoff, and token-budget truncation

use crate::retry::RetryPolicy;
use crate::{LlmError, LlmProvider};
use std::sync::Arc;
use tracing::{debug, warn};

/// Approximate characters per token used for budget estimates
const CHARS_PER_TOKEN: usize = 4;

/// Input token budget enforced by transcript truncation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    /// Maximum estimated input tokens per request
    pub max_input_tokens: usize,
}

impl TokenBudget {
    /// Create a budget
    pub fn new(max_input_tokens: usize) -> Self {
        Self { max_input_tokens }
    }

    /// Rough token estimate for a text
    pub fn estimate_tokens(text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn max_chars(&self) -> usize {
        self.max_input_tokens.saturating_mul(CHARS_PER_TOKEN)
    }
}

impl Default for TokenBudget {
    /// 8k input tokens
    fn default() -> Self {
        Self::new(8_192)
    }
}

/// A prompt split into its fixed parts and the truncatable transcript
///
/// The renderer keeps the transcript separate so the invoker can drop its
/// oldest lines when the assembled prompt would exceed the budget; the
/// fixed parts are never cut.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Instructions and rendered fields before the transcript
    pub prelude: String,

    /// The conversation transcript, one message per line, oldest first
    pub transcript: String,

    /// Output-format reminder after the transcript
    pub epilogue: String,
}

impl LlmRequest {
    fn assemble(&self, transcript: &str) -> String {
        format!("{}\n{}\n{}", self.prelude, transcript, self.epilogue)
    }

    /// Assemble within the budget, front-truncating the transcript
    ///
    /// Returns the prompt and whether truncation happened. The newest
    /// messages are always kept.
    pub fn fit(&self, budget: &TokenBudget) -> (String, bool) {
        let full = self.assemble(&self.transcript);
        if full.chars().count() <= budget.max_chars() {
            return (full, false);
        }

        let fixed_chars = self.assemble("").chars().count();
        let allowed = budget.max_chars().saturating_sub(fixed_chars);

        // Keep whole lines from the tail while they fit.
        let mut kept: Vec<&str> = Vec::new();
        let mut used = 0usize;
        for line in self.transcript.lines().rev() {
            let cost = line.chars().count() + 1;
            if used + cost > allowed {
                break;
            }
            used += cost;
            kept.push(line);
        }
        kept.reverse();

        (self.assemble(&kept.join("\n")), true)
    }
}

/// What one invocation produced
#[derive(Debug, Clone, PartialEq)]
pub struct LlmOutcome {
    /// Raw provider output
    pub raw: String,

    /// Whether the transcript was truncated to fit the budget
    pub truncated: bool,

    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Performs one LLM request under a retry policy and token budget
///
/// Only retryable errors are retried (see [`LlmError::is_retryable`]);
/// auth and malformed-request failures surface immediately.
pub struct LlmInvoker<P> {
    provider: Arc<P>,
    policy: RetryPolicy,
    budget: TokenBudget,
}

impl<P: LlmProvider> LlmInvoker<P> {
    /// Create an invoker over a shared provider
    pub fn new(provider: Arc<P>, policy: RetryPolicy, budget: TokenBudget) -> Self {
        Self {
            provider,
            policy,
            budget,
        }
    }

    /// Perform the call, retrying transient failures with backoff
    pub async fn invoke(&self, request: &LlmRequest) -> Result<LlmOutcome, LlmError> {
        let (prompt, truncated) = request.fit(&self.budget);
        if truncated {
            debug!(
                "transcript truncated to fit {} input tokens",
                self.budget.max_input_tokens
            );
        }

        let mut attempt = 1u32;
        loop {
            match self.provider.complete(&prompt).await {
                Ok(raw) => {
                    return Ok(LlmOutcome {
                        raw,
                        truncated,
                        attempts: attempt,
                    })
                }
                Err(e) if e.is_retryable() && self.policy.allows_retry(attempt) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        "retryable LLM failure ({}), backing off {:?}", e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    fn request(prelude: &str, transcript: &str) -> LlmRequest {
        LlmRequest {
            prelude: prelude.to_string(),
            transcript: transcript.to_string(),
            epilogue: "Reply with JSON only.".to_string(),
        }
    }

    fn invoker(provider: MockProvider, attempts: u32) -> LlmInvoker<MockProvider> {
        LlmInvoker::new(
            Arc::new(provider),
            RetryPolicy::new(attempts, 0),
            TokenBudget::default(),
        )
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let invoker = invoker(MockProvider::new("ok"), 3);
        let outcome = invoker.invoke(&request("do it", "user: hi")).await.unwrap();
        assert_eq!(outcome.raw, "ok");
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let provider = MockProvider::new("recovered");
        provider.push_result(Err(LlmError::Timeout));
        provider.push_result(Err(LlmError::RateLimited));

        let invoker = invoker(provider, 3);
        let outcome = invoker.invoke(&request("p", "t")).await.unwrap();
        assert_eq!(outcome.raw, "recovered");
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_exhausts_retry_budget() {
        let provider = MockProvider::failing();
        let invoker = LlmInvoker::new(
            Arc::new(provider),
            RetryPolicy::new(3, 0),
            TokenBudget::default(),
        );

        let err = invoker.invoke(&request("p", "t")).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout));
        assert_eq!(invoker.provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let provider = MockProvider::new("unused");
        provider.push_result(Err(LlmError::Auth("bad key".to_string())));

        let invoker = invoker(provider, 3);
        let err = invoker.invoke(&request("p", "t")).await.unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
        assert_eq!(invoker.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_truncation_keeps_newest_lines() {
        let transcript = (0..100)
            .map(|i| format!("user: message number {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let req = request("prelude", &transcript);

        let provider = MockProvider::new("ok");
        let invoker = LlmInvoker::new(
            Arc::new(provider),
            RetryPolicy::none(),
            TokenBudget::new(100),
        );
        let outcome = invoker.invoke(&req).await.unwrap();
        assert!(outcome.truncated);
    }

    #[test]
    fn test_fit_under_budget_is_untouched() {
        let req = request("prelude", "user: hi\nbot: hello");
        let (prompt, truncated) = req.fit(&TokenBudget::default());
        assert!(!truncated);
        assert!(prompt.contains("user: hi"));
        assert!(prompt.contains("bot: hello"));
    }

    #[test]
    fn test_fit_drops_oldest_lines_first() {
        let req = request("p", "oldest line here\nnewest line here");
        // Budget fits the fixed parts plus one transcript line.
        let fixed = req.assemble("").chars().count();
        let budget = TokenBudget::new((fixed + 20).div_ceil(4));

        let (prompt, truncated) = req.fit(&budget);
        assert!(truncated);
        assert!(prompt.contains("newest line here"));
        assert!(!prompt.contains("oldest line here"));
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(TokenBudget::estimate_tokens(""), 0);
        assert_eq!(TokenBudget::estimate_tokens("abcd"), 1);
        assert_eq!(TokenBudget::estimate_tokens("abcde"), 2);
    }
}
