//! Retry policy for provider completions.
//!
//! Exponential backoff with jitter, capped per attempt. A provider-supplied
//! `Retry-After` hint always wins over a shorter computed backoff. Retries
//! stop on the first non-retryable error, on exhaustion, or on cancellation;
//! whatever error escapes this module is final as far as the loop is
//! concerned.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::provider::{CompletionOutcome, CompletionRequest, Provider, ProviderError, ProviderResult};

/// Default maximum retries.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default jitter factor (0.0 to 1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Configuration for completion retry behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in ms.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay between retries in ms.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0 to 1.0.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff delay with explicit randomness.
///
/// Formula: `min(max_delay, base_delay * 2^attempt) * (1 + (random*2-1) * jitter)`.
/// `random` should be a value in `[0.0, 1.0)` from a PRNG.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_ms(attempt: u32, config: &RetryConfig, random: f64) -> u64 {
    let exponential = config.base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(config.max_delay_ms);

    // Maps random [0,1) to [-jitter, +jitter]
    let jitter = 1.0 + (random * 2.0 - 1.0) * config.jitter_factor;
    ((capped as f64) * jitter).round().max(0.0) as u64
}

/// Parse a `Retry-After` HTTP header value.
///
/// The value can be either a number of seconds (`"120"`) or an HTTP-date
/// (`"Thu, 01 Dec 2025 16:00:00 GMT"`). Returns the delay in milliseconds,
/// or `None` if parsing fails.
#[must_use]
pub fn parse_retry_after_header(value: &str) -> Option<u64> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds * 1000);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let delay_ms = date
            .signed_duration_since(chrono::Utc::now())
            .num_milliseconds();
        #[allow(clippy::cast_sign_loss)]
        return Some(if delay_ms > 0 { delay_ms as u64 } else { 0 });
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry loop
// ─────────────────────────────────────────────────────────────────────────────

/// Call [`Provider::complete`] with retries on transient failures.
///
/// Cancellation is observed both while a request is in flight and while
/// waiting out a backoff.
pub async fn complete_with_retry(
    provider: &dyn Provider,
    request: &CompletionRequest,
    config: &RetryConfig,
    cancel: &CancellationToken,
) -> ProviderResult<CompletionOutcome> {
    let mut attempt = 0u32;
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = provider.complete(request) => result,
        };

        let err = match result {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= config.max_retries {
            return Err(err);
        }

        let backoff = backoff_delay_ms(attempt, config, rand::random::<f64>());
        let wait_ms = err.retry_after_ms().map_or(backoff, |ra| backoff.max(ra));
        metrics::counter!("provider_retries_total", "category" => err.category()).increment(1);
        tracing::warn!(
            model = provider.model(),
            attempt,
            wait_ms,
            error = %err,
            "provider call failed, retrying"
        );

        attempt += 1;
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            () = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CompletionOptions;
    use assert_matches::assert_matches;
    use inquest_core::Message;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ── backoff math ──

    fn config(base: u64, max: u64) -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: base,
            max_delay_ms: max,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = config(1_000, 60_000);
        assert_eq!(backoff_delay_ms(0, &cfg, 0.5), 1_000);
        assert_eq!(backoff_delay_ms(1, &cfg, 0.5), 2_000);
        assert_eq!(backoff_delay_ms(2, &cfg, 0.5), 4_000);
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = config(1_000, 5_000);
        assert_eq!(backoff_delay_ms(10, &cfg, 0.5), 5_000);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let cfg = config(1_000, 60_000);
        assert_eq!(backoff_delay_ms(300, &cfg, 0.5), 60_000);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let cfg = RetryConfig {
            jitter_factor: 0.2,
            ..config(1_000, 60_000)
        };
        // random=0 -> -20%, random~1 -> +20%
        assert_eq!(backoff_delay_ms(0, &cfg, 0.0), 800);
        assert_eq!(backoff_delay_ms(0, &cfg, 0.999), 1_200);
        assert_eq!(backoff_delay_ms(0, &cfg, 0.5), 1_000);
    }

    // ── retry-after parsing ──

    #[test]
    fn retry_after_integer_seconds() {
        assert_eq!(parse_retry_after_header("120"), Some(120_000));
        assert_eq!(parse_retry_after_header("0"), Some(0));
    }

    #[test]
    fn retry_after_past_date_clamps_to_zero() {
        assert_eq!(
            parse_retry_after_header("Thu, 01 Dec 1994 16:00:00 GMT"),
            Some(0)
        );
    }

    #[test]
    fn retry_after_garbage_is_none() {
        assert_eq!(parse_retry_after_header("soon"), None);
        assert_eq!(parse_retry_after_header(""), None);
    }

    // ── retry loop ──

    struct ScriptedProvider {
        calls: AtomicU32,
        script: Mutex<Vec<ProviderResult<CompletionOutcome>>>,
    }

    impl ScriptedProvider {
        fn new(mut script: Vec<ProviderResult<CompletionOutcome>>) -> Self {
            script.reverse();
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> ProviderResult<CompletionOutcome> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ProviderError::Other { message: "script exhausted".into() }))
        }
    }

    fn ok_outcome() -> ProviderResult<CompletionOutcome> {
        Ok(CompletionOutcome {
            message: Message::assistant("done"),
            reasoning: None,
            usage: None,
        })
    }

    fn rate_limited(retry_after_ms: u64) -> ProviderResult<CompletionOutcome> {
        Err(ProviderError::RateLimited {
            retry_after_ms,
            message: "too many requests".into(),
        })
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("framing"), Message::user("q")],
            tools: vec![],
            options: CompletionOptions::default(),
        }
    }

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn first_success_needs_no_retry() {
        let provider = ScriptedProvider::new(vec![ok_outcome()]);
        let outcome = complete_with_retry(
            &provider,
            &request(),
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.message.content_str(), "done");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let provider = ScriptedProvider::new(vec![rate_limited(0), ok_outcome()]);
        let outcome = complete_with_retry(
            &provider,
            &request(),
            &fast_config(),
            &CancellationToken::new(),
        )
        .await;
        assert!(outcome.is_ok());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::Auth {
                message: "invalid api key".into(),
            }),
            ok_outcome(),
        ]);
        let err = complete_with_retry(
            &provider,
            &request(),
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_matches!(err, ProviderError::Auth { .. });
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_the_last_error() {
        let provider = ScriptedProvider::new(vec![
            rate_limited(0),
            rate_limited(0),
            rate_limited(0),
            rate_limited(0),
        ]);
        let config = RetryConfig {
            max_retries: 2,
            ..fast_config()
        };
        let err = complete_with_retry(&provider, &request(), &config, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_matches!(err, ProviderError::RateLimited { .. });
        // initial try + 2 retries
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let provider = ScriptedProvider::new(vec![ok_outcome()]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = complete_with_retry(&provider, &request(), &fast_config(), &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, ProviderError::Cancelled);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_hint_dominates_backoff() {
        let provider = ScriptedProvider::new(vec![rate_limited(30_000), ok_outcome()]);
        let started = tokio::time::Instant::now();
        let outcome = complete_with_retry(
            &provider,
            &request(),
            &fast_config(),
            &CancellationToken::new(),
        )
        .await;
        assert!(outcome.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(30_000));
    }
}
