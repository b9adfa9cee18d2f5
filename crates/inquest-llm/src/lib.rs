//! # inquest-llm
//!
//! Model provider abstraction for the investigation loop.
//!
//! The loop talks to exactly one interface: [`Provider::complete`], which
//! takes the current conversation plus advertised tool schemas and returns
//! one assistant turn. Everything vendor-specific (wire formats, auth,
//! status code mapping) lives behind that trait in backend crates.
//!
//! Retry policy lives here too: transient provider failures are retried
//! with exponential backoff and jitter before the loop ever sees them, so
//! an error surfaced to the loop is final.

#![deny(unsafe_code)]

pub mod error_parsing;
pub mod provider;
pub mod retry;

pub use error_parsing::{parse_api_error, ApiErrorInfo};
pub use provider::{
    CompletionOptions, CompletionOutcome, CompletionRequest, CompletionUsage, Provider,
    ProviderError, ProviderResult,
};
pub use retry::{complete_with_retry, parse_retry_after_header, RetryConfig};
