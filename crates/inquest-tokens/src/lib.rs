//! # inquest-tokens
//!
//! Deterministic token accounting for investigation conversations.
//!
//! Uses a chars/4 approximation: identical input always yields identical
//! counts, which is what the budgeting, truncation, and compaction layers
//! build their guarantees on. Exact tokenizer parity with any particular
//! model is explicitly not a goal; the approximation is applied consistently
//! on both sides of every comparison.

#![deny(unsafe_code)]

pub mod accountant;
pub mod limits;

pub use accountant::{
    count_message_tokens, count_text_tokens, count_tool_schema_tokens, usage_snapshot,
};
pub use limits::ModelLimits;
