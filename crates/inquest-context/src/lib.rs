//! # inquest-context
//!
//! Context-window enforcement for investigation conversations.
//!
//! Two layers of defense against unbounded tool output:
//!
//! - **Truncation** shrinks a single oversized tool result to a per-call
//!   token budget before it is folded into the ledger.
//! - **Compaction** shrinks the whole conversation when cumulative usage
//!   approaches the model's context window, replacing old tool result
//!   bodies with short omission markers while keeping the system message
//!   and the recent tail verbatim.
//!
//! Both are pure functions over messages and budgets; the orchestration
//! loop decides when to apply them.

#![deny(unsafe_code)]

pub mod compaction;
pub mod constants;
pub mod truncation;

pub use compaction::{compact, CompactionOutcome};
pub use truncation::{truncate_result, truncate_text};
