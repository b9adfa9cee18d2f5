//! # inquest-core
//!
//! Foundation types for the Inquest investigation engine.
//!
//! This crate provides the shared vocabulary that all other Inquest crates
//! depend on:
//!
//! - **Branded IDs**: `SessionId`, `ToolCallId` as newtypes for type safety
//! - **Messages**: conversation `Message` with role, content, tool calls
//! - **Ledger**: append-only `MessageLedger` with invariant enforcement
//! - **Tool calls**: `ToolCallRequest`, `ToolCallResult`, `ToolSchema`,
//!   `TruncationRecord`
//! - **Usage**: point-in-time `TokenUsageSnapshot` accounting
//! - **Events**: the streaming wire protocol served to investigation clients

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod ledger;
pub mod messages;
pub mod tools;
pub mod usage;

pub use events::{EventMetadata, InvestigationEvent, PendingApproval};
pub use ids::{SessionId, ToolCallId};
pub use ledger::{LedgerError, MessageLedger};
pub use messages::{Message, Role};
pub use tools::{
    ParameterSchema, ToolCallRequest, ToolCallResult, ToolResultStatus, ToolSchema,
    TruncationRecord,
};
pub use usage::TokenUsageSnapshot;
