//! Investigation runtime: the model loop, tool dispatch, and session
//! lifecycle.
//!
//! This crate ties the lower layers together. An [`Investigator`] drives one
//! session's multi-turn loop against a model provider, dispatching tool calls
//! through a [`ToolDispatcher`], pausing on sensitive calls, and emitting
//! every state transition through an [`EventEmitter`]. The [`Orchestrator`]
//! bounds how many sessions run concurrently and carries cancellation to all
//! of them on shutdown.

#![deny(unsafe_code)]

pub mod approval;
pub mod dispatcher;
pub mod emitter;
pub mod errors;
pub mod investigator;
pub mod orchestrator;
pub mod session;

pub use approval::{ApprovalDecision, ApprovalGate, ToolDecision};
pub use dispatcher::ToolDispatcher;
pub use emitter::{channel, EmitError, EventEmitter, EventReceiver};
pub use errors::RuntimeError;
pub use investigator::{InvestigationOutcome, Investigator, InvestigatorConfig};
pub use orchestrator::{ActiveInvestigation, Orchestrator, ServerBusy};
pub use session::{InvestigationSession, DEFAULT_SYSTEM_PROMPT};
