//! The `POST /api/investigate` SSE endpoint.
//!
//! One request starts (or resumes) one investigation. The response is an
//! SSE stream: each frame's SSE event name is the wire kind and its data is
//! the JSON payload. The stream closes after the terminal frame, or after
//! `approval_required` when the session pauses; the client resumes by
//! resubmitting the conversation together with its decisions.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use inquest_core::events::codes;
use inquest_core::{InvestigationEvent, Message};
use inquest_runtime::{
    DEFAULT_SYSTEM_PROMPT, InvestigationSession, ToolDecision, emitter,
};

use crate::error::ApiError;
use crate::server::AppState;

/// Request body for `POST /api/investigate`.
///
/// Untagged: a body carrying `conversation` resumes a paused session, a
/// body carrying `question` starts a fresh one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InvestigateRequest {
    /// Resume a paused conversation with approval decisions.
    Resume {
        /// The conversation exactly as the client last saw it.
        conversation: Vec<Message>,
        /// Verdicts for pending sensitive calls.
        #[serde(default)]
        tool_decisions: Vec<ToolDecision>,
        /// Optional model override.
        model: Option<String>,
    },
    /// Start a new investigation.
    New {
        /// The operator's question.
        question: String,
        /// Optional model override.
        model: Option<String>,
    },
}

/// Handle one investigation request with an SSE stream.
///
/// The session is built before the stream opens, so unusable requests fail
/// as plain HTTP errors and every opened stream is a live investigation.
#[allow(clippy::unused_async)] // handlers must be async for axum's Handler impl
pub async fn investigate(
    State(state): State<AppState>,
    Json(request): Json<InvestigateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (session, decisions) = match build_session(&state, request) {
        Ok(parts) => parts,
        Err(err) => {
            warn!(error = %err, "investigation request rejected");
            return Err(err);
        }
    };
    let admission = state.orchestrator.begin(session.id())?;

    let (emitter, events) = emitter::channel(state.event_backlog);
    let emitter = Arc::new(emitter);
    let investigator = Arc::clone(&state.investigator);
    let cancel = admission.cancellation();
    let session_id = session.id().clone();
    info!(session_id = %session_id, "investigation admitted");

    drop(tokio::spawn(async move {
        let worker = {
            let emitter = Arc::clone(&emitter);
            tokio::spawn(async move {
                let mut session = session;
                investigator
                    .run(&mut session, &decisions, &emitter, &cancel)
                    .await
            })
        };
        if let Err(err) = worker.await {
            error!(session_id = %session_id, error = %err, "investigation task panicked");
            // Best effort: give the open stream a terminal frame before the
            // channel closes.
            let _ = emitter.emit(InvestigationEvent::error(
                codes::GENERIC,
                "Investigation failed unexpectedly",
                err.to_string(),
            ));
        }
        drop(admission);
    }));

    let stream = ReceiverStream::new(events).map(sse_frame);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn build_session(
    state: &AppState,
    request: InvestigateRequest,
) -> Result<(InvestigationSession, Vec<ToolDecision>), ApiError> {
    match request {
        InvestigateRequest::New { question, model } => {
            let model = model.unwrap_or_else(|| state.default_model.clone());
            let session = InvestigationSession::new(model, DEFAULT_SYSTEM_PROMPT, &question)
                .map_err(ApiError::Invalid)?;
            Ok((session, Vec::new()))
        }
        InvestigateRequest::Resume {
            conversation,
            tool_decisions,
            model,
        } => {
            let model = model.unwrap_or_else(|| state.default_model.clone());
            let session =
                InvestigationSession::resume(model, conversation).map_err(ApiError::Invalid)?;
            Ok((session, tool_decisions))
        }
    }
}

fn sse_frame(frame: InvestigationEvent) -> Result<Event, Infallible> {
    let name = frame.event_name();
    Ok(Event::default()
        .event(name)
        .json_data(&frame)
        .unwrap_or_else(|err| {
            error!(event = name, error = %err, "wire frame failed to serialize");
            Event::default().event("error").data(r#"{"success":false}"#)
        }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
