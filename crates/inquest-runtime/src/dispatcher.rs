//! Concurrent tool dispatch: scatter by call, gather in request order.
//!
//! Every request handed in produces exactly one result slot. Unknown tools
//! and denied calls resolve immediately; sensitive calls without an approval
//! park in the gate; everything else executes concurrently under a bounded
//! number of in-flight permits. Tool failures become error results the model
//! can read, never a session failure.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use inquest_core::{
    InvestigationEvent, SessionId, ToolCallId, ToolCallRequest, ToolCallResult, ToolResultStatus,
    ToolSchema,
};
use inquest_tools::{ToolContext, ToolRegistry};

use crate::approval::{ApprovalDecision, ApprovalGate};
use crate::emitter::EventEmitter;
use crate::errors::RuntimeError;

/// Dispatches one turn's tool calls against the registry.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    max_in_flight: usize,
    working_directory: String,
}

impl ToolDispatcher {
    /// Create a dispatcher over a read-only registry.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        max_in_flight: usize,
        working_directory: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            max_in_flight: max_in_flight.max(1),
            working_directory: working_directory.into(),
        }
    }

    /// Schemas advertised to the model, in the registry's stable order.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    /// Dispatch `requests` and return one result per request, in request
    /// order, regardless of completion order.
    ///
    /// `decisions` carries resume-time approvals; it is empty on a normal
    /// turn. A `start_tool_calling` frame is emitted for every request
    /// before anything executes.
    #[instrument(skip_all, fields(session_id = %session_id, calls = requests.len()))]
    pub async fn dispatch(
        &self,
        session_id: &SessionId,
        requests: &[ToolCallRequest],
        decisions: &HashMap<ToolCallId, ApprovalDecision>,
        gate: &mut ApprovalGate,
        emitter: &EventEmitter,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolCallResult>, RuntimeError> {
        for request in requests {
            emitter.emit(InvestigationEvent::start_tool_calling(request))?;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut slots: Vec<Option<ToolCallResult>> = Vec::with_capacity(requests.len());
        let mut in_flight: JoinSet<(usize, ToolCallResult)> = JoinSet::new();

        for (index, request) in requests.iter().enumerate() {
            if decisions.get(&request.id) == Some(&ApprovalDecision::Denied) {
                debug!(tool = %request.tool_name, id = %request.id, "tool call denied");
                slots.push(Some(ToolCallResult::error(
                    request,
                    format!("Approval denied for {}", request.tool_name),
                )));
                continue;
            }

            let Some(tool) = self.registry.get(&request.tool_name) else {
                warn!(tool = %request.tool_name, id = %request.id, "unknown tool requested");
                slots.push(Some(ToolCallResult::error(
                    request,
                    format!("Unknown tool: {}", request.tool_name),
                )));
                continue;
            };

            let approved = decisions.get(&request.id) == Some(&ApprovalDecision::Approved);
            if tool.sensitive() && !approved {
                let description = tool.schema().description;
                gate.submit(request, &description);
                slots.push(Some(ToolCallResult::approval_required(
                    request,
                    description,
                )));
                continue;
            }

            slots.push(None);
            let ctx = ToolContext {
                tool_call_id: request.id.clone(),
                session_id: session_id.clone(),
                working_directory: self.working_directory.clone(),
                cancellation: cancel.child_token(),
            };
            let request = request.clone();
            let semaphore = Arc::clone(&semaphore);
            let _ = in_flight.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        index,
                        ToolCallResult::error(&request, "dispatch slot unavailable"),
                    );
                };
                debug!(tool = %request.tool_name, id = %request.id, "executing tool call");
                let result = match tool.execute(&request.parameters, &ctx).await {
                    Ok(output) => {
                        ToolCallResult::success(&request, output.data, output.description)
                    }
                    Err(err) => ToolCallResult::error(&request, err.to_string()),
                };
                (index, result)
            });
        }

        while !in_flight.is_empty() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    in_flight.abort_all();
                    while in_flight.join_next().await.is_some() {}
                    return Err(RuntimeError::Cancelled);
                }
                joined = in_flight.join_next() => match joined {
                    Some(Ok((index, result))) => slots[index] = Some(result),
                    Some(Err(err)) => warn!(error = %err, "tool task failed"),
                    None => break,
                },
            }
        }

        let results: Vec<ToolCallResult> = requests
            .iter()
            .zip(slots)
            .map(|(request, slot)| {
                slot.unwrap_or_else(|| {
                    ToolCallResult::error(request, "tool execution failed unexpectedly")
                })
            })
            .collect();

        for result in &results {
            let status = match result.status {
                ToolResultStatus::Success => "success",
                ToolResultStatus::Error => "error",
                ToolResultStatus::ApprovalRequired => "approval_required",
            };
            metrics::counter!("tool_dispatches_total", "status" => status).increment(1);
        }
        Ok(results)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
