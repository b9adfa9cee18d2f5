//! The investigation loop: model turns, tool dispatch, folding, budgets.
//!
//! One call to [`Investigator::run`] drives a session from its current state
//! to a pause or a terminal frame. Each iteration compacts the ledger if the
//! next completion would not fit, asks the model, and either emits the final
//! answer or dispatches the requested tools and folds their results back in
//! request order. Every path out of the loop leaves the client with exactly
//! one pause or terminal frame, never silence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use inquest_context::constants::{DEFAULT_PRESERVE_FRACTION, DEFAULT_TOOL_RESULT_MAX_TOKENS};
use inquest_context::{compact, truncate_result};
use inquest_core::{
    EventMetadata, InvestigationEvent, Message, ToolCallId, ToolCallRequest, ToolSchema,
};
use inquest_llm::{
    complete_with_retry, CompletionOptions, CompletionRequest, Provider, RetryConfig,
};
use inquest_tokens::{usage_snapshot, ModelLimits};

use crate::approval::{ApprovalDecision, ToolDecision};
use crate::dispatcher::ToolDispatcher;
use crate::emitter::EventEmitter;
use crate::errors::RuntimeError;
use crate::session::InvestigationSession;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for one investigator instance.
#[derive(Clone, Debug)]
pub struct InvestigatorConfig {
    /// Ceiling on model calls per session.
    pub max_steps: u32,
    /// Per-call budget applied to every folded tool result.
    pub tool_result_max_tokens: u64,
    /// Fraction of the input budget the compactor preserves as a recent tail.
    pub preserve_fraction: f64,
    /// Override for the per-model output reservation.
    pub max_output_tokens: Option<u64>,
    /// Retry policy for provider completions.
    pub retry: RetryConfig,
}

impl Default for InvestigatorConfig {
    fn default() -> Self {
        Self {
            max_steps: 15,
            tool_result_max_tokens: DEFAULT_TOOL_RESULT_MAX_TOKENS,
            preserve_fraction: DEFAULT_PRESERVE_FRACTION,
            max_output_tokens: None,
            retry: RetryConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvestigationOutcome {
    /// The model delivered a final answer.
    Completed,
    /// The step ceiling forced a wrap-up.
    StepLimitReached,
    /// Sensitive calls await decisions; the stream is paused, not terminal.
    AwaitingApproval,
    /// The session was cancelled.
    Cancelled,
    /// The run failed; a terminal error frame with this code was emitted.
    Failed {
        /// Error code carried by the terminal frame.
        code: u16,
    },
}

impl InvestigationOutcome {
    /// Stable label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::StepLimitReached => "step_limit",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Cancelled => "cancelled",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ToolPhase {
    Continue,
    Paused,
}

/// Per-run constants: the advertised schemas and the model's budget.
struct ModelContext {
    tools: Vec<ToolSchema>,
    limits: ModelLimits,
}

// ─────────────────────────────────────────────────────────────────────────────
// Investigator
// ─────────────────────────────────────────────────────────────────────────────

/// Drives investigations against one provider and one tool registry.
pub struct Investigator {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    config: InvestigatorConfig,
}

impl Investigator {
    /// Create an investigator.
    #[must_use]
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: ToolDispatcher,
        config: InvestigatorConfig,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            config,
        }
    }

    /// Run the session until it pauses or terminates.
    ///
    /// `decisions` is non-empty only when resuming after an approval pause.
    /// All frames, including the terminal one, go through `emitter`; the
    /// returned outcome is for the caller's logs and metrics.
    #[instrument(skip_all, fields(session_id = %session.id(), model = session.model()))]
    pub async fn run(
        &self,
        session: &mut InvestigationSession,
        decisions: &[ToolDecision],
        emitter: &EventEmitter,
        cancel: &CancellationToken,
    ) -> InvestigationOutcome {
        let started = Instant::now();
        info!(
            prior_turns = session.assistant_turns(),
            decisions = decisions.len(),
            "investigation started"
        );

        let outcome = match self.run_loop(session, decisions, emitter, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let code = err.error_code();
                warn!(code, category = err.category(), error = %err, "investigation failed");
                // Exactly one terminal frame per ending; when the backlog
                // itself failed, delivery is best effort and the closing
                // channel tells the consumer.
                let _ = emitter.emit(InvestigationEvent::error(
                    code,
                    err.description(),
                    err.to_string(),
                ));
                if matches!(err, RuntimeError::Cancelled) {
                    InvestigationOutcome::Cancelled
                } else {
                    InvestigationOutcome::Failed { code }
                }
            }
        };

        if session.gate().has_pending() && outcome != InvestigationOutcome::AwaitingApproval {
            debug!(
                discarded = session.gate().pending_count(),
                "pending approvals discarded"
            );
        }
        metrics::counter!("investigations_total", "outcome" => outcome.label()).increment(1);
        info!(
            outcome = outcome.label(),
            steps = session.assistant_turns(),
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            frames = emitter.emitted_count(),
            "investigation finished"
        );
        outcome
    }

    async fn run_loop(
        &self,
        session: &mut InvestigationSession,
        decisions: &[ToolDecision],
        emitter: &EventEmitter,
        cancel: &CancellationToken,
    ) -> Result<InvestigationOutcome, RuntimeError> {
        let model = ModelContext {
            tools: self.dispatcher.schemas(),
            limits: self.limits_for(session.model()),
        };

        // A resumed session answers its pending calls before the model
        // speaks again.
        let pending = session.pending_requests();
        if pending.is_empty() {
            if let Some(first) = decisions.first() {
                return Err(RuntimeError::UnknownDecision {
                    tool_call_id: first.tool_call_id.clone(),
                });
            }
        } else {
            let decision_map = index_decisions(&pending, decisions)?;
            let phase = self
                .tool_phase(session, &pending, &decision_map, &model, emitter, cancel)
                .await?;
            if phase == ToolPhase::Paused {
                return Ok(InvestigationOutcome::AwaitingApproval);
            }
        }

        let mut steps = session.assistant_turns();
        loop {
            if cancel.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }
            if steps >= self.config.max_steps {
                debug!(steps, "step limit reached, forcing wrap-up");
                let base = session
                    .latest_usage()
                    .map_or_else(EventMetadata::empty, EventMetadata::for_usage);
                emitter.emit(InvestigationEvent::answer_analysis(
                    step_limit_note(self.config.max_steps),
                    frame_metadata(base, session),
                ))?;
                return Ok(InvestigationOutcome::StepLimitReached);
            }

            self.compact_if_needed(session, &model, emitter)?;

            let request = CompletionRequest {
                messages: session.ledger().snapshot(),
                tools: model.tools.clone(),
                options: CompletionOptions {
                    max_output_tokens: Some(model.limits.max_output_tokens),
                    ..CompletionOptions::default()
                },
            };
            let completion =
                complete_with_retry(self.provider.as_ref(), &request, &self.config.retry, cancel)
                    .await
                    .map_err(RuntimeError::from_provider)?;
            steps += 1;

            let message = completion.message;
            session.ledger_mut().append(message.clone())?;
            let requests = message.tool_calls.clone().unwrap_or_default();

            if requests.is_empty() {
                let snapshot = usage_snapshot(session.ledger(), &model.tools, model.limits);
                session.record_usage(snapshot);
                let metadata = frame_metadata(EventMetadata::for_usage(snapshot), session);
                emitter.emit(final_answer_event(message.content_str(), metadata))?;
                return Ok(InvestigationOutcome::Completed);
            }

            debug!(step = steps, calls = requests.len(), "model requested tools");
            emitter.emit(InvestigationEvent::ai_message(
                message.content.clone(),
                completion.reasoning,
                frame_metadata(EventMetadata::empty(), session),
            ))?;

            let phase = self
                .tool_phase(session, &requests, &HashMap::new(), &model, emitter, cancel)
                .await?;
            if phase == ToolPhase::Paused {
                return Ok(InvestigationOutcome::AwaitingApproval);
            }
        }
    }

    /// Dispatch one turn's calls, fold terminal results, account, and pause
    /// if anything is left awaiting approval.
    async fn tool_phase(
        &self,
        session: &mut InvestigationSession,
        requests: &[ToolCallRequest],
        decisions: &HashMap<ToolCallId, ApprovalDecision>,
        model: &ModelContext,
        emitter: &EventEmitter,
        cancel: &CancellationToken,
    ) -> Result<ToolPhase, RuntimeError> {
        let session_id = session.id().clone();
        let results = self
            .dispatcher
            .dispatch(
                &session_id,
                requests,
                decisions,
                session.gate_mut(),
                emitter,
                cancel,
            )
            .await?;

        for result in results {
            if !result.status.is_terminal() {
                emitter.emit(InvestigationEvent::tool_calling_result(&result))?;
                continue;
            }
            let (result, truncation) = truncate_result(result, self.config.tool_result_max_tokens);
            if let Some(record) = truncation {
                debug!(
                    tool = %record.tool_name,
                    id = %record.tool_call_id,
                    original_tokens = record.original_token_count,
                    kept_bytes = record.end_index,
                    "tool result truncated"
                );
                session.record_truncation(record);
            }
            emitter.emit(InvestigationEvent::tool_calling_result(&result))?;
            session.ledger_mut().append(Message::tool_result(&result))?;
        }

        let snapshot = usage_snapshot(session.ledger(), &model.tools, model.limits);
        session.record_usage(snapshot);
        emitter.emit(InvestigationEvent::token_count(frame_metadata(
            EventMetadata::for_usage(snapshot),
            session,
        )))?;

        if session.gate().has_pending() {
            emitter.emit(InvestigationEvent::approval_required(
                session.gate().pending().to_vec(),
            ))?;
            return Ok(ToolPhase::Paused);
        }
        Ok(ToolPhase::Continue)
    }

    /// Replace old tool result bodies when the next completion would not fit.
    fn compact_if_needed(
        &self,
        session: &mut InvestigationSession,
        model: &ModelContext,
        emitter: &EventEmitter,
    ) -> Result<(), RuntimeError> {
        let snapshot = usage_snapshot(session.ledger(), &model.tools, model.limits);
        if !snapshot.over_budget() {
            return Ok(());
        }

        let outcome = compact(
            &session.ledger().snapshot(),
            model.limits,
            self.config.preserve_fraction,
        );
        if !outcome.changed() {
            warn!(
                total_tokens = snapshot.total_tokens,
                "over budget with nothing left to compact"
            );
            return Ok(());
        }

        let summary = outcome.summary();
        let message_count = outcome.messages.len();
        info!(
            omitted = outcome.omitted,
            initial_tokens = outcome.initial_tokens,
            compacted_tokens = outcome.compacted_tokens,
            "conversation history compacted"
        );
        metrics::counter!("compactions_total").increment(1);
        session.ledger_mut().replace(outcome.messages)?;
        let metadata = frame_metadata(
            EventMetadata::for_compaction(outcome.initial_tokens, outcome.compacted_tokens),
            session,
        );
        emitter.emit(InvestigationEvent::history_compacted(
            summary,
            message_count,
            metadata,
        ))?;
        Ok(())
    }

    fn limits_for(&self, model: &str) -> ModelLimits {
        let limits = ModelLimits::for_model(model);
        match self.config.max_output_tokens {
            Some(cap) => limits.with_max_output_tokens(cap),
            None => limits,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Attach the session's accumulated truncation records to a frame's metadata.
fn frame_metadata(base: EventMetadata, session: &InvestigationSession) -> EventMetadata {
    if session.truncations().is_empty() {
        base
    } else {
        base.with_truncations(session.truncations().to_vec())
    }
}

/// Final frame: a flat JSON object of strings becomes `sections`, anything
/// else is plain-text `analysis`.
fn final_answer_event(content: &str, metadata: EventMetadata) -> InvestigationEvent {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(content) {
        if !map.is_empty() && map.values().all(Value::is_string) {
            return InvestigationEvent::answer_sections(map, metadata);
        }
    }
    InvestigationEvent::answer_analysis(content, metadata)
}

fn step_limit_note(max_steps: u32) -> String {
    format!(
        "Investigation stopped after reaching the step limit of {max_steps} model calls. \
         The findings so far are partial; narrow the question or raise the limit to continue."
    )
}

/// Validate resume decisions against the pending calls and index them.
fn index_decisions(
    pending: &[ToolCallRequest],
    decisions: &[ToolDecision],
) -> Result<HashMap<ToolCallId, ApprovalDecision>, RuntimeError> {
    let pending_ids: HashSet<&ToolCallId> = pending.iter().map(|request| &request.id).collect();
    let mut map = HashMap::with_capacity(decisions.len());
    for decision in decisions {
        if !pending_ids.contains(&decision.tool_call_id) {
            return Err(RuntimeError::UnknownDecision {
                tool_call_id: decision.tool_call_id.clone(),
            });
        }
        let _ = map.insert(decision.tool_call_id.clone(), decision.decision());
    }
    Ok(map)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use inquest_core::events::codes;
    use inquest_core::{ParameterSchema, Role, ToolResultStatus};
    use inquest_llm::{CompletionOutcome, ProviderError, ProviderResult};
    use inquest_tools::{ToolCapability, ToolContext, ToolError, ToolOutput, ToolRegistry};

    use crate::emitter::{channel, EventReceiver};
    use crate::session::DEFAULT_SYSTEM_PROMPT;

    // ── scripted collaborators ──

    struct ScriptedProvider {
        model: String,
        turns: Mutex<VecDeque<ProviderResult<CompletionOutcome>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(model: &str, turns: Vec<ProviderResult<CompletionOutcome>>) -> Arc<Self> {
            Arc::new(Self {
                model: model.into(),
                turns: Mutex::new(turns.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn model(&self) -> &str {
            &self.model
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> ProviderResult<CompletionOutcome> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            self.turns.lock().pop_front().unwrap_or_else(|| {
                Err(ProviderError::Other {
                    message: "script exhausted".into(),
                })
            })
        }
    }

    fn answer(text: &str) -> ProviderResult<CompletionOutcome> {
        Ok(CompletionOutcome {
            message: Message::assistant(text),
            reasoning: None,
            usage: None,
        })
    }

    fn tool_turn(content: Option<&str>, calls: Vec<ToolCallRequest>) -> ProviderResult<CompletionOutcome> {
        Ok(CompletionOutcome {
            message: Message::assistant_with_tool_calls(content.map(String::from), calls),
            reasoning: None,
            usage: None,
        })
    }

    struct EchoTool {
        name: String,
        sensitive: bool,
        output: String,
    }

    impl EchoTool {
        fn new(name: &str, output: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                sensitive: false,
                output: output.into(),
            })
        }

        fn gated(name: &str, output: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                sensitive: true,
                output: output.into(),
            })
        }
    }

    #[async_trait]
    impl ToolCapability for EchoTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn sensitive(&self) -> bool {
            self.sensitive
        }

        fn schema(&self) -> inquest_core::ToolSchema {
            inquest_core::ToolSchema {
                name: self.name.clone(),
                description: format!("{} diagnostic", self.name),
                parameters: ParameterSchema::empty_object(),
            }
        }

        async fn execute(
            &self,
            _params: &serde_json::Map<String, Value>,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::new(
                self.output.clone(),
                format!("run {}", self.name),
            ))
        }
    }

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: ToolCallId::from(id),
            tool_name: name.into(),
            parameters: serde_json::Map::new(),
        }
    }

    fn investigator(
        provider: Arc<ScriptedProvider>,
        tools: Vec<Arc<dyn ToolCapability>>,
        config: InvestigatorConfig,
    ) -> Investigator {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        Investigator::new(
            provider,
            ToolDispatcher::new(Arc::new(registry), 4, "/tmp"),
            config,
        )
    }

    fn new_session() -> InvestigationSession {
        InvestigationSession::new("gpt-4o-mini", DEFAULT_SYSTEM_PROMPT, "why is api-7f slow")
            .unwrap()
    }

    fn drain(rx: &mut EventReceiver) -> Vec<InvestigationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn event_names(events: &[InvestigationEvent]) -> Vec<&'static str> {
        events.iter().map(InvestigationEvent::event_name).collect()
    }

    async fn run_to_events(
        investigator: &Investigator,
        session: &mut InvestigationSession,
        decisions: &[ToolDecision],
    ) -> (InvestigationOutcome, Vec<InvestigationEvent>) {
        let (emitter, mut rx) = channel(256);
        let outcome = investigator
            .run(session, decisions, &emitter, &CancellationToken::new())
            .await;
        (outcome, drain(&mut rx))
    }

    // ── plain answers ──

    #[tokio::test]
    async fn answers_without_tools() {
        let provider = ScriptedProvider::new("gpt-4o-mini", vec![answer("the gateway is fine")]);
        let investigator = investigator(Arc::clone(&provider), vec![], InvestigatorConfig::default());
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_eq!(event_names(&events), vec!["ai_answer_end"]);
        assert_matches!(&events[0], InvestigationEvent::AiAnswerEnd { analysis, metadata, .. } => {
            assert_eq!(analysis.as_deref(), Some("the gateway is fine"));
            assert!(metadata.usage.is_some());
        });
        assert_eq!(session.ledger().last().unwrap().role, Role::Assistant);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn structured_final_answer_becomes_sections() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![answer(r#"{"root_cause": "OOM kills", "next_steps": "raise the limit"}"#)],
        );
        let investigator = investigator(provider, vec![], InvestigatorConfig::default());
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_matches!(&events[0], InvestigationEvent::AiAnswerEnd { analysis, sections, .. } => {
            assert!(analysis.is_none());
            let sections = sections.as_ref().unwrap();
            assert_eq!(sections["root_cause"], "OOM kills");
        });
    }

    // ── tool rounds ──

    #[tokio::test]
    async fn single_tool_round_trip() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![
                tool_turn(Some("checking pods"), vec![call("call_1", "list_pods")]),
                answer("pod web-0 is crash-looping"),
            ],
        );
        let investigator = investigator(
            provider,
            vec![EchoTool::new("list_pods", "web-0 CrashLoopBackOff")],
            InvestigatorConfig::default(),
        );
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_eq!(
            event_names(&events),
            vec![
                "ai_message",
                "start_tool_calling",
                "tool_calling_result",
                "token_count",
                "ai_answer_end",
            ]
        );
        assert_matches!(&events[0], InvestigationEvent::AiMessage { content, .. } => {
            assert_eq!(content.as_deref(), Some("checking pods"));
        });
        assert_matches!(&events[2], InvestigationEvent::ToolCallingResult { result, name, .. } => {
            assert_eq!(name, "list_pods");
            assert_eq!(result.status, ToolResultStatus::Success);
            assert_eq!(result.data, Some(json!("web-0 CrashLoopBackOff")));
        });
        assert_matches!(&events[3], InvestigationEvent::TokenCount { metadata } => {
            assert!(metadata.usage.is_some());
            assert_eq!(metadata.max_tokens, Some(128_000));
            assert!(metadata.truncations.is_empty());
        });

        // The fold landed in the ledger and was accounted exactly once.
        let roles: Vec<Role> = session.ledger().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant,
            ]
        );
        assert_eq!(session.usage_history().len(), 2);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result_and_run_continues() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![
                tool_turn(None, vec![call("call_1", "list_podz")]),
                answer("let me correct that"),
            ],
        );
        let investigator = investigator(provider, vec![], InvestigatorConfig::default());
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_matches!(&events[2], InvestigationEvent::ToolCallingResult { result, .. } => {
            assert_eq!(result.status, ToolResultStatus::Error);
            assert_eq!(result.error.as_deref(), Some("Unknown tool: list_podz"));
        });
        // The model sees the error text as the folded result body.
        let tool_message = &session.ledger().messages()[3];
        assert_eq!(tool_message.role, Role::Tool);
        assert_eq!(tool_message.content_str(), "Unknown tool: list_podz");
    }

    // ── truncation ──

    #[tokio::test]
    async fn oversized_result_is_capped_and_recorded() {
        let oversized = "x".repeat(50_000);
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![
                tool_turn(None, vec![call("call_1", "fetch_logs")]),
                answer("logs are noisy"),
            ],
        );
        let investigator = investigator(
            provider,
            vec![EchoTool::new("fetch_logs", &oversized)],
            InvestigatorConfig::default(),
        );
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_matches!(&events[2], InvestigationEvent::ToolCallingResult { result, .. } => {
            let data = result.data.as_ref().unwrap().as_str().unwrap();
            assert!(data.len() < 10_000);
            assert!(data.contains("Output truncated"));
        });
        assert_matches!(&events[3], InvestigationEvent::TokenCount { metadata } => {
            assert_eq!(metadata.truncations.len(), 1);
            assert_eq!(metadata.truncations[0].original_token_count, 12_500);
            assert_eq!(metadata.truncations[0].start_index, 0);
        });
        // Every later frame keeps carrying the truncation records.
        assert_matches!(events.last().unwrap(), InvestigationEvent::AiAnswerEnd { metadata, .. } => {
            assert_eq!(metadata.truncations.len(), 1);
        });
        assert_eq!(session.truncations().len(), 1);
        // The folded body is the capped text, not the original.
        assert!(session.ledger().messages()[3].content_str().len() < 10_000);
    }

    // ── approval flow ──

    #[tokio::test]
    async fn sensitive_call_pauses_the_stream() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![tool_turn(
                Some("I need to restart the pod"),
                vec![call("call_1", "restart_pod")],
            )],
        );
        let investigator = investigator(
            provider,
            vec![EchoTool::gated("restart_pod", "restarted")],
            InvestigatorConfig::default(),
        );
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::AwaitingApproval);
        assert_eq!(
            event_names(&events),
            vec![
                "ai_message",
                "start_tool_calling",
                "tool_calling_result",
                "token_count",
                "approval_required",
            ]
        );
        assert_matches!(&events[2], InvestigationEvent::ToolCallingResult { result, .. } => {
            assert_eq!(result.status, ToolResultStatus::ApprovalRequired);
        });
        assert_matches!(events.last().unwrap(), InvestigationEvent::ApprovalRequired { requires_approval, pending_approvals } => {
            assert!(*requires_approval);
            assert_eq!(pending_approvals.len(), 1);
            assert_eq!(pending_approvals[0].tool_call_id.as_str(), "call_1");
        });
        // Nothing terminal, and the pending call is not folded.
        assert!(events.iter().all(|e| !e.is_terminal()));
        assert_eq!(session.ledger().unanswered_tool_call_ids().len(), 1);
    }

    #[tokio::test]
    async fn normal_call_folds_while_sensitive_peer_pends() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![tool_turn(
                None,
                vec![
                    call("call_1", "get_logs"),
                    call("call_2", "restart_pod"),
                ],
            )],
        );
        let investigator = investigator(
            provider,
            vec![
                EchoTool::new("get_logs", "all quiet"),
                EchoTool::gated("restart_pod", "restarted"),
            ],
            InvestigatorConfig::default(),
        );
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::AwaitingApproval);
        let results: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                InvestigationEvent::ToolCallingResult { result, .. } => Some(result.status),
                _ => None,
            })
            .collect();
        assert_eq!(
            results,
            vec![ToolResultStatus::Success, ToolResultStatus::ApprovalRequired]
        );
        // get_logs folded without waiting on the pending approval.
        assert_eq!(session.ledger().last().unwrap().role, Role::Tool);
        assert_eq!(session.ledger().unanswered_tool_call_ids().len(), 1);
        assert_matches!(events.last().unwrap(), InvestigationEvent::ApprovalRequired { pending_approvals, .. } => {
            assert_eq!(pending_approvals.len(), 1);
            assert_eq!(pending_approvals[0].tool_name, "restart_pod");
        });
    }

    fn paused_conversation() -> Vec<Message> {
        vec![
            Message::system("framing"),
            Message::user("restart the pod"),
            Message::assistant_with_tool_calls(
                Some("restarting".into()),
                vec![call("call_1", "restart_pod")],
            ),
        ]
    }

    #[tokio::test]
    async fn approved_resume_executes_and_completes() {
        let provider =
            ScriptedProvider::new("gpt-4o-mini", vec![answer("restart fixed the crash loop")]);
        let investigator = investigator(
            provider,
            vec![EchoTool::gated("restart_pod", "pod restarted")],
            InvestigatorConfig::default(),
        );
        let mut session =
            InvestigationSession::resume("gpt-4o-mini", paused_conversation()).unwrap();
        let decisions = vec![ToolDecision {
            tool_call_id: ToolCallId::from("call_1"),
            approved: true,
        }];

        let (outcome, events) = run_to_events(&investigator, &mut session, &decisions).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_eq!(
            event_names(&events),
            vec![
                "start_tool_calling",
                "tool_calling_result",
                "token_count",
                "ai_answer_end",
            ]
        );
        assert_matches!(&events[1], InvestigationEvent::ToolCallingResult { result, .. } => {
            assert_eq!(result.status, ToolResultStatus::Success);
            assert_eq!(result.data, Some(json!("pod restarted")));
        });
        assert!(session.ledger().unanswered_tool_call_ids().is_empty());
    }

    #[tokio::test]
    async fn denied_resume_synthesizes_error_and_completes() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![answer("understood, I will not restart the pod")],
        );
        let investigator = investigator(
            provider,
            vec![EchoTool::gated("restart_pod", "pod restarted")],
            InvestigatorConfig::default(),
        );
        let mut session =
            InvestigationSession::resume("gpt-4o-mini", paused_conversation()).unwrap();
        let decisions = vec![ToolDecision {
            tool_call_id: ToolCallId::from("call_1"),
            approved: false,
        }];

        let (outcome, events) = run_to_events(&investigator, &mut session, &decisions).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_matches!(&events[1], InvestigationEvent::ToolCallingResult { result, .. } => {
            assert_eq!(result.status, ToolResultStatus::Error);
            assert_eq!(result.error.as_deref(), Some("Approval denied for restart_pod"));
        });
        // The denial is folded so the model can react to it.
        assert_eq!(
            session.ledger().messages()[3].content_str(),
            "Approval denied for restart_pod"
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn undecided_pending_call_pauses_again() {
        let conversation = vec![
            Message::system("framing"),
            Message::user("clean up the namespace"),
            Message::assistant_with_tool_calls(
                None,
                vec![
                    call("call_1", "restart_pod"),
                    call("call_2", "delete_pod"),
                ],
            ),
        ];
        let provider = ScriptedProvider::new("gpt-4o-mini", vec![]);
        let investigator = investigator(
            Arc::clone(&provider),
            vec![
                EchoTool::gated("restart_pod", "restarted"),
                EchoTool::gated("delete_pod", "deleted"),
            ],
            InvestigatorConfig::default(),
        );
        let mut session = InvestigationSession::resume("gpt-4o-mini", conversation).unwrap();
        let decisions = vec![ToolDecision {
            tool_call_id: ToolCallId::from("call_1"),
            approved: true,
        }];

        let (outcome, events) = run_to_events(&investigator, &mut session, &decisions).await;

        assert_eq!(outcome, InvestigationOutcome::AwaitingApproval);
        // call_1 executed and folded; call_2 is pending again.
        assert_matches!(events.last().unwrap(), InvestigationEvent::ApprovalRequired { pending_approvals, .. } => {
            assert_eq!(pending_approvals.len(), 1);
            assert_eq!(pending_approvals[0].tool_call_id.as_str(), "call_2");
        });
        assert_eq!(session.ledger().unanswered_tool_call_ids().len(), 1);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn resume_executes_undecided_normal_call() {
        let conversation = vec![
            Message::system("framing"),
            Message::user("check the logs"),
            Message::assistant_with_tool_calls(None, vec![call("call_1", "get_logs")]),
        ];
        let provider = ScriptedProvider::new("gpt-4o-mini", vec![answer("logs look clean")]);
        let investigator = investigator(
            provider,
            vec![EchoTool::new("get_logs", "no errors")],
            InvestigatorConfig::default(),
        );
        let mut session = InvestigationSession::resume("gpt-4o-mini", conversation).unwrap();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        assert_matches!(&events[1], InvestigationEvent::ToolCallingResult { result, .. } => {
            assert_eq!(result.status, ToolResultStatus::Success);
        });
    }

    #[tokio::test]
    async fn unknown_decision_id_is_fatal() {
        let provider = ScriptedProvider::new("gpt-4o-mini", vec![]);
        let investigator = investigator(
            Arc::clone(&provider),
            vec![EchoTool::gated("restart_pod", "restarted")],
            InvestigatorConfig::default(),
        );
        let mut session =
            InvestigationSession::resume("gpt-4o-mini", paused_conversation()).unwrap();
        let decisions = vec![ToolDecision {
            tool_call_id: ToolCallId::from("call_other"),
            approved: true,
        }];

        let (outcome, events) = run_to_events(&investigator, &mut session, &decisions).await;

        assert_eq!(outcome, InvestigationOutcome::Failed { code: codes::INVARIANT });
        assert_matches!(events.last().unwrap(), InvestigationEvent::Error { error_code, success, .. } => {
            assert_eq!(*error_code, codes::INVARIANT);
            assert!(!success);
        });
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn decisions_without_pending_calls_are_fatal() {
        let provider = ScriptedProvider::new("gpt-4o-mini", vec![answer("never reached")]);
        let investigator = investigator(Arc::clone(&provider), vec![], InvestigatorConfig::default());
        let mut session = new_session();
        let decisions = vec![ToolDecision {
            tool_call_id: ToolCallId::from("call_1"),
            approved: true,
        }];

        let (outcome, _events) = run_to_events(&investigator, &mut session, &decisions).await;

        assert_eq!(outcome, InvestigationOutcome::Failed { code: codes::INVARIANT });
        assert_eq!(provider.calls(), 0);
    }

    // ── compaction ──

    #[tokio::test]
    async fn compaction_runs_once_and_preserves_the_system_message() {
        let big = "L".repeat(120_000);
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![
                tool_turn(None, vec![ToolCallRequest::new("fetch_logs", serde_json::Map::new())]),
                tool_turn(None, vec![ToolCallRequest::new("fetch_logs", serde_json::Map::new())]),
                tool_turn(None, vec![ToolCallRequest::new("fetch_logs", serde_json::Map::new())]),
                tool_turn(None, vec![ToolCallRequest::new("fetch_logs", serde_json::Map::new())]),
                answer("the logs repeat the same stack trace"),
            ],
        );
        let config = InvestigatorConfig {
            // Large per-call budget so compaction, not truncation, does the work.
            tool_result_max_tokens: 100_000,
            ..InvestigatorConfig::default()
        };
        let investigator = investigator(provider, vec![EchoTool::new("fetch_logs", &big)], config);
        let mut session =
            InvestigationSession::new("gpt-4o-mini", "framing", "why is api-7f slow").unwrap();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Completed);
        let compactions: Vec<_> = events
            .iter()
            .filter(|e| e.event_name() == "conversation_history_compacted")
            .collect();
        assert_eq!(compactions.len(), 1);
        assert_matches!(compactions[0], InvestigationEvent::ConversationHistoryCompacted { content, messages, metadata } => {
            assert!(content.contains("tool results omitted"));
            assert_eq!(*messages, 10);
            assert!(metadata.initial_tokens.unwrap() > metadata.compacted_tokens.unwrap());
        });

        // The framing survives verbatim; older tool bodies are markers now.
        assert_eq!(session.ledger().messages()[0].content_str(), "framing");
        assert!(session
            .ledger()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .any(|m| m.content_str().contains("omitted for space")));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    // ── step ceiling ──

    #[tokio::test]
    async fn step_limit_forces_a_noted_done() {
        let turns = (0..6)
            .map(|_| tool_turn(None, vec![ToolCallRequest::new("get_logs", serde_json::Map::new())]))
            .collect();
        let provider = ScriptedProvider::new("gpt-4o-mini", turns);
        let config = InvestigatorConfig {
            max_steps: 5,
            ..InvestigatorConfig::default()
        };
        let investigator = investigator(
            Arc::clone(&provider),
            vec![EchoTool::new("get_logs", "still looking")],
            config,
        );
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::StepLimitReached);
        assert_eq!(provider.calls(), 5);
        assert_matches!(events.last().unwrap(), InvestigationEvent::AiAnswerEnd { analysis, .. } => {
            assert!(analysis.as_deref().unwrap().contains("step limit of 5"));
        });
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    // ── failures ──

    #[tokio::test]
    async fn provider_failure_after_retries_is_fatal() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![Err(ProviderError::Auth {
                message: "invalid key".into(),
            })],
        );
        let investigator = investigator(provider, vec![], InvestigatorConfig::default());
        let mut session = new_session();

        let (outcome, events) = run_to_events(&investigator, &mut session, &[]).await;

        assert_eq!(outcome, InvestigationOutcome::Failed { code: codes::PROVIDER });
        assert_matches!(events.last().unwrap(), InvestigationEvent::Error { error_code, description, .. } => {
            assert_eq!(*error_code, codes::PROVIDER);
            assert_eq!(description, "Model provider request failed");
        });
    }

    #[tokio::test]
    async fn cancelled_session_emits_cancellation_error() {
        let provider = ScriptedProvider::new("gpt-4o-mini", vec![answer("never reached")]);
        let investigator = investigator(Arc::clone(&provider), vec![], InvestigatorConfig::default());
        let mut session = new_session();
        let (emitter, mut rx) = channel(256);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = investigator.run(&mut session, &[], &emitter, &cancel).await;
        let events = drain(&mut rx);

        assert_eq!(outcome, InvestigationOutcome::Cancelled);
        assert_eq!(event_names(&events), vec!["error"]);
        assert_matches!(&events[0], InvestigationEvent::Error { error_code, .. } => {
            assert_eq!(*error_code, codes::CANCELLED);
        });
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn backlog_overflow_fails_the_run() {
        let provider = ScriptedProvider::new(
            "gpt-4o-mini",
            vec![
                tool_turn(None, vec![call("call_1", "get_logs")]),
                answer("never reached"),
            ],
        );
        let investigator = investigator(
            provider,
            vec![EchoTool::new("get_logs", "ok")],
            InvestigatorConfig::default(),
        );
        let mut session = new_session();
        // Room for two frames and no consumer: the third emit overflows.
        let (emitter, _rx) = channel(2);

        let outcome = investigator
            .run(&mut session, &[], &emitter, &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            InvestigationOutcome::Failed { code: codes::BACKLOG_OVERFLOW }
        );
        assert_eq!(emitter.emitted_count(), 2);
    }
}
