//! Conversion between conversation messages and the chat completions wire.

use inquest_core::{Message, Role, ToolCallId, ToolCallRequest, ToolSchema};
use inquest_llm::{CompletionOutcome, CompletionRequest, CompletionUsage, ProviderError, ProviderResult};

use crate::types::{
    ChatFunction, ChatFunctionCall, ChatMessage, ChatRequest, ChatResponse, ChatTool, ChatToolCall,
};

/// Build the full request body for one completion.
#[must_use]
pub fn build_request(model: &str, request: &CompletionRequest) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: to_chat_messages(&request.messages),
        tools: to_chat_tools(&request.tools),
        max_tokens: request.options.max_output_tokens,
        temperature: request.options.temperature,
        top_p: request.options.top_p,
        stop: request.options.stop.clone(),
        reasoning_effort: request.options.reasoning_effort.clone(),
    }
}

/// Convert ledger messages to wire messages.
#[must_use]
pub fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|message| ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            tool_calls: message.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|call| ChatToolCall {
                        id: call.id.as_str().to_string(),
                        call_type: "function".into(),
                        function: ChatFunctionCall {
                            name: call.tool_name.clone(),
                            arguments: serde_json::to_string(&call.parameters)
                                .unwrap_or_else(|_| "{}".into()),
                        },
                    })
                    .collect()
            }),
            tool_call_id: message.tool_call_id.as_ref().map(|id| id.as_str().to_string()),
        })
        .collect()
}

/// Convert tool schemas to wire tool definitions.
#[must_use]
pub fn to_chat_tools(tools: &[ToolSchema]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|tool| ChatTool {
            tool_type: "function".into(),
            function: ChatFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: serde_json::to_value(&tool.parameters).unwrap_or_default(),
            },
        })
        .collect()
}

/// Parse a response body into one assistant turn.
///
/// Arguments that fail to parse as a JSON object degrade to empty
/// parameters; the tool itself will then report what was missing, which
/// keeps a malformed model turn from killing the session.
pub fn parse_response(response: ChatResponse) -> ProviderResult<CompletionOutcome> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse {
            message: "response contained no choices".into(),
        })?;

    let tool_calls: Vec<ToolCallRequest> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest {
            id: ToolCallId::from(call.id),
            tool_name: call.function.name,
            parameters: parse_arguments(&call.function.arguments),
        })
        .collect();

    let content = choice.message.content.filter(|c| !c.is_empty());
    let message = if tool_calls.is_empty() {
        Message {
            role: Role::Assistant,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    } else {
        Message::assistant_with_tool_calls(content, tool_calls)
    };

    Ok(CompletionOutcome {
        message,
        reasoning: choice.message.reasoning_content.filter(|r| !r.is_empty()),
        usage: response.usage.map(|u| CompletionUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

fn parse_arguments(arguments: &str) -> serde_json::Map<String, serde_json::Value> {
    if arguments.trim().is_empty() {
        return serde_json::Map::new();
    }
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::warn!(arguments, "tool call arguments were not a JSON object");
            serde_json::Map::new()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
