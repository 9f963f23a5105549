use std::sync::Arc;

use crate::data_models::{
    Message, MessageContent, Role, SearchRequest, ToolInvocationRequest, ToolResult,
};
use crate::error::{ChatError, Result};
use crate::llm::ChatBackend;
use crate::registry::{ToolRegistry, ToolSignature};

pub const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant with access to internet search capabilities.";

pub const DEFAULT_MAX_TURNS: usize = 2;

/// The LLM-backed side of an exchange.
pub struct RequesterRole {
    backend: Arc<dyn ChatBackend>,
    system_prompt: String,
    tools: Vec<ToolSignature>,
}

impl RequesterRole {
    /// Captures the signatures `registry` exposes to [`Role::Requester`].
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        system_prompt: impl Into<String>,
        registry: &ToolRegistry,
    ) -> RequesterRole {
        RequesterRole {
            backend,
            system_prompt: system_prompt.into(),
            tools: registry.signatures_for(Role::Requester),
        }
    }

    pub fn tools(&self) -> &[ToolSignature] {
        &self.tools
    }

    pub async fn respond(&self, conversation_so_far: &[Message]) -> Result<Message> {
        let reply = self
            .backend
            .complete(&self.system_prompt, conversation_so_far, &self.tools)
            .await?;
        Ok(reply.into())
    }
}

#[derive(Debug)]
enum ExchangeState {
    AwaitingRequesterReply,
    AwaitingToolResult(ToolInvocationRequest),
    Done,
}

/// The non-LLM side: relays the user's text and runs the tools the
/// requester asks for.
pub struct ExecutorRole {
    registry: Arc<ToolRegistry>,
}

impl ExecutorRole {
    pub fn new(registry: Arc<ToolRegistry>) -> ExecutorRole {
        ExecutorRole { registry }
    }

    /// Drive one exchange of at most `max_turns` requester replies.
    ///
    /// A plain-text reply ends the exchange straight away. A tool call is
    /// executed only if another turn is left to hand the result back, so a
    /// tool call in the final turn is returned as-is.
    pub async fn exchange(
        &self,
        user_text: &str,
        requester: &RequesterRole,
        max_turns: usize,
    ) -> Result<Vec<Message>> {
        let mut conversation = vec![Message::text(Role::Executor, user_text)];
        let mut turns = 0usize;
        let mut state = ExchangeState::AwaitingRequesterReply;

        loop {
            state = match state {
                ExchangeState::AwaitingRequesterReply if turns >= max_turns => ExchangeState::Done,
                ExchangeState::AwaitingRequesterReply => {
                    turns += 1;
                    tracing::debug!("exchange turn {turns}/{max_turns}");
                    let reply = requester.respond(&conversation).await?;
                    let next = match &reply.content {
                        MessageContent::ToolCall(call) if turns < max_turns => {
                            ExchangeState::AwaitingToolResult(call.clone())
                        }
                        MessageContent::ToolCall(call) => {
                            tracing::warn!(
                                "turn limit reached, not executing tool call {}",
                                call.tool_name
                            );
                            ExchangeState::Done
                        }
                        _ => ExchangeState::Done,
                    };
                    conversation.push(reply);
                    next
                }
                ExchangeState::AwaitingToolResult(call) => {
                    let result = self.execute(&call).await?;
                    conversation.push(Message::tool_result(result));
                    ExchangeState::AwaitingRequesterReply
                }
                ExchangeState::Done => {
                    tracing::debug!(
                        "exchange done after {turns} turn(s), {} messages",
                        conversation.len()
                    );
                    return Ok(conversation);
                }
            };
        }
    }

    /// Resolve the tool by name first, then check its arguments; both happen
    /// before anything is dispatched.
    async fn execute(&self, call: &ToolInvocationRequest) -> Result<ToolResult> {
        let handler = self
            .registry
            .handler_for(&call.tool_name, Role::Executor)
            .ok_or_else(|| ChatError::ToolNotFound(call.tool_name.clone()))?;
        let request = SearchRequest::from_arguments(&call.arguments)?;

        let output = handler.search(&request).await?;
        let result = ToolResult {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            output,
        };
        tracing::debug!(
            tool = %result.tool_name,
            call_id = %result.call_id,
            bytes = result.output.len(),
            "tool result ready"
        );
        Ok(result)
    }
}
