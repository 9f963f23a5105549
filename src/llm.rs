use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmConfig;
use crate::data_models::{Message, MessageContent, Reply, Role, ToolInvocationRequest};
use crate::error::{ChatError, Result};
use crate::registry::ToolSignature;

/// A hosted chat model that can answer directly or ask for a tool.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &[Message],
        tools: &[ToolSignature],
    ) -> Result<Reply>;
}

// =============================================================================
// OpenAI-compatible wire format (Groq speaks it)
// =============================================================================

#[derive(Serialize, Debug)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize, Debug, PartialEq)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    /// Function name on `tool` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl WireMessage {
    fn plain(role: &'static str, content: &str) -> WireMessage {
        WireMessage {
            role,
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Serialize, Debug)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize, Debug)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments, as a string.
    arguments: String,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

fn to_wire_messages(system_prompt: &str, conversation: &[Message]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(WireMessage::plain("system", system_prompt));

    for message in conversation {
        let wire = match (&message.content, message.speaker) {
            (MessageContent::Text(text), Role::Executor) => WireMessage::plain("user", text),
            (MessageContent::Text(text), Role::Requester) => WireMessage::plain("assistant", text),
            (MessageContent::ToolCall(call), _) => WireMessage {
                role: "assistant",
                content: None,
                tool_calls: Some(vec![WireToolCall {
                    id: call.call_id.clone(),
                    kind: function_kind(),
                    function: WireFunctionCall {
                        name: call.tool_name.clone(),
                        arguments: call.arguments_json(),
                    },
                }]),
                tool_call_id: None,
                name: None,
            },
            (MessageContent::ToolResult(result), _) => WireMessage {
                role: "tool",
                content: Some(result.output.clone()),
                tool_calls: None,
                tool_call_id: Some(result.call_id.clone()),
                name: Some(result.tool_name.clone()),
            },
        };
        messages.push(wire);
    }

    messages
}

fn to_wire_tools(tools: &[ToolSignature]) -> Vec<WireTool<'_>> {
    tools
        .iter()
        .map(|t| WireTool {
            kind: "function",
            function: WireFunction {
                name: &t.name,
                description: &t.description,
                parameters: &t.parameters,
            },
        })
        .collect()
}

fn parse_completion(response: CompletionResponse) -> Result<Reply> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::Backend("completion had no choices".to_string()))?;
    let message = choice.message;

    if let Some(mut calls) = message.tool_calls.filter(|c| !c.is_empty()) {
        if calls.len() > 1 {
            tracing::warn!(
                "backend requested {} tool calls, only the first is honoured",
                calls.len()
            );
        }
        let call = calls.swap_remove(0);
        let arguments: Value = serde_json::from_str(&call.function.arguments).map_err(|e| {
            ChatError::Backend(format!(
                "tool call {} had unparseable arguments: {e}",
                call.function.name
            ))
        })?;
        return Ok(Reply::ToolCall(ToolInvocationRequest::new(
            call.id,
            call.function.name,
            arguments,
        )));
    }

    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(Reply::PlainText(content)),
        _ => Err(ChatError::Backend(
            "completion had neither content nor tool calls".to_string(),
        )),
    }
}

// =============================================================================
// Groq client
// =============================================================================

pub struct GroqClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl GroqClient {
    pub fn new(config: LlmConfig) -> GroqClient {
        GroqClient {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatBackend for GroqClient {
    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &[Message],
        tools: &[ToolSignature],
    ) -> Result<Reply> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| {
                ChatError::Credential(format!("{} is not set", self.config.provider.api_key_var()))
            })?;

        let tools = to_wire_tools(tools);
        let tool_choice = if tools.is_empty() { None } else { Some("auto") };
        let request = CompletionRequest {
            model: &self.config.model,
            messages: to_wire_messages(system_prompt, conversation),
            tools,
            tool_choice,
        };

        let provider = self.config.provider;
        tracing::debug!(
            %provider,
            model = %self.config.model,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Backend(format!("request to {provider} failed: {e}")))?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = res.text().await.unwrap_or_default();
            return Err(ChatError::Credential(format!("{provider} rejected the API key ({status}): {body}")));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ChatError::Backend(format!("{provider} returned {status}: {body}")));
        }

        let body: CompletionResponse = res
            .json()
            .await
            .map_err(|e| ChatError::Backend(format!("malformed completion: {e}")))?;
        parse_completion(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::ToolResult;
    use serde_json::json;

    fn parse(body: &str) -> Result<Reply> {
        parse_completion(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn test_plain_content_reply() {
        let reply = parse(r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#);
        assert_eq!(reply.unwrap(), Reply::PlainText("Hi there".to_string()));
    }

    #[test]
    fn test_tool_call_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[
            {"id":"call_9","type":"function","function":{"name":"tavily_search",
             "arguments":"{\"query\":\"rust 2024\",\"max_results\":3,\"search_depth\":\"advanced\"}"}}
        ]}}]}"#;
        let expected = ToolInvocationRequest::new(
            "call_9",
            "tavily_search",
            json!({"query": "rust 2024", "max_results": 3, "search_depth": "advanced"}),
        );
        assert_eq!(parse(body).unwrap(), Reply::ToolCall(expected));
    }

    #[test]
    fn test_unknown_tool_keeps_its_own_arguments() {
        let body = r#"{"choices":[{"message":{"tool_calls":[
            {"id":"c","type":"function","function":{"name":"get_weather",
             "arguments":"{\"city\":\"Oslo\"}"}}
        ]}}]}"#;
        let expected = ToolInvocationRequest::new("c", "get_weather", json!({"city": "Oslo"}));
        assert_eq!(parse(body).unwrap(), Reply::ToolCall(expected));
    }

    #[test]
    fn test_tool_call_with_bad_json_is_backend_error() {
        let body = r#"{"choices":[{"message":{"tool_calls":[
            {"id":"c","type":"function","function":{"name":"tavily_search","arguments":"{not json"}}
        ]}}]}"#;
        assert!(matches!(parse(body), Err(ChatError::Backend(_))));
    }

    #[test]
    fn test_empty_completion_is_backend_error() {
        assert!(matches!(parse(r#"{"choices":[]}"#), Err(ChatError::Backend(_))));
        assert!(matches!(
            parse(r#"{"choices":[{"message":{"content":""}}]}"#),
            Err(ChatError::Backend(_))
        ));
    }

    #[test]
    fn test_wire_messages_follow_roles() {
        let call = ToolInvocationRequest::new(
            "call_1",
            "tavily_search",
            json!({"query": "weather"}),
        );
        let conversation = vec![
            Message::text(Role::Executor, "what's the weather?"),
            Message::tool_call(call),
            Message::tool_result(ToolResult {
                call_id: "call_1".to_string(),
                tool_name: "tavily_search".to_string(),
                output: "Title: Sunny".to_string(),
            }),
            Message::text(Role::Requester, "It is sunny."),
        ];

        let wire = to_wire_messages("be helpful", &conversation);
        let roles = wire.iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool", "assistant"]);
        assert_eq!(wire[0].content.as_deref(), Some("be helpful"));
        assert_eq!(wire[2].content, None);
        assert_eq!(
            wire[2].tool_calls.as_ref().unwrap()[0].function.name,
            "tavily_search"
        );
        assert_eq!(wire[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(wire[3].name.as_deref(), Some("tavily_search"));
        assert_eq!(
            wire[2].tool_calls.as_ref().unwrap()[0].function.arguments,
            r#"{"query":"weather"}"#
        );
    }

    #[test]
    fn test_request_omits_tools_when_none_visible() {
        let request = CompletionRequest {
            model: "gemma2-9b-it",
            messages: to_wire_messages("sys", &[]),
            tools: Vec::new(),
            tool_choice: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert_eq!(json["model"], "gemma2-9b-it");
    }
}
