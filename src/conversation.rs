use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::data_models::{Message, MessageContent, Role};
use crate::error::ChatError;
use crate::roles::{ExecutorRole, RequesterRole};

pub const FAREWELL_PHRASES: [&str; 3] = ["exit", "quit", "bye"];
pub const FAREWELL: &str = "Goodbye! Have a great day!";
pub const FALLBACK_REPLY: &str = "I apologize, but I couldn't generate a response.";

pub fn is_farewell(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    FAREWELL_PHRASES.contains(&input.as_str())
}

/// First plain-text requester message; failing that, the last tool-call
/// directive the requester left unanswered; failing that, the fallback.
pub fn extract_answer(conversation: &[Message]) -> String {
    let requester = || conversation.iter().filter(|m| m.speaker == Role::Requester);

    if let Some(text) = requester().find_map(Message::as_text) {
        return text.to_string();
    }
    requester()
        .filter_map(|m| match &m.content {
            MessageContent::ToolCall(call) => Some(call.to_string()),
            _ => None,
        })
        .last()
        .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}

/// The console loop: one line in, one fresh exchange, one answer out.
pub struct ConversationLoop {
    requester: RequesterRole,
    executor: ExecutorRole,
    max_turns: usize,
}

impl ConversationLoop {
    pub fn new(requester: RequesterRole, executor: ExecutorRole, max_turns: usize) -> Self {
        Self {
            requester,
            executor,
            max_turns,
        }
    }

    /// Answer a single user line. Errors are reported in-band so one bad
    /// exchange never ends the session.
    pub async fn respond_to(&self, user_text: &str) -> String {
        match self
            .executor
            .exchange(user_text, &self.requester, self.max_turns)
            .await
        {
            Ok(conversation) => extract_answer(&conversation),
            Err(ChatError::ToolNotFound(name)) => {
                tracing::warn!("requester asked for unknown tool {name}");
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                tracing::error!("exchange failed: {:#}", e);
                format!("Sorry, something went wrong: {e}")
            }
        }
    }

    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        loop {
            output.write_all(b"User: ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                tracing::debug!("input closed, leaving chat loop");
                output.write_all(b"\n").await?;
                break;
            };

            if is_farewell(&line) {
                output
                    .write_all(format!("Chatbot: {FAREWELL}\n").as_bytes())
                    .await?;
                break;
            }

            let answer = self.respond_to(&line).await;
            output
                .write_all(format!("Chatbot: {answer}\n").as_bytes())
                .await?;
        }
        output.flush().await?;
        Ok(())
    }
}

#[test]
fn test_is_farewell() {
    for input in ["exit", "EXIT", " Quit ", "bye", "Bye\n", "\tquit"] {
        assert!(is_farewell(input), "{input:?} should end the chat");
    }
    for input in ["", "hello", "exit now", "goodbye", "quit!"] {
        assert!(!is_farewell(input), "{input:?} should not end the chat");
    }
}

#[test]
fn test_extract_answer_without_requester_is_fallback() {
    let conversation = vec![Message::text(Role::Executor, "hello")];
    assert_eq!(extract_answer(&conversation), FALLBACK_REPLY);
    assert_eq!(extract_answer(&[]), FALLBACK_REPLY);
}
