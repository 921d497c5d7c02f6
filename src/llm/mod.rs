//! Chat model contract and implementations
//!
//! The orchestrator talks to the completion service through this trait:
//! a schema-constrained single completion for parsing and narration, and
//! a streaming completion for open conversation.

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

pub mod openai;
pub use openai::OpenAiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One prompt message in a model request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Incremental text chunks from a streaming completion. Finite, not
/// restartable; only the fully drained text is canonical.
pub type TokenStream = mpsc::Receiver<Result<String>>;

/// The completion service contract.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Single round-trip completion. With `json_mode` the response is
    /// constrained to a single JSON object.
    async fn complete(&self, messages: &[ChatMessage], json_mode: bool) -> Result<String>;

    /// Streaming completion yielding text increments.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream>;
}

//
// ================= Mock model =================
//

/// Scripted reply for the mock model.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Failure(String),
    /// Stream that emits `partial` and then fails mid-flight.
    InterruptedStream { partial: String, error: String },
}

/// Mock chat model for development & testing.
/// Keeps the pipeline functional without a live completion service.
pub struct MockChatModel {
    replies: std::sync::Mutex<VecDeque<ScriptedReply>>,
    prompts: std::sync::Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockChatModel {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
            prompts: std::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A model that answers every request with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedReply::Text(text.into())])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Full text of the most recent request, for prompt assertions.
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().expect("mock prompts poisoned").last().cloned()
    }

    fn record_prompt(&self, messages: &[ChatMessage]) {
        let text = messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().expect("mock prompts poisoned").push(text);
    }

    fn next_reply(&self) -> ScriptedReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().expect("mock replies poisoned");
        if replies.len() == 1 {
            // Last scripted reply repeats forever.
            replies.front().cloned().unwrap()
        } else {
            replies
                .pop_front()
                .unwrap_or(ScriptedReply::Failure("no scripted reply left".to_string()))
        }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, messages: &[ChatMessage], _json_mode: bool) -> Result<String> {
        self.record_prompt(messages);
        match self.next_reply() {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Failure(err) => Err(AgentError::Llm(err)),
            ScriptedReply::InterruptedStream { error, .. } => Err(AgentError::Llm(error)),
        }
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.record_prompt(messages);
        let reply = self.next_reply();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            match reply {
                ScriptedReply::Text(text) => {
                    for chunk in chunk_text(&text) {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                }
                ScriptedReply::Failure(err) => {
                    let _ = tx.send(Err(AgentError::Llm(err))).await;
                }
                ScriptedReply::InterruptedStream { partial, error } => {
                    for chunk in chunk_text(&partial) {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(Err(AgentError::Llm(error))).await;
                }
            }
        });

        Ok(rx)
    }
}

fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(4)
        .map(|c| c.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_replays_scripted_text() {
        let model = MockChatModel::new(vec![
            ScriptedReply::Text("first".to_string()),
            ScriptedReply::Text("second".to_string()),
        ]);

        let first = model.complete(&[], false).await.unwrap();
        let second = model.complete(&[], false).await.unwrap();

        assert_eq!(first, "first");
        assert_eq!(second, "second");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_stream_reassembles_to_original_text() {
        let model = MockChatModel::always("你好，很高兴认识你");
        let mut stream = model.stream(&[]).await.unwrap();

        let mut drained = String::new();
        while let Some(chunk) = stream.recv().await {
            drained.push_str(&chunk.unwrap());
        }

        assert_eq!(drained, "你好，很高兴认识你");
    }

    #[tokio::test]
    async fn interrupted_stream_ends_with_an_error() {
        let model = MockChatModel::new(vec![ScriptedReply::InterruptedStream {
            partial: "partial text".to_string(),
            error: "connection reset".to_string(),
        }]);

        let mut stream = model.stream(&[]).await.unwrap();
        let mut saw_error = false;
        while let Some(chunk) = stream.recv().await {
            if chunk.is_err() {
                saw_error = true;
            }
        }

        assert!(saw_error);
    }
}
