//! Open-domain fallback conversation
//!
//! Handles the turns where no structured intent was found or retrieval
//! came back empty. The reply is assembled from a token stream; partial
//! text is never persisted — only the fully drained reply counts, and a
//! failed stream turns into a fixed apology instead.

use crate::llm::{ChatMessage, ChatModel, ChatRole, TokenStream};
use crate::models::{Message, MessageRole};
use crate::Result;
use std::sync::Arc;
use tracing::warn;

/// Fixed reply when generation fails at any point.
pub const APOLOGY_MESSAGE: &str = "抱歉，处理您的请求时出现错误。请重试。";

const SYSTEM_PROMPT: &str =
    "你是一个智能客服助理，用简洁友好的中文回答用户的问题。";

pub struct FallbackConversationalist {
    model: Arc<dyn ChatModel>,
}

impl FallbackConversationalist {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Open the raw token stream for a turn. UI layers may render the
    /// increments; only the drained whole is canonical.
    pub async fn open_stream(&self, window: &[Message], input: &str) -> Result<TokenStream> {
        let messages = build_messages(window, input);
        self.model.stream(&messages).await
    }

    /// Drain the stream to the final reply text. Any stream failure
    /// discards what arrived so far and yields the apology message.
    pub async fn reply(&self, window: &[Message], input: &str) -> String {
        let mut stream = match self.open_stream(window, input).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Fallback stream failed to open: {}", err);
                return APOLOGY_MESSAGE.to_string();
            }
        };

        let mut drained = String::new();
        while let Some(chunk) = stream.recv().await {
            match chunk {
                Ok(text) => drained.push_str(&text),
                Err(err) => {
                    warn!("Fallback stream interrupted, discarding partial text: {}", err);
                    return APOLOGY_MESSAGE.to_string();
                }
            }
        }

        drained
    }
}

fn build_messages(window: &[Message], input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));

    for msg in window {
        let role = match msg.role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        };
        messages.push(ChatMessage {
            role,
            content: msg.content.clone(),
        });
    }

    messages.push(ChatMessage::user(input));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::llm::{MockChatModel, ScriptedReply};
    use async_trait::async_trait;
    use uuid::Uuid;

    #[tokio::test]
    async fn reply_is_the_fully_drained_stream() {
        let model = Arc::new(MockChatModel::always("你好！很高兴为您服务。"));
        let fallback = FallbackConversationalist::new(model.clone());

        let reply = fallback.reply(&[], "你好").await;

        assert_eq!(reply, "你好！很高兴为您服务。");
        let prompt = model.last_prompt().unwrap();
        assert!(prompt.contains("user: 你好"));
    }

    #[tokio::test]
    async fn history_precedes_the_new_input() {
        let model = Arc::new(MockChatModel::always("好的"));
        let fallback = FallbackConversationalist::new(model.clone());

        let session_id = Uuid::new_v4();
        let window = vec![
            Message::new(session_id, MessageRole::User, "之前的问题".to_string(), None),
            Message::new(session_id, MessageRole::Assistant, "之前的回答".to_string(), None),
        ];

        fallback.reply(&window, "新的问题").await;

        let prompt = model.last_prompt().unwrap();
        let history_pos = prompt.find("之前的问题").unwrap();
        let input_pos = prompt.find("新的问题").unwrap();
        assert!(history_pos < input_pos);
    }

    #[tokio::test]
    async fn interrupted_stream_discards_partial_text() {
        let model = Arc::new(MockChatModel::new(vec![ScriptedReply::InterruptedStream {
            partial: "我认为这个问题".to_string(),
            error: "connection reset".to_string(),
        }]));
        let fallback = FallbackConversationalist::new(model);

        let reply = fallback.reply(&[], "讲个故事").await;

        assert_eq!(reply, APOLOGY_MESSAGE);
    }

    struct RefusingModel;

    #[async_trait]
    impl ChatModel for RefusingModel {
        async fn complete(&self, _: &[ChatMessage], _: bool) -> Result<String> {
            Err(AgentError::Llm("not configured".to_string()))
        }

        async fn stream(&self, _: &[ChatMessage]) -> Result<TokenStream> {
            Err(AgentError::Llm("not configured".to_string()))
        }
    }

    #[tokio::test]
    async fn stream_open_failure_also_yields_apology() {
        let fallback = FallbackConversationalist::new(Arc::new(RefusingModel));
        assert_eq!(fallback.reply(&[], "你好").await, APOLOGY_MESSAGE);
    }
}
