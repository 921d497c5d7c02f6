//! Narrative composition
//!
//! Asks the model for prose that supplements the deterministic summary.
//! The summary is the authority on numbers; the narrative only explains.
//! Transient failures get a bounded retry with a fixed delay, and the
//! caller falls back to the summary alone when retries run out.

use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatModel, ChatRole};
use crate::models::{Message, MessageRole};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

const SYSTEM_PROMPT: &str = "你是一个专业的销售数据助理。根据提供的上下文信息回答用户问题，\
补充简短的说明和建议。上下文中的数字是准确的，不要改动或重新计算，也不要编造上下文以外的数据。";

pub struct NarrativeComposer {
    model: Arc<dyn ChatModel>,
    max_retries: u32,
    retry_delay: Duration,
}

impl NarrativeComposer {
    pub fn new(model: Arc<dyn ChatModel>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            model,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Generate the explanatory narrative for a summary. Exhausting all
    /// attempts yields a Generation error; the caller degrades.
    pub async fn compose(
        &self,
        summary: &str,
        question: &str,
        window: &[Message],
    ) -> Result<String> {
        let messages = build_messages(summary, question, window);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.model.complete(&messages, false).await {
                Ok(narrative) => return Ok(narrative),
                Err(err) if attempt >= self.max_retries => {
                    warn!(attempt, "Narrative generation exhausted retries: {}", err);
                    return Err(AgentError::Generation(format!(
                        "Narrative failed after {} attempts: {}",
                        attempt, err
                    )));
                }
                Err(err) => {
                    warn!(attempt, "Narrative attempt failed, retrying: {}", err);
                    sleep(self.retry_delay).await;
                }
            }
        }
    }
}

/// Summary first, blank line, then the narrative.
pub fn combine(summary: &str, narrative: &str) -> String {
    format!("{}\n\n{}", summary, narrative)
}

fn build_messages(summary: &str, question: &str, window: &[Message]) -> Vec<ChatMessage> {
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

    messages.push(ChatMessage::user(format!(
        "上下文信息:\n{}\n\n用户问题: {}",
        summary, question
    )));

    messages
}
