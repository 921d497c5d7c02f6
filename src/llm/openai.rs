//! OpenAI-compatible chat completion client
//!
//! Serves both completion modes the pipeline needs: schema-constrained
//! single completions and SSE token streams.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatModel, TokenStream};
use crate::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Reusable chat-completion client (connection-pooled, fixed timeout).
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String, model: String, temperature: f32, timeout: Duration) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.api_key.clone(),
            config.api_base_url.clone(),
            config.model.clone(),
            config.temperature,
            config.request_timeout,
        )
    }

    fn ensure_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(AgentError::Llm("OPENAI_API_KEY not configured".to_string()));
        }
        Ok(())
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage], json_mode: bool) -> Result<String> {
        self.ensure_key()?;

        let url = format!("{}/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: Self::to_api_messages(messages),
            temperature: self.temperature,
            response_format: json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        };

        debug!(model = %self.model, json_mode, "Calling chat completion API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                AgentError::Llm(format!("Completion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Completion API error response: {}", error_text);
            return Err(AgentError::Llm(format!(
                "Completion API returned {}: {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            AgentError::InvalidResponse(format!("Completion parse error: {}", e))
        })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::InvalidResponse("No choices in completion".to_string()))?;

        Ok(choice.message.content)
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.ensure_key()?;

        let url = format!("{}/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: Self::to_api_messages(messages),
            temperature: self.temperature,
            response_format: None,
            stream: true,
        };

        debug!(model = %self.model, "Opening streaming completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("Streaming request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, "Streaming API error response: {}", error_text);
            return Err(AgentError::Llm(format!(
                "Streaming API returned {}: {}",
                status, error_text
            )));
        }

        let (tx, rx) = mpsc::channel(64);

        // Read the SSE byte stream line by line and forward content deltas.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(AgentError::Llm(format!("Stream interrupted: {}", e))))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            let delta = stream_resp
                                .choices
                                .first()
                                .and_then(|c| c.delta.content.clone());

                            if let Some(content) = delta {
                                if !content.is_empty() && tx.send(Ok(content)).await.is_err() {
                                    return; // receiver dropped
                                }
                            }
                        }
                        Err(e) => {
                            debug!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;

    #[test]
    fn request_serialization_includes_json_mode() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ApiMessage {
                role: ChatRole::User.as_str().to_string(),
                content: "已收了多少？".to_string(),
            }],
            temperature: 0.7,
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("json_object"));
        assert!(json.contains("已收了多少"));
    }

    #[test]
    fn request_serialization_omits_absent_response_format() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![],
            temperature: 0.7,
            response_format: None,
            stream: true,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("response_format"));
        assert!(json.contains("\"stream\":true"));
    }

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"你好"},"finish_reason":null}]}"#;
        let resp: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(resp.choices[0].delta.content.as_deref(), Some("你好"));
    }

    #[test]
    fn parse_stream_finish_chunk_without_content() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let resp: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(resp.choices[0].delta.content.is_none());
    }
}
