//! Environment-based configuration
//!
//! All knobs come from env vars (loaded via dotenv in the binaries).
//! Missing values fall back to the defaults the agent shipped with.

use std::env;
use std::time::Duration;

/// Runtime configuration for the orchestrator and its collaborators.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API key for the chat-completion service.
    pub api_key: String,
    /// Base URL of an OpenAI-compatible endpoint.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Explicit timeout applied to every model round-trip.
    pub request_timeout: Duration,
    /// Maximum history messages exposed to any model call.
    pub max_context_messages: usize,
    /// Retry bound for narrative generation.
    pub max_retries: u32,
    /// Fixed delay between narrative retry attempts.
    pub retry_delay: Duration,
    /// Postgres URL for chat storage and sales records, if configured.
    pub database_url: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            api_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            temperature: parse_env("OPENAI_TEMPERATURE", 0.7),
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 30u64)),
            max_context_messages: parse_env("MAX_CONTEXT_MESSAGES", 10usize),
            max_retries: parse_env("MAX_RETRIES", 3u32),
            retry_delay: Duration::from_millis(parse_env("RETRY_DELAY_MS", 1_000u64)),
            database_url: env::var("DATABASE_URL")
                .or_else(|_| env::var("POSTGRES_URL"))
                .ok(),
            port: parse_env("PORT", 8080u16),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(30),
            max_context_messages: 10,
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
            database_url: None,
            port: 8080,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_context_messages, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(1_000));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
