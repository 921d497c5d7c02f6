//! Chat persistence layer
//!
//! The orchestrator only sees this narrow contract. Any failure here is
//! fatal to the turn — callers surface it rather than fabricating a
//! reply.

use crate::error::AgentError;
use crate::models::{Message, MessageRole, QueryExecutionLog, StructuredQuery};
use crate::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod postgres;
pub use postgres::PgStorage;

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Reuse an existing session or create a fresh one.
    async fn get_or_create_session(&self, existing: Option<Uuid>) -> Result<Uuid>;

    /// Full ordered history of a session, oldest first.
    async fn get_history(&self, session_id: Uuid) -> Result<Vec<Message>>;

    /// Append one message and return its id.
    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Uuid>;

    /// Persist a structured query, returning its id.
    async fn create_structured_query(&self, query: &StructuredQuery) -> Result<Uuid>;

    /// Record one execution of a structured query.
    async fn append_execution_log(&self, log: &QueryExecutionLog) -> Result<()>;

    /// All known session ids, oldest first.
    async fn list_sessions(&self) -> Result<Vec<Uuid>>;
}

/// In-memory storage for development & testing
pub struct InMemoryStorage {
    sessions: RwLock<Vec<Uuid>>,
    messages: RwLock<HashMap<Uuid, Vec<Message>>>,
    queries: RwLock<HashMap<Uuid, StructuredQuery>>,
    logs: RwLock<Vec<QueryExecutionLog>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
            messages: RwLock::new(HashMap::new()),
            queries: RwLock::new(HashMap::new()),
            logs: RwLock::new(Vec::new()),
        }
    }

    /// Number of structured queries persisted (test visibility).
    pub async fn structured_query_count(&self) -> usize {
        self.queries.read().await.len()
    }

    pub async fn structured_query(&self, query_id: Uuid) -> Option<StructuredQuery> {
        self.queries.read().await.get(&query_id).cloned()
    }

    pub async fn execution_logs(&self) -> Vec<QueryExecutionLog> {
        self.logs.read().await.clone()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Storage for InMemoryStorage {
    async fn get_or_create_session(&self, existing: Option<Uuid>) -> Result<Uuid> {
        let mut sessions = self.sessions.write().await;

        if let Some(id) = existing {
            if !sessions.contains(&id) {
                sessions.push(id);
            }
            return Ok(id);
        }

        let id = Uuid::new_v4();
        sessions.push(id);
        Ok(id)
    }

    async fn get_history(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut history = messages.get(&session_id).cloned().unwrap_or_default();
        history.sort_by_key(|m| m.created_at);
        Ok(history)
    }

    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let message = Message::new(session_id, role, content.to_string(), parent_id);
        let message_id = message.message_id;

        let mut messages = self.messages.write().await;
        messages.entry(session_id).or_insert_with(Vec::new).push(message);

        Ok(message_id)
    }

    async fn create_structured_query(&self, query: &StructuredQuery) -> Result<Uuid> {
        let mut queries = self.queries.write().await;
        if queries.contains_key(&query.query_id) {
            return Err(AgentError::Storage(format!(
                "Structured query {} already exists",
                query.query_id
            )));
        }
        queries.insert(query.query_id, query.clone());
        Ok(query.query_id)
    }

    async fn append_execution_log(&self, log: &QueryExecutionLog) -> Result<()> {
        self.logs.write().await.push(log.clone());
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Uuid>> {
        Ok(self.sessions.read().await.clone())
    }
}
