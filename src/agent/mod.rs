//! Conversation orchestration — one turn at a time
//!
//! ReceivedInput → Parsed → {Retrieved → Composed | NoIntentOrEmpty → Fallback}
//! → Persisted → Done
//!
//! Parsing, retrieval and narrative failures all degrade to a valid
//! response; only persistence failures abort a turn.

use crate::config::AppConfig;
use crate::fallback::FallbackConversationalist;
use crate::formatter;
use crate::llm::ChatModel;
use crate::models::{
    MessageRole, QueryExecutionLog, ReplySource, StructuredQuery, TurnReply,
};
use crate::narrative::{self, NarrativeComposer};
use crate::parser::IntentParser;
use crate::retrieval::RetrievalAdapter;
use crate::storage::Storage;
use crate::window::ContextWindow;
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session-scoped orchestrator over injected collaborators.
pub struct ConversationOrchestrator {
    storage: Arc<dyn Storage>,
    retrieval: RetrievalAdapter,
    parser: IntentParser,
    composer: NarrativeComposer,
    fallback: FallbackConversationalist,
    window: ContextWindow,
    /// Turns for one session serialize; distinct sessions run in parallel.
    session_locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        retrieval: RetrievalAdapter,
        model: Arc<dyn ChatModel>,
        config: &AppConfig,
    ) -> Self {
        Self {
            storage,
            retrieval,
            parser: IntentParser::new(model.clone()),
            composer: NarrativeComposer::new(model.clone(), config.max_retries, config.retry_delay),
            fallback: FallbackConversationalist::new(model),
            window: ContextWindow::new(config.max_context_messages),
            session_locks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn open_session(&self, existing: Option<Uuid>) -> Result<Uuid> {
        self.storage.get_or_create_session(existing).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Uuid>> {
        self.storage.list_sessions().await
    }

    /// Process one turn end to end and return the reply text. The user
    /// message, any structured query, its execution log, and the final
    /// assistant message are persisted in that order.
    pub async fn handle_turn(&self, session_id: Uuid, input: &str) -> Result<TurnReply> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        info!(session_id = ?session_id, "Turn started");

        // 1. Load history; model calls only ever see the bounded suffix.
        let history = self.storage.get_history(session_id).await?;
        let window = self.window.select(&history);

        // 2. Parse intent. Failures inside degrade to no intent.
        let draft = self.parser.parse(input, window).await;

        // 3. The user message goes in unconditionally, before any query
        //    execution, anchoring the parent reference.
        let user_message_id = self
            .storage
            .append_message(session_id, MessageRole::User, input, None)
            .await?;

        // 4. Structured path.
        let mut reply = None;
        if let Some(draft) = draft {
            let query = StructuredQuery {
                query_id: Uuid::new_v4(),
                session_id,
                message_id: user_message_id,
                kind: draft.kind,
                entity: draft.entity,
                field: draft.field,
                history_len: window.len(),
                created_at: Utc::now(),
            };
            let query_id = self.storage.create_structured_query(&query).await?;

            let started = Instant::now();
            let records = match self.retrieval.retrieve(query.kind, &query.entity).await {
                Ok(records) => records,
                Err(err) => {
                    warn!(query_id = ?query_id, "Retrieval degraded to empty: {}", err);
                    Vec::new()
                }
            };

            // The execution log is written whether or not anything came back.
            let log = QueryExecutionLog {
                query_id,
                raw_query: serde_json::json!({
                    "kind": query.kind.code(),
                    "entity": query.entity,
                    "field": query.field.code(),
                })
                .to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
                result_count: records.len(),
                created_at: Utc::now(),
            };
            self.storage.append_execution_log(&log).await?;

            if !records.is_empty() {
                let summary = formatter::format_summary(&records, query.field, &query.entity);

                let text = match self.composer.compose(&summary, input, window).await {
                    Ok(prose) => narrative::combine(&summary, &prose),
                    Err(err) => {
                        // The numeric answer is never withheld because the
                        // narrative step failed.
                        warn!(query_id = ?query_id, "Narrative degraded to summary alone: {}", err);
                        summary
                    }
                };

                reply = Some(TurnReply {
                    text,
                    source: ReplySource::Structured,
                    query_id: Some(query_id),
                });
            } else {
                debug!(query_id = ?query_id, "No records, falling back to open conversation");
            }
        }

        // 5. Fallback path: no intent, or retrieval found nothing.
        let reply = match reply {
            Some(reply) => reply,
            None => TurnReply {
                text: self.fallback.reply(window, input).await,
                source: ReplySource::Fallback,
                query_id: None,
            },
        };

        // 6. Persist the assistant message, linked to its user message.
        //    A failure here is fatal: the caller retries the turn or
        //    reports upstream, never fabricates a reply.
        self.storage
            .append_message(
                session_id,
                MessageRole::Assistant,
                &reply.text,
                Some(user_message_id),
            )
            .await?;

        info!(session_id = ?session_id, source = ?reply.source, "Turn complete");

        Ok(reply)
    }

    async fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        {
            let locks = self.session_locks.read().await;
            if let Some(lock) = locks.get(&session_id) {
                return lock.clone();
            }
        }

        let mut locks = self.session_locks.write().await;
        locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
