//! Postgres-backed chat storage
//!
//! Schema is bootstrapped lazily on first use so a fresh database works
//! without a migration step.

use crate::error::AgentError;
use crate::models::{Message, MessageRole, QueryExecutionLog, StructuredQuery};
use crate::storage::Storage;
use crate::Result;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

pub struct PgStorage {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| AgentError::Storage(format!("Failed to connect chat storage: {}", e)))?;
        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS chat_sessions (
                      session_id UUID PRIMARY KEY,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS chat_messages (
                      message_id UUID PRIMARY KEY,
                      session_id UUID NOT NULL,
                      role TEXT NOT NULL,
                      content TEXT NOT NULL,
                      parent_message_id UUID,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_chat_messages_session_time
                    ON chat_messages (session_id, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS structured_queries (
                      query_id UUID PRIMARY KEY,
                      session_id UUID NOT NULL,
                      message_id UUID NOT NULL,
                      query_kind TEXT NOT NULL,
                      query_params JSONB NOT NULL,
                      context_info JSONB NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS query_logs (
                      query_id UUID NOT NULL,
                      raw_query TEXT NOT NULL,
                      execution_time_ms BIGINT NOT NULL,
                      result_count INTEGER NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::Storage(format!("Failed to initialize chat storage schema: {}", e))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for PgStorage {
    async fn get_or_create_session(&self, existing: Option<Uuid>) -> Result<Uuid> {
        self.ensure_schema().await?;

        let id = existing.unwrap_or_else(Uuid::new_v4);
        sqlx::query(
            "INSERT INTO chat_sessions (session_id) VALUES ($1) ON CONFLICT (session_id) DO NOTHING",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to create session: {}", e)))?;

        Ok(id)
    }

    async fn get_history(&self, session_id: Uuid) -> Result<Vec<Message>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT message_id, session_id, role, content, parent_message_id, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to load history: {}", e)))?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let db_role: String = row
                .try_get("role")
                .map_err(|e| AgentError::Storage(format!("Bad role column: {}", e)))?;

            history.push(Message {
                message_id: row
                    .try_get("message_id")
                    .map_err(|e| AgentError::Storage(format!("Bad message_id column: {}", e)))?,
                session_id,
                role: MessageRole::from_str_or_user(&db_role),
                content: row
                    .try_get("content")
                    .map_err(|e| AgentError::Storage(format!("Bad content column: {}", e)))?,
                parent_id: row.try_get("parent_message_id").unwrap_or(None),
                created_at: row
                    .try_get("created_at")
                    .map_err(|e| AgentError::Storage(format!("Bad created_at column: {}", e)))?,
            });
        }

        Ok(history)
    }

    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Uuid> {
        self.ensure_schema().await?;

        let message_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO chat_messages (message_id, session_id, role, content, parent_message_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message_id)
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(parent_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to append message: {}", e)))?;

        Ok(message_id)
    }

    async fn create_structured_query(&self, query: &StructuredQuery) -> Result<Uuid> {
        self.ensure_schema().await?;

        let params = serde_json::json!({
            "entity": query.entity,
            "field": query.field.code(),
        });
        let context = serde_json::json!({
            "history_length": query.history_len,
        });

        sqlx::query(
            r#"
            INSERT INTO structured_queries
              (query_id, session_id, message_id, query_kind, query_params, context_info, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(query.query_id)
        .bind(query.session_id)
        .bind(query.message_id)
        .bind(query.kind.code())
        .bind(params)
        .bind(context)
        .bind(query.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to persist structured query: {}", e)))?;

        Ok(query.query_id)
    }

    async fn append_execution_log(&self, log: &QueryExecutionLog) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO query_logs (query_id, raw_query, execution_time_ms, result_count, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(log.query_id)
        .bind(&log.raw_query)
        .bind(log.duration_ms as i64)
        .bind(log.result_count as i32)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to append execution log: {}", e)))?;

        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Uuid>> {
        self.ensure_schema().await?;

        let rows = sqlx::query("SELECT session_id FROM chat_sessions ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AgentError::Storage(format!("Failed to list sessions: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get("session_id")
                    .map_err(|e| AgentError::Storage(format!("Bad session_id column: {}", e)))
            })
            .collect()
    }
}
