//! Postgres-backed sales record source

use crate::error::AgentError;
use crate::models::SalesRecord;
use crate::retrieval::RecordSource;
use crate::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

const SELECT_COLUMNS: &str =
    "SELECT id, customer, entry_date, amount, total_received, remaining_amount FROM sales_records";

pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| AgentError::Retrieval(format!("Failed to connect record source: {}", e)))?;
        Ok(Self::new(pool))
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<SalesRecord> {
        Ok(SalesRecord {
            id: row
                .try_get("id")
                .map_err(|e| AgentError::Retrieval(format!("Bad id column: {}", e)))?,
            customer: row
                .try_get("customer")
                .map_err(|e| AgentError::Retrieval(format!("Bad customer column: {}", e)))?,
            entry_date: row
                .try_get("entry_date")
                .map_err(|e| AgentError::Retrieval(format!("Bad entry_date column: {}", e)))?,
            amount: row
                .try_get("amount")
                .map_err(|e| AgentError::Retrieval(format!("Bad amount column: {}", e)))?,
            total_received: row.try_get("total_received").unwrap_or(None),
            remaining_amount: row.try_get("remaining_amount").unwrap_or(None),
        })
    }

    async fn run_lookup(&self, sql: &str, param: String) -> Result<Vec<SalesRecord>> {
        let rows = sqlx::query(sql)
            .bind(param)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AgentError::Retrieval(format!("Sales record lookup failed: {}", e)))?;

        rows.iter().map(Self::row_to_record).collect()
    }
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn lookup_exact(&self, entity: &str) -> Result<Vec<SalesRecord>> {
        let sql = format!(
            "{} WHERE customer = $1 ORDER BY entry_date DESC, id DESC",
            SELECT_COLUMNS
        );
        self.run_lookup(&sql, entity.to_string()).await
    }

    async fn lookup_fuzzy(&self, entity: &str) -> Result<Vec<SalesRecord>> {
        let sql = format!(
            "{} WHERE customer LIKE $1 ORDER BY entry_date DESC, id DESC",
            SELECT_COLUMNS
        );
        self.run_lookup(&sql, format!("%{}%", entity)).await
    }
}
