//! Record retrieval
//!
//! Maps a structured query to records from the external sales data
//! source. Exact match on the entity name first; a substring match is
//! tried only when the exact lookup comes back empty. Each query kind
//! has its own lookup strategy.

use crate::models::{QueryKind, SalesRecord};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub mod postgres;
pub use postgres::PgRecordSource;

/// Narrow contract over the external sales data source.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn lookup_exact(&self, entity: &str) -> Result<Vec<SalesRecord>>;
    async fn lookup_fuzzy(&self, entity: &str) -> Result<Vec<SalesRecord>>;
}

pub struct RetrievalAdapter {
    source: Arc<dyn RecordSource>,
}

impl RetrievalAdapter {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }

    /// Retrieve records for a query, newest first. Empty is a valid
    /// outcome; transport failures surface as errors for the caller to
    /// degrade.
    pub async fn retrieve(&self, kind: QueryKind, entity: &str) -> Result<Vec<SalesRecord>> {
        let mut records = match kind {
            QueryKind::FinancialLookup => self.financial_lookup(entity).await?,
        };

        // Newest first, ids break date ties so ordering is stable.
        records.sort_by(|a, b| {
            b.entry_date
                .cmp(&a.entry_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(records)
    }

    async fn financial_lookup(&self, entity: &str) -> Result<Vec<SalesRecord>> {
        let exact = self.source.lookup_exact(entity).await?;
        if !exact.is_empty() {
            debug!(entity, count = exact.len(), "Exact match");
            return Ok(exact);
        }

        let fuzzy = self.source.lookup_fuzzy(entity).await?;
        debug!(entity, count = fuzzy.len(), "Fuzzy fallback");
        Ok(fuzzy)
    }
}

//
// ================= In-memory source =================
//

/// In-memory record source for development & testing.
/// Counts lookups so the exact-before-fuzzy policy is checkable.
pub struct InMemoryRecordSource {
    records: Vec<SalesRecord>,
    exact_calls: AtomicUsize,
    fuzzy_calls: AtomicUsize,
}

impl InMemoryRecordSource {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        Self {
            records,
            exact_calls: AtomicUsize::new(0),
            fuzzy_calls: AtomicUsize::new(0),
        }
    }

    pub fn exact_calls(&self) -> usize {
        self.exact_calls.load(Ordering::SeqCst)
    }

    pub fn fuzzy_calls(&self) -> usize {
        self.fuzzy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn lookup_exact(&self, entity: &str) -> Result<Vec<SalesRecord>> {
        self.exact_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .filter(|r| r.customer == entity)
            .cloned()
            .collect())
    }

    async fn lookup_fuzzy(&self, entity: &str) -> Result<Vec<SalesRecord>> {
        self.fuzzy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .filter(|r| r.customer.contains(entity))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn record(id: i64, customer: &str, day: u32) -> SalesRecord {
        SalesRecord {
            id,
            customer: customer.to_string(),
            entry_date: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            amount: Decimal::new(10_000, 2),
            total_received: None,
            remaining_amount: None,
        }
    }

    #[tokio::test]
    async fn exact_hit_skips_fuzzy_entirely() {
        let source = Arc::new(InMemoryRecordSource::new(vec![
            record(1, "北京极客邦有限公司", 1),
            record(2, "北京极客邦有限公司", 2),
        ]));
        let adapter = RetrievalAdapter::new(source.clone());

        let records = adapter
            .retrieve(QueryKind::FinancialLookup, "北京极客邦有限公司")
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(source.exact_calls(), 1);
        assert_eq!(source.fuzzy_calls(), 0);
    }

    #[tokio::test]
    async fn empty_exact_falls_back_to_fuzzy_once() {
        let source = Arc::new(InMemoryRecordSource::new(vec![record(
            1,
            "北京极客邦有限公司",
            1,
        )]));
        let adapter = RetrievalAdapter::new(source.clone());

        let records = adapter
            .retrieve(QueryKind::FinancialLookup, "极客邦")
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(source.exact_calls(), 1);
        assert_eq!(source.fuzzy_calls(), 1);
    }

    #[tokio::test]
    async fn nothing_found_is_an_empty_sequence_not_an_error() {
        let source = Arc::new(InMemoryRecordSource::new(vec![]));
        let adapter = RetrievalAdapter::new(source);

        let records = adapter
            .retrieve(QueryKind::FinancialLookup, "不存在的客户")
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn results_come_back_newest_first_with_stable_ties() {
        let source = Arc::new(InMemoryRecordSource::new(vec![
            record(1, "客户A", 1),
            record(3, "客户A", 5),
            record(2, "客户A", 5),
        ]));
        let adapter = RetrievalAdapter::new(source);

        let records = adapter.retrieve(QueryKind::FinancialLookup, "客户A").await.unwrap();

        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        async fn lookup_exact(&self, _entity: &str) -> Result<Vec<SalesRecord>> {
            Err(AgentError::Retrieval("connection refused".to_string()))
        }

        async fn lookup_fuzzy(&self, _entity: &str) -> Result<Vec<SalesRecord>> {
            Err(AgentError::Retrieval("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_retrieval_error() {
        let adapter = RetrievalAdapter::new(Arc::new(FailingSource));

        let result = adapter.retrieve(QueryKind::FinancialLookup, "客户A").await;

        assert!(matches!(result, Err(AgentError::Retrieval(_))));
    }
}
