//! Core data models for the sales agent

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn from_str_or_user(role: &str) -> Self {
        match role.to_lowercase().as_str() {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// Categorical code identifying the detected intent.
///
/// One kind is defined today; new kinds are added as variants and the
/// retrieval adapter maps each to its own lookup strategy. Codes it does
/// not recognize fall through to "no results" rather than an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    FinancialLookup,
}

impl QueryKind {
    pub fn code(&self) -> &'static str {
        match self {
            QueryKind::FinancialLookup => "financial_lookup",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "financial_lookup" => Some(QueryKind::FinancialLookup),
            _ => None,
        }
    }
}

/// The monetary field a structured query asks about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryField {
    #[default]
    GrossAmount,
    AmountReceived,
    AmountOutstanding,
}

impl QueryField {
    /// Storage column code, matching the sales_records schema.
    pub fn code(&self) -> &'static str {
        match self {
            QueryField::GrossAmount => "amount",
            QueryField::AmountReceived => "total_received",
            QueryField::AmountOutstanding => "remaining_amount",
        }
    }

    /// Human label shown in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            QueryField::GrossAmount => "总金额",
            QueryField::AmountReceived => "已收金额",
            QueryField::AmountOutstanding => "未收金额",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "amount" => Some(QueryField::GrossAmount),
            "total_received" => Some(QueryField::AmountReceived),
            "remaining_amount" => Some(QueryField::AmountOutstanding),
            _ => None,
        }
    }
}

//
// ================= Message =================
//

/// A single message in a session. Append-only; ordering within a session
/// follows `created_at` and is the only order ever shown to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Links an assistant reply to the user message that triggered it.
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: Uuid, role: MessageRole, content: String, parent_id: Option<Uuid>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            session_id,
            role,
            content,
            parent_id,
            created_at: Utc::now(),
        }
    }
}

//
// ================= Structured Query =================
//

/// A typed extraction of user intent, created at most once per user turn.
/// Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub query_id: Uuid,
    pub session_id: Uuid,
    /// The triggering user message.
    pub message_id: Uuid,
    pub kind: QueryKind,
    pub entity: String,
    pub field: QueryField,
    /// How many history messages were visible when this was parsed.
    pub history_len: usize,
    pub created_at: DateTime<Utc>,
}

/// Execution log written exactly once per executed structured query,
/// whether or not retrieval returned results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExecutionLog {
    pub query_id: Uuid,
    pub raw_query: String,
    pub duration_ms: u64,
    pub result_count: usize,
    pub created_at: DateTime<Utc>,
}

//
// ================= Sales Record =================
//

/// A financial entry from the external sales data source. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: i64,
    pub customer: String,
    pub entry_date: DateTime<Utc>,
    pub amount: Decimal,
    pub total_received: Option<Decimal>,
    pub remaining_amount: Option<Decimal>,
}

impl SalesRecord {
    /// Value of the requested field, with missing values read as zero.
    pub fn field_value(&self, field: QueryField) -> Decimal {
        match field {
            QueryField::GrossAmount => self.amount,
            QueryField::AmountReceived => self.total_received.unwrap_or(Decimal::ZERO),
            QueryField::AmountOutstanding => self.remaining_amount.unwrap_or(Decimal::ZERO),
        }
    }
}

//
// ================= Turn Reply =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Structured,
    Fallback,
}

/// What one conversation turn returns to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub text: String,
    pub source: ReplySource,
    pub query_id: Option<Uuid>,
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
