//! Intent parsing
//!
//! Turns (user text, windowed history) into a structured query draft or
//! "no structured intent". One JSON-mode request per turn; the reply is
//! validated field by field and anything that fails validation degrades
//! to no intent. Read-only against the model; never touches storage.

use crate::llm::{ChatMessage, ChatModel};
use crate::models::{Message, QueryField, QueryKind};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A validated query candidate, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDraft {
    pub kind: QueryKind,
    pub entity: String,
    pub field: QueryField,
}

/// Untrusted reply shape from the model.
#[derive(Debug, Deserialize)]
struct RawIntent {
    kind: String,
    #[serde(default)]
    entity: Option<String>,
    #[serde(default)]
    field: Option<String>,
}

pub struct IntentParser {
    model: Arc<dyn ChatModel>,
}

impl IntentParser {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify and extract in a single request. `None` means no
    /// structured intent; parse failures land there too.
    pub async fn parse(&self, input: &str, window: &[Message]) -> Option<QueryDraft> {
        let system = build_system_prompt(window);
        let messages = [ChatMessage::system(system), ChatMessage::user(input)];

        let reply = match self.model.complete(&messages, true).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Intent parsing failed, treating as no intent: {}", err);
                return None;
            }
        };

        match validate_reply(&reply) {
            Some(draft) => {
                debug!(kind = %draft.kind, entity = %draft.entity, "Structured intent detected");
                Some(draft)
            }
            None => {
                debug!("No structured intent in reply");
                None
            }
        }
    }
}

fn build_system_prompt(window: &[Message]) -> String {
    let history_context = window
        .iter()
        .map(|msg| format!("{}: {}", msg.role.as_str(), msg.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"你是一个销售数据查询意图解析器。判断用户输入是否为销售数据查询，并只输出一个 JSON 对象。

支持的查询类型:
- financial_lookup: 按客户名称查询销售记录。参数: entity (客户名称), field (查询字段)。

查询字段:
- amount: 总金额 / 款项
- total_received: 已收金额
- remaining_amount: 未收金额

规则:
- 查询输出: {{"kind": "financial_lookup", "entity": "<客户名称>", "field": "<查询字段>"}}
- 非查询输出: {{"kind": "none"}}
- 用户省略客户名称时，沿用历史对话中最近一次查询的客户。
- 无法确定客户，或同时涉及多个客户时，输出 {{"kind": "none"}}。

历史对话上下文:
{}

示例：
用户: 客户北京极客邦有限公司的款项到账了多少？
系统: {{"kind": "financial_lookup", "entity": "北京极客邦有限公司", "field": "amount"}}

用户: 已收了多少？
系统: {{"kind": "financial_lookup", "entity": "北京极客邦有限公司", "field": "total_received"}}

用户: 还剩多少未收款？
系统: {{"kind": "financial_lookup", "entity": "北京极客邦有限公司", "field": "remaining_amount"}}

示例2：
用户: 你好
系统: {{"kind": "none"}}

示例3：
用户: 最近一年你过得如何？
系统: {{"kind": "none"}}"#,
        history_context
    )
}

/// Strict validation of the model reply. Any structural surprise is
/// "no intent" rather than trusting partial structure.
fn validate_reply(reply: &str) -> Option<QueryDraft> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: RawIntent = match serde_json::from_str(cleaned) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("Malformed intent reply, treating as no intent: {}", err);
            return None;
        }
    };

    if raw.kind == "none" {
        return None;
    }

    let kind = QueryKind::from_code(&raw.kind)?;

    let entity = raw.entity.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())?;

    let field = match raw.field.as_deref() {
        None | Some("") => QueryField::default(),
        Some(code) => QueryField::from_code(code)?,
    };

    Some(QueryDraft { kind, entity, field })
}
