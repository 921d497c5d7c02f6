use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use sales_agent_orchestrator::{
    agent::ConversationOrchestrator,
    config::AppConfig,
    llm::{MockChatModel, ScriptedReply},
    models::SalesRecord,
    retrieval::{InMemoryRecordSource, RetrievalAdapter},
    storage::InMemoryStorage,
};
use std::sync::Arc;
use tracing::info;

/// Scripted end-to-end demo: one structured turn and one chit-chat turn
/// against in-memory collaborators, no network required.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Sales Agent Orchestrator demo starting");

    let records = vec![
        SalesRecord {
            id: 1,
            customer: "北京极客邦有限公司".to_string(),
            entry_date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            amount: Decimal::new(10_000, 2),
            total_received: Some(Decimal::new(10_000, 2)),
            remaining_amount: Some(Decimal::ZERO),
        },
        SalesRecord {
            id: 2,
            customer: "北京极客邦有限公司".to_string(),
            entry_date: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
            amount: Decimal::new(25_050, 2),
            total_received: None,
            remaining_amount: Some(Decimal::new(25_050, 2)),
        },
    ];

    let model = Arc::new(MockChatModel::new(vec![
        ScriptedReply::Text(
            r#"{"kind": "financial_lookup", "entity": "北京极客邦有限公司", "field": "amount"}"#
                .to_string(),
        ),
        ScriptedReply::Text("该客户近期共两笔款项，其中一笔已全额到账。".to_string()),
        ScriptedReply::Text(r#"{"kind": "none"}"#.to_string()),
        ScriptedReply::Text("不客气，随时为您服务！".to_string()),
    ]));

    let storage = Arc::new(InMemoryStorage::new());
    let retrieval = RetrievalAdapter::new(Arc::new(InMemoryRecordSource::new(records)));
    let orchestrator =
        ConversationOrchestrator::new(storage, retrieval, model, &AppConfig::default());

    let session_id = orchestrator.open_session(None).await?;

    let turns = [
        "客户北京极客邦有限公司的款项到账了多少？",
        "谢谢",
    ];

    for input in turns {
        info!(session_id = ?session_id, input, "Running turn");
        let reply = orchestrator.handle_turn(session_id, input).await?;

        println!("\n=== 用户 ===\n{}", input);
        println!("=== 助手 ({:?}) ===\n{}", reply.source, reply.text);
    }

    Ok(())
}
