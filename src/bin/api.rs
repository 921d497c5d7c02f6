use sales_agent_orchestrator::{
    agent::ConversationOrchestrator,
    api::start_server,
    config::AppConfig,
    llm::OpenAiClient,
    retrieval::{InMemoryRecordSource, PgRecordSource, RecordSource, RetrievalAdapter},
    storage::{InMemoryStorage, PgStorage, Storage},
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();

    if config.api_key.is_empty() {
        eprintln!("⚠️  OPENAI_API_KEY not set in .env");
        eprintln!("📌 Chat requests will fail until it is configured");
    }

    info!("🚀 Sales Agent Orchestrator - API Server");
    info!("📍 Port: {}", config.port);

    let model = Arc::new(OpenAiClient::from_config(&config));

    // Postgres when configured, in-memory otherwise.
    let (storage, record_source): (Arc<dyn Storage>, Arc<dyn RecordSource>) =
        match config.database_url.as_deref() {
            Some(url) => {
                info!("Chat storage backend: postgres");
                (
                    Arc::new(PgStorage::connect_lazy(url)?),
                    Arc::new(PgRecordSource::connect_lazy(url)?),
                )
            }
            None => {
                warn!("DATABASE_URL not set, falling back to in-memory storage");
                (
                    Arc::new(InMemoryStorage::new()),
                    Arc::new(InMemoryRecordSource::new(Vec::new())),
                )
            }
        };

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        storage,
        RetrievalAdapter::new(record_source),
        model,
        &config,
    ));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
