//! Sales Agent Orchestrator
//!
//! A conversational front-end for sales and receivables records that:
//! - Parses free-form questions into structured queries via an LLM
//! - Retrieves matching records deterministically (exact, then fuzzy)
//! - Renders numeric summaries without any model involvement
//! - Adds model-generated narrative grounded in those summaries
//! - Falls back to open streamed conversation when no intent is found
//!
//! TURN PIPELINE:
//! INPUT → PARSE → {RETRIEVE → FORMAT + NARRATE | FALLBACK} → PERSIST

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod fallback;
pub mod formatter;
pub mod llm;
pub mod models;
pub mod narrative;
pub mod parser;
pub mod retrieval;
pub mod storage;
pub mod window;

pub use error::Result;

// Re-export common types
pub use agent::ConversationOrchestrator;
pub use models::*;
