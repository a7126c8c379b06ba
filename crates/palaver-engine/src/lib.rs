//! Palaver Engine
//!
//! Drives batches of conversations through deterministic feature extraction,
//! a content-addressed result cache, and a bounded LLM fan-out.
//!
//! # Architecture
//!
//! ```text
//! Conversations → ProcessorChain → digest → ResultCache ──hit──→ ResultSet
//!                                              │
//!                                            miss
//!                                              ↓
//!                                 PromptRenderer → LlmInvoker → validate → store
//! ```
//!
//! # Key Properties
//!
//! - **Idempotent**: rerunning an unchanged batch makes zero LLM calls
//! - **Isolated**: one conversation's failure never aborts the batch
//! - **Ordered**: results come back in input order, not completion order
//! - **Bounded**: at most `max_concurrency` LLM calls are in flight
//!
//! # Example Usage
//!
//! ```no_run
//! use palaver_cache::SqliteCache;
//! use palaver_domain::{Conversation, ExpectedKey, Message, ProcessorSpec, RecipeSpec, SenderRole};
//! use palaver_engine::{EngineConfig, Orchestrator, RunOptions};
//! use palaver_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(MockProvider::new(r#"{"summary": "ok"}"#));
//! let cache = Arc::new(SqliteCache::open("palaver.db")?);
//! let orchestrator = Orchestrator::new(provider, cache, EngineConfig::default());
//!
//! let recipe = RecipeSpec {
//!     name: "support-triage".to_string(),
//!     version: "1.0.0".to_string(),
//!     processors: vec![ProcessorSpec::bare("temporal")],
//!     prompt_template: "Summarize:\n{transcript}\nRespond with JSON.".to_string(),
//!     expected_keys: vec![ExpectedKey::text("summary")],
//!     output_columns: vec!["identifier".to_string(), "summary".to_string()],
//!     skip_no_user_messages: true,
//!     reduced_temporal_detail: false,
//! };
//!
//! let conversations = vec![Conversation::new(
//!     "+15550001",
//!     vec![Message::new(chrono::Utc::now(), SenderRole::User, "hello")],
//! )];
//!
//! let results = orchestrator
//!     .run(conversations, &recipe, RunOptions::default())
//!     .await?;
//! println!("analyzed {} conversations", results.analyzed.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod orchestrator;
mod prompt;
mod response;


pub use config::EngineConfig;
pub use error::EngineError;
pub use orchestrator::{Orchestrator, RunOptions};
pub use prompt::PromptRenderer;
pub use response::{parse_response, ResponseError};
