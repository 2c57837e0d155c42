use crate::config::GatewayConfig;
use crate::services::{
    db::{memory::InMemoryStore, postgres::PgMemoryStore},
    embedding::OpenAiEmbedder,
    llm::{claude::ClaudeLlm, openai::OpenAiLlm, FailoverLlm},
};
use crate::traits::{EmbeddingTrait, LlmTrait, MemoryStoreTrait};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<dyn MemoryStoreTrait>,
    pub llm: Arc<dyn LlmTrait>,
}

impl AppState {
    pub async fn new(config: GatewayConfig) -> Self {
        let embedder: Arc<dyn EmbeddingTrait> = Arc::new(OpenAiEmbedder::new(
            config.llm.openai_api_key.clone(),
            config.embedding.model.clone(),
        ));

        let store: Arc<dyn MemoryStoreTrait> = match config.db.backend.as_str() {
            "postgres" => {
                info!("Connecting to Postgres at {}", config.db.url);
                match PgMemoryStore::connect(&config.db.url, embedder.clone()).await {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        panic!("Failed to connect to Postgres: {e:#}");
                    }
                }
            }
            backend => {
                if backend != "memory" {
                    warn!("Unknown db backend '{}', using in-memory store", backend);
                }
                Arc::new(InMemoryStore::new())
            }
        };

        let claude: Arc<dyn LlmTrait> = Arc::new(ClaudeLlm::new(
            config.llm.anthropic_api_key.clone(),
            config.llm.claude_model.clone(),
        ));
        let openai: Arc<dyn LlmTrait> = Arc::new(OpenAiLlm::new(
            config.llm.openai_api_key.clone(),
            config.llm.openai_model.clone(),
            None,
        ));

        let llm: Arc<dyn LlmTrait> = match config.llm.provider.as_str() {
            "claude" => Arc::new(FailoverLlm::new(claude, openai)),
            "openai" => Arc::new(FailoverLlm::new(openai, claude)),
            provider => {
                panic!("Unknown LLM provider: {}", provider);
            }
        };

        Self {
            config: Arc::new(config),
            store,
            llm,
        }
    }
}
