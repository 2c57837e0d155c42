use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "user" or "assistant"
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub phone_number: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel: String,
}

/// A user-scoped long-term memory as seen by the bridge (read side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(rename = "type")]
    pub kind: String, // "fact", "preference", "summary", "action_item"
    pub content: String,
    pub confidence: f64,
}

#[async_trait]
pub trait LlmTrait: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>, system_prompt: &str)
        -> anyhow::Result<String>;
}

#[async_trait]
pub trait EmbeddingTrait: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Vector-capable relational store for users, conversations, messages and memories.
#[async_trait]
pub trait MemoryStoreTrait: Send + Sync {
    /// Upsert a user keyed on phone number.
    async fn get_or_create_user(&self, phone_number: &str) -> anyhow::Result<UserRecord>;

    async fn create_conversation(
        &self,
        user_id: Uuid,
        channel: &str,
        model_used: Option<&str>,
    ) -> anyhow::Result<ConversationRecord>;

    async fn add_message(
        &self,
        conversation_id: Uuid,
        role: &str,
        content: &str,
    ) -> anyhow::Result<()>;

    /// Stamp the conversation as ended, writing back a summary when one exists.
    async fn end_conversation(
        &self,
        conversation_id: Uuid,
        summary: Option<&str>,
    ) -> anyhow::Result<()>;

    #[allow(clippy::too_many_arguments)]
    async fn store_memory(
        &self,
        user_id: Uuid,
        kind: &str,
        content: &str,
        source_channel: &str,
        source_conversation_id: Option<Uuid>,
        confidence: f64,
        supersedes_id: Option<Uuid>,
    ) -> anyhow::Result<()>;

    /// Top-k memories ranked by semantic similarity to the query text.
    async fn semantic_search(
        &self,
        user_id: Uuid,
        query_text: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<MemoryRecord>>;
}
