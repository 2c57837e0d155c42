//! Postgres + pgvector implementation of the memory store.
//!
//! Embeddings travel as their text representation (`[0.1,0.2,...]`) and are
//! cast to `vector` server-side, so no client-side pgvector type is needed.
//! Similarity ordering uses the cosine distance operator `<=>`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::traits::{ConversationRecord, EmbeddingTrait, MemoryRecord, MemoryStoreTrait, UserRecord};

pub struct PgMemoryStore {
    pool: PgPool,
    embedder: Arc<dyn EmbeddingTrait>,
}

impl PgMemoryStore {
    pub async fn connect(url: &str, embedder: Arc<dyn EmbeddingTrait>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self { pool, embedder })
    }
}

fn embedding_literal(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

#[async_trait]
impl MemoryStoreTrait for PgMemoryStore {
    async fn get_or_create_user(&self, phone_number: &str) -> Result<UserRecord> {
        let row = sqlx::query(
            "INSERT INTO users (id, phone_number)
             VALUES ($1, $2)
             ON CONFLICT (phone_number) DO UPDATE SET phone_number = EXCLUDED.phone_number
             RETURNING id, phone_number, display_name",
        )
        .bind(Uuid::new_v4())
        .bind(phone_number)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")?;

        Ok(UserRecord {
            id: row.try_get("id")?,
            phone_number: row.try_get("phone_number")?,
            display_name: row.try_get("display_name")?,
        })
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        channel: &str,
        model_used: Option<&str>,
    ) -> Result<ConversationRecord> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO conversations (id, user_id, channel, model_used)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(user_id)
        .bind(channel)
        .bind(model_used)
        .execute(&self.pool)
        .await
        .context("Failed to create conversation")?;

        info!(conversation_id = %id, channel, "Conversation created");
        Ok(ConversationRecord {
            id,
            user_id,
            channel: channel.to_string(),
        })
    }

    async fn add_message(&self, conversation_id: Uuid, role: &str, content: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .execute(&self.pool)
        .await
        .context("Failed to insert message")?;
        Ok(())
    }

    async fn end_conversation(&self, conversation_id: Uuid, summary: Option<&str>) -> Result<()> {
        sqlx::query(
            "UPDATE conversations SET ended_at = NOW(), summary = $2
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(summary)
        .execute(&self.pool)
        .await
        .context("Failed to end conversation")?;

        info!(%conversation_id, "Conversation ended");
        Ok(())
    }

    async fn store_memory(
        &self,
        user_id: Uuid,
        kind: &str,
        content: &str,
        source_channel: &str,
        source_conversation_id: Option<Uuid>,
        confidence: f64,
        supersedes_id: Option<Uuid>,
    ) -> Result<()> {
        let embedding = self
            .embedder
            .embed(content)
            .await
            .context("Failed to embed memory content")?;
        let memory_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO memories
             (id, user_id, type, content, embedding, confidence,
              source_channel, source_conversation_id, supersedes_id)
             VALUES ($1, $2, $3, $4, $5::vector, $6, $7, $8, $9)",
        )
        .bind(memory_id)
        .bind(user_id)
        .bind(kind)
        .bind(content)
        .bind(embedding_literal(&embedding))
        .bind(confidence)
        .bind(source_channel)
        .bind(source_conversation_id)
        .bind(supersedes_id)
        .execute(&self.pool)
        .await
        .context("Failed to store memory")?;

        info!(memory_id = %memory_id, kind, %user_id, "Memory stored");
        Ok(())
    }

    async fn semantic_search(
        &self,
        user_id: Uuid,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let embedding = self
            .embedder
            .embed(query_text)
            .await
            .context("Failed to embed search query")?;

        let rows = sqlx::query(
            "SELECT type, content, confidence
             FROM memories
             WHERE user_id = $1
               AND (expires_at IS NULL OR expires_at > NOW())
             ORDER BY embedding <=> $2::vector
             LIMIT $3",
        )
        .bind(user_id)
        .bind(embedding_literal(&embedding))
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search memories")?;

        let mut memories = Vec::with_capacity(rows.len());
        for row in rows {
            memories.push(MemoryRecord {
                kind: row.try_get("type")?,
                content: row.try_get("content")?,
                confidence: row.try_get("confidence")?,
            });
        }
        Ok(memories)
    }
}
