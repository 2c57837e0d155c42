use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::traits::EmbeddingTrait;

/// OpenAI embeddings client. Feeds the pgvector store on both the write path
/// (memory content) and the read path (search queries).
pub struct OpenAiEmbedder {
    api_key: String,
    client: Client,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            model,
        }
    }
}

#[async_trait]
impl EmbeddingTrait for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "input": text,
            "model": self.model,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .context("Failed to send embeddings request")?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Embeddings API error: {}", error_text));
        }

        let json: Value = resp
            .json()
            .await
            .context("Failed to parse embeddings response")?;

        let values = json["data"][0]["embedding"]
            .as_array()
            .context("Embeddings response missing data[0].embedding")?;

        Ok(values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect())
    }
}
