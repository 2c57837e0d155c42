use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::traits::{ChatMessage, LlmTrait};

pub struct OpenAiLlm {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
}

impl OpenAiLlm {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let clean_base = base.trim_end_matches('/').to_string();

        Self {
            api_key,
            client: Client::new(),
            model,
            base_url: clean_base,
        }
    }
}

#[async_trait]
impl LlmTrait for OpenAiLlm {
    async fn chat(&self, messages: Vec<ChatMessage>, system_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut request_messages = Vec::new();
        if !system_prompt.is_empty() {
            request_messages.push(json!({
                "role": "system",
                "content": system_prompt
            }));
        }
        for msg in messages {
            request_messages.push(json!({
                "role": msg.role,
                "content": msg.content
            }));
        }

        let body = json!({
            "model": self.model,
            "messages": request_messages,
            "max_tokens": 1024,
        });

        info!("Sending request to OpenAI model: {}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .context("Failed to send request to OpenAI")?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OpenAI API error: {}", error_text));
        }

        let json: Value = resp
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(content)
    }
}
