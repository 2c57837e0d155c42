use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::traits::{ChatMessage, LlmTrait};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeLlm {
    api_key: String,
    client: Client,
    model: String,
}

impl ClaudeLlm {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            model,
        }
    }
}

#[async_trait]
impl LlmTrait for ClaudeLlm {
    async fn chat(&self, messages: Vec<ChatMessage>, system_prompt: &str) -> Result<String> {
        // The system prompt rides in its own field; system-role messages are dropped.
        let request_messages: Vec<Value> = messages
            .into_iter()
            .filter(|msg| msg.role != "system")
            .map(|msg| {
                json!({
                    "role": msg.role,
                    "content": msg.content
                })
            })
            .collect();

        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system_prompt,
            "messages": request_messages,
        });

        info!("Sending request to Claude model: {}", self.model);

        let resp = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .context("Failed to send request to Anthropic")?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Anthropic API error: {}", error_text));
        }

        let json: Value = resp
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        let content = json["content"][0]["text"].as_str().unwrap_or("").to_string();

        Ok(content)
    }
}
