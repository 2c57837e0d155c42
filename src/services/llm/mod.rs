pub mod claude;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::traits::{ChatMessage, LlmTrait};

/// Tries the primary provider and falls back to the secondary once on error.
/// Provider selection stays invisible to callers.
pub struct FailoverLlm {
    primary: Arc<dyn LlmTrait>,
    fallback: Arc<dyn LlmTrait>,
}

impl FailoverLlm {
    pub fn new(primary: Arc<dyn LlmTrait>, fallback: Arc<dyn LlmTrait>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl LlmTrait for FailoverLlm {
    async fn chat(&self, messages: Vec<ChatMessage>, system_prompt: &str) -> anyhow::Result<String> {
        match self.primary.chat(messages.clone(), system_prompt).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!("Primary LLM failed, retrying on fallback: {e:#}");
                self.fallback.chat(messages, system_prompt).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLlm {
        response: anyhow::Result<String>,
    }

    impl FixedLlm {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.to_string()),
            })
        }

        fn err(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(anyhow::anyhow!(text.to_string())),
            })
        }
    }

    #[async_trait]
    impl LlmTrait for FixedLlm {
        async fn chat(
            &self,
            _messages: Vec<ChatMessage>,
            _system_prompt: &str,
        ) -> anyhow::Result<String> {
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_primary_wins_when_healthy() {
        let llm = FailoverLlm::new(FixedLlm::ok("primary"), FixedLlm::ok("fallback"));
        let out = llm.chat(Vec::new(), "").await.unwrap();
        assert_eq!(out, "primary");
    }

    #[tokio::test]
    async fn test_fallback_on_primary_error() {
        let llm = FailoverLlm::new(FixedLlm::err("boom"), FixedLlm::ok("fallback"));
        let out = llm.chat(Vec::new(), "").await.unwrap();
        assert_eq!(out, "fallback");
    }

    #[tokio::test]
    async fn test_both_failing_surfaces_error() {
        let llm = FailoverLlm::new(FixedLlm::err("boom"), FixedLlm::err("bust"));
        assert!(llm.chat(Vec::new(), "").await.is_err());
    }
}
