//! Post-call fact extraction. Runs detached from the call session: the
//! transcript goes to the LLM, extracted facts and a summary come back as
//! memory rows, and the conversation record gets the summary written back.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::transcript::TranscriptTurn;
use crate::traits::{ChatMessage, LlmTrait, MemoryStoreTrait};

const FACT_EXTRACTION_PROMPT: &str = "You are a memory extraction system. Analyze the following conversation and extract \
discrete facts about the user. Return a JSON array of objects, each with:\n\
- \"type\": one of \"fact\", \"preference\", \"action_item\"\n\
- \"content\": a concise statement of the fact (always from user's perspective, e.g. \"User's name is Alice\")\n\
- \"confidence\": float 0.0-1.0 indicating how certain this fact is\n\n\
Only extract facts explicitly stated or strongly implied by the user. Do not infer or speculate.\n\
Return ONLY the JSON array, no other text.";

const SUMMARY_PROMPT: &str = "Write a one-paragraph summary of this conversation. Focus on key topics discussed, \
decisions made, and any commitments. Be concise.";

const FACT_SYSTEM_PROMPT: &str =
    "You are a precise fact extraction system. Return only valid JSON.";
const SUMMARY_SYSTEM_PROMPT: &str = "You are a conversation summarizer.";

#[derive(Debug, Deserialize)]
pub struct ExtractedFact {
    #[serde(rename = "type", default = "default_fact_kind")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_fact_kind() -> String {
    "fact".to_string()
}

fn default_confidence() -> f64 {
    1.0
}

/// Render turns as the `role: content` transcript the prompts expect.
pub fn render_transcript(turns: &[TranscriptTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ask the LLM for facts. Anything that is not a JSON array parses to empty.
pub async fn extract_facts(
    llm: &dyn LlmTrait,
    transcript: &str,
) -> anyhow::Result<Vec<ExtractedFact>> {
    let prompt = format!("{FACT_EXTRACTION_PROMPT}\n\nConversation:\n{transcript}");
    let response = llm
        .chat(
            vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            FACT_SYSTEM_PROMPT,
        )
        .await?;

    let facts = match serde_json::from_str::<Vec<ExtractedFact>>(&response) {
        Ok(facts) => facts,
        Err(e) => {
            warn!(
                "Fact extraction returned unusable JSON ({}): {:.200}",
                e, response
            );
            Vec::new()
        }
    };
    Ok(facts)
}

pub async fn extract_summary(llm: &dyn LlmTrait, transcript: &str) -> anyhow::Result<String> {
    let prompt = format!("{SUMMARY_PROMPT}\n\nConversation:\n{transcript}");
    let response = llm
        .chat(
            vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            SUMMARY_SYSTEM_PROMPT,
        )
        .await?;
    Ok(response.trim().to_string())
}

/// Extract facts and a summary from a finished conversation and persist them.
pub async fn process_conversation(
    store: Arc<dyn MemoryStoreTrait>,
    llm: Arc<dyn LlmTrait>,
    conversation_id: Uuid,
    user_id: Uuid,
    channel: &str,
    turns: Vec<TranscriptTurn>,
) -> anyhow::Result<()> {
    if turns.is_empty() {
        return Ok(());
    }

    let transcript = render_transcript(&turns);

    let facts = extract_facts(llm.as_ref(), &transcript).await?;
    let summary = extract_summary(llm.as_ref(), &transcript).await?;

    let mut stored = 0usize;
    for fact in &facts {
        if fact.content.is_empty() {
            continue;
        }
        store
            .store_memory(
                user_id,
                &fact.kind,
                &fact.content,
                channel,
                Some(conversation_id),
                fact.confidence,
                None,
            )
            .await?;
        stored += 1;
    }

    if !summary.is_empty() {
        store
            .store_memory(
                user_id,
                "summary",
                &summary,
                channel,
                Some(conversation_id),
                1.0,
                None,
            )
            .await?;
    }

    store
        .end_conversation(
            conversation_id,
            if summary.is_empty() {
                None
            } else {
                Some(&summary)
            },
        )
        .await?;

    info!(
        %conversation_id,
        facts = stored,
        has_summary = !summary.is_empty(),
        "Conversation processed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::db::memory::InMemoryStore;
    use async_trait::async_trait;

    struct CannedLlm {
        fact_response: String,
        summary_response: String,
    }

    #[async_trait]
    impl LlmTrait for CannedLlm {
        async fn chat(
            &self,
            messages: Vec<ChatMessage>,
            system_prompt: &str,
        ) -> anyhow::Result<String> {
            assert_eq!(messages.len(), 1);
            if system_prompt.contains("fact extraction") {
                Ok(self.fact_response.clone())
            } else {
                Ok(self.summary_response.clone())
            }
        }
    }

    fn turn(role: &str, content: &str) -> TranscriptTurn {
        TranscriptTurn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_render_transcript() {
        let turns = vec![
            turn("user", "My name is Bob"),
            turn("assistant", "Nice to meet you, Bob."),
        ];
        assert_eq!(
            render_transcript(&turns),
            "user: My name is Bob\nassistant: Nice to meet you, Bob."
        );
    }

    #[tokio::test]
    async fn test_extract_facts_valid_json() {
        let llm = CannedLlm {
            fact_response: r#"[
                {"type": "fact", "content": "User's name is Bob", "confidence": 0.95},
                {"type": "preference", "content": "User likes coffee", "confidence": 0.8}
            ]"#
            .to_string(),
            summary_response: String::new(),
        };
        let facts = extract_facts(&llm, "user: My name is Bob and I like coffee")
            .await
            .unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].content, "User's name is Bob");
        assert_eq!(facts[1].kind, "preference");
    }

    #[tokio::test]
    async fn test_extract_facts_invalid_json() {
        let llm = CannedLlm {
            fact_response: "This is not JSON at all".to_string(),
            summary_response: String::new(),
        };
        let facts = extract_facts(&llm, "some transcript").await.unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn test_extract_facts_non_array() {
        let llm = CannedLlm {
            fact_response: r#"{"single": "object"}"#.to_string(),
            summary_response: String::new(),
        };
        let facts = extract_facts(&llm, "some transcript").await.unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn test_extract_summary_trims() {
        let llm = CannedLlm {
            fact_response: String::new(),
            summary_response: "  The user discussed travel plans to Japan.  ".to_string(),
        };
        let summary = extract_summary(&llm, "some transcript").await.unwrap();
        assert_eq!(summary, "The user discussed travel plans to Japan.");
    }

    #[tokio::test]
    async fn test_process_conversation_stores_memories() {
        let store = Arc::new(InMemoryStore::new());
        let llm = Arc::new(CannedLlm {
            fact_response: r#"[{"type": "fact", "content": "User's name is Bob", "confidence": 0.9},
                               {"type": "fact", "content": "", "confidence": 0.5}]"#
                .to_string(),
            summary_response: "Bob introduced himself.".to_string(),
        });

        let user = store.get_or_create_user("+14155550100").await.unwrap();
        let conv = store
            .create_conversation(user.id, "voice", None)
            .await
            .unwrap();

        process_conversation(
            store.clone(),
            llm,
            conv.id,
            user.id,
            "voice",
            vec![turn("assistant", "Hello Bob.")],
        )
        .await
        .unwrap();

        // One fact (the empty one skipped) plus the summary
        let memories = store.semantic_search(user.id, "anything", 10).await.unwrap();
        assert_eq!(memories.len(), 2);
        assert!(memories.iter().any(|m| m.kind == "summary"));
        assert!(memories
            .iter()
            .any(|m| m.kind == "fact" && m.content == "User's name is Bob"));
        assert_eq!(store.conversation_summary(conv.id), Some("Bob introduced himself.".to_string()));
    }

    #[tokio::test]
    async fn test_process_conversation_empty_transcript_is_noop() {
        let store = Arc::new(InMemoryStore::new());
        let llm = Arc::new(CannedLlm {
            fact_response: "[]".to_string(),
            summary_response: "should never be asked".to_string(),
        });
        let user = store.get_or_create_user("+14155550100").await.unwrap();
        let conv = store
            .create_conversation(user.id, "voice", None)
            .await
            .unwrap();

        process_conversation(store.clone(), llm, conv.id, user.id, "voice", Vec::new())
            .await
            .unwrap();

        let memories = store.semantic_search(user.id, "anything", 10).await.unwrap();
        assert!(memories.is_empty());
    }
}
