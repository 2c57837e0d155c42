use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::traits::{ConversationRecord, MemoryRecord, MemoryStoreTrait, UserRecord};

// Row mirrors; the extra fields are only observed through the test hooks.
#[derive(Debug, Clone)]
#[allow(dead_code)]
struct StoredConversation {
    user_id: Uuid,
    channel: String,
    summary: Option<String>,
    ended: bool,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
struct StoredMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone)]
struct StoredMemory {
    kind: String,
    content: String,
    confidence: f64,
}

/// Development and test backend. No embeddings: `semantic_search` returns the
/// most recent k memories for the user.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    conversations: RwLock<HashMap<Uuid, StoredConversation>>,
    messages: RwLock<HashMap<Uuid, Vec<StoredMessage>>>,
    memories: RwLock<Vec<(Uuid, StoredMemory)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: messages persisted for a conversation as (role, content).
    #[cfg(test)]
    pub fn conversation_messages(&self, conversation_id: Uuid) -> Vec<(String, String)> {
        self.messages
            .read()
            .unwrap()
            .get(&conversation_id)
            .map(|msgs| {
                msgs.iter()
                    .map(|m| (m.role.clone(), m.content.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Test hook: summary written back by `end_conversation`.
    #[cfg(test)]
    pub fn conversation_summary(&self, conversation_id: Uuid) -> Option<String> {
        self.conversations
            .read()
            .unwrap()
            .get(&conversation_id)
            .and_then(|c| c.summary.clone())
    }

    /// Test hook: (user_id, channel, ended) for a conversation.
    #[cfg(test)]
    pub fn conversation_state(&self, conversation_id: Uuid) -> Option<(Uuid, String, bool)> {
        self.conversations
            .read()
            .unwrap()
            .get(&conversation_id)
            .map(|c| (c.user_id, c.channel.clone(), c.ended))
    }
}

#[async_trait]
impl MemoryStoreTrait for InMemoryStore {
    async fn get_or_create_user(&self, phone_number: &str) -> anyhow::Result<UserRecord> {
        let mut users = self.users.write().unwrap();
        let user = users
            .entry(phone_number.to_string())
            .or_insert_with(|| UserRecord {
                id: Uuid::new_v4(),
                phone_number: phone_number.to_string(),
                display_name: None,
            });
        Ok(user.clone())
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        channel: &str,
        _model_used: Option<&str>,
    ) -> anyhow::Result<ConversationRecord> {
        let id = Uuid::new_v4();
        self.conversations.write().unwrap().insert(
            id,
            StoredConversation {
                user_id,
                channel: channel.to_string(),
                summary: None,
                ended: false,
            },
        );
        Ok(ConversationRecord {
            id,
            user_id,
            channel: channel.to_string(),
        })
    }

    async fn add_message(
        &self,
        conversation_id: Uuid,
        role: &str,
        content: &str,
    ) -> anyhow::Result<()> {
        self.messages
            .write()
            .unwrap()
            .entry(conversation_id)
            .or_default()
            .push(StoredMessage {
                role: role.to_string(),
                content: content.to_string(),
            });
        Ok(())
    }

    async fn end_conversation(
        &self,
        conversation_id: Uuid,
        summary: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Some(conversation) = self.conversations.write().unwrap().get_mut(&conversation_id) {
            conversation.ended = true;
            conversation.summary = summary.map(str::to_string);
        }
        Ok(())
    }

    async fn store_memory(
        &self,
        user_id: Uuid,
        kind: &str,
        content: &str,
        _source_channel: &str,
        _source_conversation_id: Option<Uuid>,
        confidence: f64,
        _supersedes_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        self.memories.write().unwrap().push((
            user_id,
            StoredMemory {
                kind: kind.to_string(),
                content: content.to_string(),
                confidence,
            },
        ));
        Ok(())
    }

    async fn semantic_search(
        &self,
        user_id: Uuid,
        _query_text: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<MemoryRecord>> {
        let memories = self.memories.read().unwrap();
        Ok(memories
            .iter()
            .rev()
            .filter(|(owner, _)| *owner == user_id)
            .take(top_k)
            .map(|(_, m)| MemoryRecord {
                kind: m.kind.clone(),
                content: m.content.clone(),
                confidence: m.confidence,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_upsert_is_stable() {
        let store = InMemoryStore::new();
        let first = store.get_or_create_user("+14155550100").await.unwrap();
        let second = store.get_or_create_user("+14155550100").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let store = InMemoryStore::new();
        let user = store.get_or_create_user("+14155550100").await.unwrap();
        let conv = store
            .create_conversation(user.id, "voice", None)
            .await
            .unwrap();
        store
            .add_message(conv.id, "assistant", "Hello.")
            .await
            .unwrap();
        store
            .end_conversation(conv.id, Some("Short greeting."))
            .await
            .unwrap();

        assert_eq!(
            store.conversation_messages(conv.id),
            vec![("assistant".to_string(), "Hello.".to_string())]
        );
        assert_eq!(
            store.conversation_summary(conv.id),
            Some("Short greeting.".to_string())
        );
        assert_eq!(
            store.conversation_state(conv.id),
            Some((user.id, "voice".to_string(), true))
        );
    }

    #[tokio::test]
    async fn test_search_scopes_by_user_and_limit() {
        let store = InMemoryStore::new();
        let alice = store.get_or_create_user("+14155550100").await.unwrap();
        let bob = store.get_or_create_user("+14155550101").await.unwrap();

        for i in 0..5 {
            store
                .store_memory(alice.id, "fact", &format!("fact {i}"), "voice", None, 1.0, None)
                .await
                .unwrap();
        }
        store
            .store_memory(bob.id, "fact", "bob fact", "voice", None, 1.0, None)
            .await
            .unwrap();

        let found = store.semantic_search(alice.id, "probe", 3).await.unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|m| m.content.starts_with("fact")));
    }
}
