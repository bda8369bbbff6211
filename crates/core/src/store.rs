//! Conversation storage and per-conversation turn serialization.
//!
//! A conversation's [`ConversationData`] is handed out behind an async mutex:
//! holding the guard is what gives a turn exclusive ownership of the history,
//! so two messages from the same conversation are processed one after the
//! other while different conversations proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::message::{ConversationData, ConversationId};

/// Where conversations live between turns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Acquire exclusive access to a conversation, creating it if needed.
    ///
    /// Waits while another turn of the same conversation holds it.
    async fn lock(&self, id: &ConversationId) -> OwnedMutexGuard<ConversationData>;

    /// Persist the conversation after a turn.
    async fn save(&self, data: &ConversationData);
}

/// Process-local store. Conversations are lost on restart.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, Arc<AsyncMutex<ConversationData>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known conversations.
    pub fn len(&self) -> usize {
        self.conversations.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: &ConversationId) -> Arc<AsyncMutex<ConversationData>> {
        let mut conversations = match self.conversations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        conversations
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(conversation_id = %id, "New conversation");
                Arc::new(AsyncMutex::new(ConversationData::new(id.clone())))
            })
            .clone()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn lock(&self, id: &ConversationId) -> OwnedMutexGuard<ConversationData> {
        self.slot(id).lock_owned().await
    }

    async fn save(&self, _data: &ConversationData) {
        // The guard already wrote through to the shared slot.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ConversationTurn;
    use std::time::Duration;

    #[tokio::test]
    async fn history_survives_between_turns() {
        let store = InMemoryConversationStore::new();
        let id = ConversationId::from("c1");
        {
            let mut data = store.lock(&id).await;
            data.push(ConversationTurn::user("hello"));
            store.save(&data).await;
        }
        let data = store.lock(&id).await;
        assert_eq!(data.turns.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn same_conversation_turns_are_serialized() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = ConversationId::from("c1");

        let first = store.lock(&id).await;

        let store2 = store.clone();
        let id2 = id.clone();
        let second = tokio::spawn(async move {
            let mut data = store2.lock(&id2).await;
            data.push(ConversationTurn::user("second"));
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!second.is_finished());

        let mut first = first;
        first.push(ConversationTurn::user("first"));
        drop(first);

        second.await.unwrap();
        let data = store.lock(&id).await;
        let texts: Vec<_> = data.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn different_conversations_do_not_block() {
        let store = InMemoryConversationStore::new();
        let _a = store.lock(&ConversationId::from("a")).await;
        let b = store.lock(&ConversationId::from("b")).await;
        assert_eq!(b.id.0, "b");
    }
}
