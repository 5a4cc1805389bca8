use std::collections::BTreeSet;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Message, Pair};
use crate::AppResult;

/// Optional persistence behind the chat directory. Delivery never depends on
/// it succeeding.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Everyone `uuid` has exchanged messages with, by ascending id.
    async fn list_partners(&self, uuid: Uuid) -> AppResult<Vec<Uuid>>;

    async fn save_message(&self, message: &Message) -> AppResult<()>;

    /// Messages between `a` and `b` in the order they were saved.
    async fn load_messages(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>>;
}

/// Remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatStore;

#[async_trait::async_trait]
impl ChatStore for NoopChatStore {
    async fn list_partners(&self, _uuid: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(Vec::new())
    }

    async fn save_message(&self, _message: &Message) -> AppResult<()> {
        Ok(())
    }

    async fn load_messages(&self, _a: Uuid, _b: Uuid) -> AppResult<Vec<Message>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
pub struct MemoryChatStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryChatStore {
    async fn list_partners(&self, uuid: Uuid) -> AppResult<Vec<Uuid>> {
        let partners: BTreeSet<Uuid> = self
            .messages
            .lock()
            .await
            .iter()
            .filter_map(|m| match (m.sender == uuid, m.receiver == uuid) {
                (true, _) => Some(m.receiver),
                (_, true) => Some(m.sender),
                _ => None,
            })
            .collect();
        Ok(partners.into_iter().collect())
    }

    async fn save_message(&self, message: &Message) -> AppResult<()> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }

    async fn load_messages(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>> {
        let pair = Pair::new(a, b);
        Ok(self
            .messages
            .lock()
            .await
            .iter()
            .filter(|m| m.pair() == pair)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn partners_and_history_are_per_pair() {
        let store = MemoryChatStore::new();
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));

        store.save_message(&Message::new(a, c, "hey c")).await.unwrap();
        store.save_message(&Message::new(b, a, "hey a")).await.unwrap();
        store.save_message(&Message::new(a, b, "hey b")).await.unwrap();

        assert_eq!(store.list_partners(a).await.unwrap(), vec![b, c]);
        assert_eq!(store.list_partners(c).await.unwrap(), vec![a]);

        let bodies: Vec<String> = store.load_messages(a, b).await.unwrap().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["hey a", "hey b"]);
    }

    #[tokio::test]
    async fn noop_store_forgets() {
        let store = NoopChatStore;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        store.save_message(&Message::new(a, b, "lost")).await.unwrap();
        assert!(store.load_messages(a, b).await.unwrap().is_empty());
        assert!(store.list_partners(a).await.unwrap().is_empty());
    }
}
