use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ChatStore, Client, ClientId, Hub, Message, Pair};
use crate::{AppResult, Config};

/// A registered client together with the hub it belongs to.
pub struct Connection {
    pub hub: Arc<Hub>,
    pub client: ClientId,
    pub messages: mpsc::Receiver<Message>,
}

impl Connection {
    pub async fn close(self) {
        self.hub.unregister(self.client).await;
    }
}

/// Owns one [`Hub`] per pair of users, created on first use.
///
/// Idle hubs are kept for the lifetime of the directory.
pub struct ChatDirectory {
    hubs: Mutex<HashMap<Pair, Arc<Hub>>>,
    store: Arc<dyn ChatStore>,
    hub_queue: usize,
    client_buffer: usize,
}

impl ChatDirectory {
    pub fn new(store: Arc<dyn ChatStore>, config: &Config) -> Self {
        Self {
            hubs: Mutex::new(HashMap::new()),
            store,
            hub_queue: config.hub_queue,
            client_buffer: config.client_buffer,
        }
    }

    /// Same instance for `(a, b)` and `(b, a)`, including under concurrent
    /// first calls.
    pub async fn get_hub(&self, a: Uuid, b: Uuid) -> Arc<Hub> {
        let pair = Pair::new(a, b);
        let mut hubs = self.hubs.lock().await;
        hubs.entry(pair)
            .or_insert_with(|| Arc::new(Hub::spawn(pair, self.hub_queue)))
            .clone()
    }

    pub async fn hub_count(&self) -> usize {
        self.hubs.lock().await.len()
    }

    /// Registers a fresh client for `user` on the hub shared with `partner`.
    pub async fn connect(&self, user: Uuid, partner: Uuid) -> Connection {
        let hub = self.get_hub(user, partner).await;
        let (client, messages) = Client::new(self.client_buffer);
        let id = client.id();
        hub.register(client).await;
        debug!(%user, %partner, client = %id, "connected");

        Connection { hub, client: id, messages }
    }

    /// Persists `message` if the store allows, then fans it out to both sides.
    pub async fn deliver(&self, message: Message) {
        if let Err(err) = self.store.save_message(&message).await {
            warn!(pair = %message.pair(), "message not persisted: {err}");
        }

        let hub = self.get_hub(message.sender, message.receiver).await;
        hub.broadcast(message).await;
    }

    pub async fn history(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>> {
        self.store.load_messages(a, b).await
    }

    pub async fn list_partners(&self, uuid: Uuid) -> AppResult<Vec<Uuid>> {
        self.store.list_partners(uuid).await
    }
}
