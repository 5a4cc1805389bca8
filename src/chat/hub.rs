use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Message, Pair};

pub type ClientId = Uuid;

/// The hub's end of one connection. The hub owns the sender; dropping it is
/// what closes the client's stream.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    send: mpsc::Sender<Message>,
}

impl Client {
    /// A client whose stream holds at most `capacity` undelivered messages.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (send, recv) = mpsc::channel(capacity);
        (Self { id: Uuid::now_v7(), send }, recv)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Idle,
    Active,
}

enum Command {
    Register(Client),
    Unregister(ClientId),
    Broadcast(Message),
}

/// Message broker for one pair of users.
///
/// A single task owns the client set and applies commands in the order they
/// were queued; the methods here only enqueue. Register, unregister and
/// broadcast share one queue so that a caller's register is always applied
/// before its own later broadcast, which separate queues could not promise.
#[derive(Debug)]
pub struct Hub {
    pair: Pair,
    commands: mpsc::Sender<Command>,
    clients: Arc<AtomicUsize>,
}

impl Hub {
    /// Starts the hub task on the current tokio runtime. It runs until the
    /// `Hub` is dropped.
    pub fn spawn(pair: Pair, queue: usize) -> Self {
        let (commands, inbox) = mpsc::channel(queue);
        let clients = Arc::new(AtomicUsize::new(0));
        tokio::spawn(run(pair, inbox, clients.clone()));
        debug!(%pair, "hub spawned");

        Self { pair, commands, clients }
    }

    pub fn pair(&self) -> Pair {
        self.pair
    }

    pub async fn register(&self, client: Client) {
        self.enqueue(Command::Register(client)).await
    }

    pub async fn unregister(&self, client: ClientId) {
        self.enqueue(Command::Unregister(client)).await
    }

    /// Delivers to every registered client. A client whose stream is full is
    /// dropped instead of waited on.
    pub async fn broadcast(&self, message: Message) {
        self.enqueue(Command::Broadcast(message)).await
    }

    /// Clients registered as of the last processed command.
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::Acquire)
    }

    pub fn state(&self) -> HubState {
        match self.client_count() {
            0 => HubState::Idle,
            _ => HubState::Active,
        }
    }

    async fn enqueue(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            warn!(pair = %self.pair, "hub task is gone, command dropped");
        }
    }
}

async fn run(pair: Pair, mut inbox: mpsc::Receiver<Command>, gauge: Arc<AtomicUsize>) {
    let mut clients: HashMap<ClientId, mpsc::Sender<Message>> = HashMap::new();

    while let Some(command) = inbox.recv().await {
        match command {
            Command::Register(Client { id, send }) => {
                clients.insert(id, send);
                debug!(%pair, client = %id, "client registered");
            }
            Command::Unregister(id) => {
                if clients.remove(&id).is_some() {
                    debug!(%pair, client = %id, "client unregistered");
                }
            }
            Command::Broadcast(message) => {
                clients.retain(|id, send| match send.try_send(message.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        debug!(%pair, client = %id, "client too slow, dropping");
                        false
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(%pair, client = %id, "client went away");
                        false
                    }
                });
            }
        }
        gauge.store(clients.len(), Ordering::Release);
    }

    debug!(%pair, "hub stopped");
}
