mod directory;
mod hub;
mod msg;
mod store;

pub use directory::{ChatDirectory, Connection};
pub use hub::{Client, ClientId, Hub, HubState};
pub use msg::{Message, Pair};
pub use store::{ChatStore, MemoryChatStore, NoopChatStore};
