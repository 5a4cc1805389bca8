use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    AppResult, Config,
    chat::{ChatDirectory, ChatStore, Connection, Message},
    db::SqliteStore,
    matches::MatchEngine,
    profiles::{Profile, Region, UserConfig},
    relations::{RelationKind, RelationLedger},
    store::Storage,
};

/// Everything a transport layer needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Storage>,
    ledger: RelationLedger,
    engine: MatchEngine,
    chats: Arc<ChatDirectory>,
}

impl AppState {
    pub fn new(store: Arc<dyn Storage>, chat_store: Arc<dyn ChatStore>, config: &Config) -> Self {
        Self {
            ledger: RelationLedger::new(store.clone()),
            store,
            engine: MatchEngine::new(config.match_limit),
            chats: Arc::new(ChatDirectory::new(chat_store, config)),
        }
    }

    /// Opens the configured sqlite database and uses it for both profiles and chat history.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let db = Arc::new(SqliteStore::connect(config).await?);
        db.init_schema().await?;
        Ok(Self::new(db.clone(), db, config))
    }

    pub fn ledger(&self) -> &RelationLedger {
        &self.ledger
    }

    pub fn chats(&self) -> &ChatDirectory {
        &self.chats
    }

    #[instrument(skip_all, fields(uuid = %config.uuid))]
    pub async fn save_config(&self, config: &UserConfig) -> AppResult<()> {
        self.store.save_config(config).await
    }

    #[instrument(skip(self))]
    pub async fn get_config(&self, uuid: Uuid) -> AppResult<UserConfig> {
        self.store.get_config(uuid).await
    }

    pub async fn get_regions(&self) -> AppResult<Vec<Region>> {
        self.store.get_regions().await
    }

    #[instrument(skip(self))]
    pub async fn relate(&self, actor: Uuid, target: Uuid, kind: RelationKind) -> AppResult<()> {
        self.ledger.upsert(actor, target, kind).await
    }

    /// Profiles `actor` marked with `kind`, in ledger order. `limit == 0` uses
    /// the configured default page size.
    #[instrument(skip(self))]
    pub async fn list_related_profiles(
        &self,
        actor: Uuid,
        kind: RelationKind,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<Profile>> {
        let limit = if limit == 0 { self.engine.default_limit() } else { limit };
        let ids = self.ledger.list_by_kind(actor, kind, limit, offset).await?;
        self.store.get_profiles(&ids).await
    }

    /// Up to `count` compatible profiles `uuid` has not decided on yet;
    /// `count == 0` uses the configured default.
    #[instrument(skip(self))]
    pub async fn get_matches(&self, uuid: Uuid, count: usize) -> AppResult<Vec<Profile>> {
        let requester = self.store.get_profile(uuid).await?;
        let pool = self.store.get_candidate_pool(uuid, &requester.criteria).await?;
        let resolved = self.ledger.resolved_targets(uuid).await?;

        let considered = pool.profiles.len();
        let matches = self.engine.find_matches(&requester, pool, &resolved, count);
        debug!(considered, resolved = resolved.len(), found = matches.len(), "matches computed");
        Ok(matches)
    }

    pub async fn open_dialog(&self, user: Uuid, partner: Uuid) -> Connection {
        self.chats.connect(user, partner).await
    }

    pub async fn send_message(&self, sender: Uuid, receiver: Uuid, body: impl Into<String>) {
        self.chats.deliver(Message::new(sender, receiver, body)).await
    }

    pub async fn list_partners(&self, uuid: Uuid) -> AppResult<Vec<Uuid>> {
        self.chats.list_partners(uuid).await
    }
}
