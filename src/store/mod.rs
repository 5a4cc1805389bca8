mod memory;

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    AppResult,
    matches::CandidatePool,
    profiles::{Profile, Region, SearchCriteria, UserConfig},
    relations::{Relation, RelationKind},
};

pub use memory::MemoryStore;

/// Backing store for profiles, regions and relations.
///
/// Implementations decide how much of the candidate filtering happens in the
/// store; the match engine re-checks everything it is given.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Replaces the sections present in `config`; absent sections are left alone.
    async fn save_config(&self, config: &UserConfig) -> AppResult<()>;

    /// `NotFound` if the user never saved anything.
    async fn get_config(&self, uuid: Uuid) -> AppResult<UserConfig>;

    /// `NotFound` unless the user has at least a personal section.
    async fn get_profile(&self, uuid: Uuid) -> AppResult<Profile>;

    /// Profiles for `ids`, in the order given. Unknown or incomplete ids are
    /// skipped.
    async fn get_profiles(&self, ids: &[Uuid]) -> AppResult<Vec<Profile>>;

    /// Every profile that could match `criteria`, excluding `requester`.
    async fn get_candidate_pool(&self, requester: Uuid, criteria: &SearchCriteria) -> AppResult<CandidatePool>;

    async fn get_regions(&self) -> AppResult<Vec<Region>>;

    /// Last write wins per `(actor, target)`. Re-storing the same kind keeps
    /// the pair's position in listings; a new kind moves it to the end.
    async fn upsert_relation(&self, relation: &Relation) -> AppResult<()>;

    /// Targets of `actor` with `kind`, least recently touched first.
    /// `limit == 0` means no limit.
    async fn list_related(&self, actor: Uuid, kind: RelationKind, limit: usize, offset: usize) -> AppResult<Vec<Uuid>>;

    async fn resolved_targets(&self, actor: Uuid) -> AppResult<HashSet<Uuid>>;
}
