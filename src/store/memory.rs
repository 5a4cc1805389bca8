use std::collections::{BTreeMap, HashMap, HashSet};

use tokio::sync::RwLock;
use uuid::Uuid;

use super::Storage;
use crate::{
    AppError, AppResult,
    matches::CandidatePool,
    profiles::{Profile, Region, RegionId, SearchCriteria, UserConfig},
    relations::{Relation, RelationKind},
};

#[derive(Default)]
struct Inner {
    configs: HashMap<Uuid, UserConfig>,
    regions: BTreeMap<RegionId, Region>,
    // (actor, target) -> (kind, position in listings)
    relations: HashMap<(Uuid, Uuid), (RelationKind, u64)>,
    touched: u64,
}

/// In-process store; every write holds the lock, so upserts are atomic per key.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_region(&self, region: Region) {
        self.inner.write().await.regions.insert(region.id, region);
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStore {
    async fn save_config(&self, config: &UserConfig) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .configs
            .entry(config.uuid)
            .or_insert_with(|| UserConfig::empty(config.uuid));

        if let Some(personal) = &config.personal {
            stored.personal = Some(personal.clone());
        }
        if let Some(criteria) = &config.criteria {
            stored.criteria = Some(criteria.clone());
        }
        if let Some(settings) = config.settings {
            stored.settings = Some(settings);
        }
        Ok(())
    }

    async fn get_config(&self, uuid: Uuid) -> AppResult<UserConfig> {
        self.inner
            .read()
            .await
            .configs
            .get(&uuid)
            .cloned()
            .ok_or_else(|| AppError::not_found("config", uuid))
    }

    async fn get_profile(&self, uuid: Uuid) -> AppResult<Profile> {
        self.inner
            .read()
            .await
            .configs
            .get(&uuid)
            .and_then(UserConfig::profile)
            .ok_or_else(|| AppError::not_found("profile", uuid))
    }

    async fn get_profiles(&self, ids: &[Uuid]) -> AppResult<Vec<Profile>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.configs.get(id))
            .filter_map(UserConfig::profile)
            .collect())
    }

    async fn get_candidate_pool(&self, requester: Uuid, _criteria: &SearchCriteria) -> AppResult<CandidatePool> {
        let inner = self.inner.read().await;
        let profiles = inner
            .configs
            .values()
            .filter(|config| config.uuid != requester)
            .filter_map(UserConfig::profile)
            .collect();
        Ok(CandidatePool::unordered(profiles))
    }

    async fn get_regions(&self) -> AppResult<Vec<Region>> {
        Ok(self.inner.read().await.regions.values().cloned().collect())
    }

    async fn upsert_relation(&self, relation: &Relation) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let key = (relation.actor(), relation.target());
        if inner.relations.get(&key).is_some_and(|(kind, _)| *kind == relation.kind()) {
            return Ok(());
        }

        inner.touched += 1;
        let touched = inner.touched;
        inner.relations.insert(key, (relation.kind(), touched));
        Ok(())
    }

    async fn list_related(&self, actor: Uuid, kind: RelationKind, limit: usize, offset: usize) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        let mut related: Vec<(u64, Uuid)> = inner
            .relations
            .iter()
            .filter(|((a, _), (k, _))| *a == actor && *k == kind)
            .map(|((_, target), (_, touched))| (*touched, *target))
            .collect();
        related.sort_unstable();

        let limit = if limit == 0 { usize::MAX } else { limit };
        Ok(related
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, target)| target)
            .collect())
    }

    async fn resolved_targets(&self, actor: Uuid) -> AppResult<HashSet<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .relations
            .keys()
            .filter(|(a, _)| *a == actor)
            .map(|(_, target)| *target)
            .collect())
    }
}
