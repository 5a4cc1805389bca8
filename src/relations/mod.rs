use std::{collections::HashSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{AppError, AppResult, store::Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Liked,
    SuperLiked,
    Disliked,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [RelationKind::Liked, RelationKind::SuperLiked, RelationKind::Disliked];

    pub fn code(self) -> i64 {
        use RelationKind::*;
        match self {
            Liked => 0,
            SuperLiked => 1,
            Disliked => 2,
        }
    }
}

impl TryFrom<i64> for RelationKind {
    type Error = anyhow::Error;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or_else(|| anyhow::anyhow!("unknown relation code {code}"))
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A directed decision of `actor` about `target`. Only constructible through
/// [`Relation::new`], so `actor != target` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RelationFields")]
pub struct Relation {
    actor: Uuid,
    target: Uuid,
    kind: RelationKind,
}

#[derive(Deserialize)]
struct RelationFields {
    actor: Uuid,
    target: Uuid,
    kind: RelationKind,
}

impl TryFrom<RelationFields> for Relation {
    type Error = AppError;

    fn try_from(RelationFields { actor, target, kind }: RelationFields) -> AppResult<Self> {
        Self::new(actor, target, kind)
    }
}

impl Relation {
    pub fn new(actor: Uuid, target: Uuid, kind: RelationKind) -> AppResult<Self> {
        if actor == target {
            return Err(format!("user {actor} cannot relate to themselves"))?;
        }
        Ok(Self { actor, target, kind })
    }

    pub fn actor(&self) -> Uuid {
        self.actor
    }

    pub fn target(&self) -> Uuid {
        self.target
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }
}

#[derive(Clone)]
pub struct RelationLedger {
    store: Arc<dyn Storage>,
}

impl RelationLedger {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, actor: Uuid, target: Uuid, kind: RelationKind) -> AppResult<()> {
        let relation = Relation::new(actor, target, kind)?;
        self.store.upsert_relation(&relation).await?;
        debug!(%actor, %target, %kind, "relation stored");
        Ok(())
    }

    /// Ordered least recently touched first; see [`Storage::upsert_relation`].
    pub async fn list_by_kind(&self, actor: Uuid, kind: RelationKind, limit: usize, offset: usize) -> AppResult<Vec<Uuid>> {
        self.store.list_related(actor, kind, limit, offset).await
    }

    /// Everyone `actor` has liked, super-liked or disliked.
    pub async fn resolved_targets(&self, actor: Uuid) -> AppResult<HashSet<Uuid>> {
        self.store.resolved_targets(actor).await
    }
}
