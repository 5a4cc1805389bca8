use std::collections::HashSet;

use uuid::Uuid;

use crate::profiles::Profile;

/// How a store delivered its candidates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PoolOrder {
    /// No meaningful order; the engine sorts by ascending identifier.
    #[default]
    Unordered,
    /// The store already ranked the pool (e.g. by region proximity); kept as is.
    Natural,
}

#[derive(Debug, Default, Clone)]
pub struct CandidatePool {
    pub profiles: Vec<Profile>,
    pub order: PoolOrder,
}

impl CandidatePool {
    pub fn unordered(profiles: Vec<Profile>) -> Self {
        Self { profiles, order: PoolOrder::Unordered }
    }

    pub fn natural(profiles: Vec<Profile>) -> Self {
        Self { profiles, order: PoolOrder::Natural }
    }
}

/// Whether `candidate` fits everything `seeker` asks for.
pub fn satisfies(seeker: &Profile, candidate: &Profile) -> bool {
    let wants = &seeker.criteria;
    candidate.personal.gender.accepted_by(wants.gender_wanted)
        && wants.age_range.contains(candidate.personal.age)
        && wants.region_overlap(&candidate.criteria)
}

/// Mutual compatibility: each side satisfies the other's criteria and their
/// price ranges overlap.
pub fn compatible(a: &Profile, b: &Profile) -> bool {
    satisfies(a, b)
        && satisfies(b, a)
        && a.criteria.price_range.overlaps(&b.criteria.price_range)
}

pub const DEFAULT_MATCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct MatchEngine {
    default_limit: usize,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_LIMIT)
    }
}

impl MatchEngine {
    /// `default_limit == 0` falls back to [`DEFAULT_MATCH_LIMIT`].
    pub fn new(default_limit: usize) -> Self {
        let default_limit = if default_limit == 0 { DEFAULT_MATCH_LIMIT } else { default_limit };
        Self { default_limit }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Candidates from `pool` mutually compatible with `requester`, minus the
    /// requester and anyone they already resolved. `limit == 0` uses the
    /// engine's default.
    pub fn find_matches(
        &self,
        requester: &Profile,
        pool: CandidatePool,
        resolved: &HashSet<Uuid>,
        limit: usize,
    ) -> Vec<Profile> {
        let limit = if limit == 0 { self.default_limit } else { limit };

        let CandidatePool { mut profiles, order } = pool;
        if order == PoolOrder::Unordered {
            profiles.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        }

        let mut seen = HashSet::new();
        profiles
            .into_iter()
            .filter(|candidate| candidate.uuid != requester.uuid)
            .filter(|candidate| !resolved.contains(&candidate.uuid))
            .filter(|candidate| seen.insert(candidate.uuid))
            .filter(|candidate| compatible(requester, candidate))
            .take(limit)
            .collect()
    }
}
