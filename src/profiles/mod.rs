use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, AppResult};

pub type RegionId = i64;

pub fn parse_user_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|e| AppError::InvalidInput(format!("malformed user id {raw:?}: {e}")))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Any,
    Male,
    Female,
}

impl Gender {
    /// Whether someone of gender `self` is acceptable to a person who wants `wanted`.
    pub fn accepted_by(self, wanted: Gender) -> bool {
        wanted == Gender::Any || self == Gender::Any || self == wanted
    }

    pub fn code(self) -> i64 {
        match self {
            Gender::Any => 0,
            Gender::Male => 1,
            Gender::Female => 2,
        }
    }
}

impl TryFrom<i64> for Gender {
    type Error = anyhow::Error;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Gender::Any),
            1 => Ok(Gender::Male),
            2 => Ok(Gender::Female),
            _ => Err(anyhow::anyhow!("unknown gender code {code}")),
        }
    }
}

/// Inclusive range where a missing bound means "no limit" on that side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<T>,
}

impl<T> Default for Range<T> {
    fn default() -> Self {
        Self { from: None, to: None }
    }
}

impl<T: PartialOrd + Copy> Range<T> {
    pub fn new(from: Option<T>, to: Option<T>) -> Self {
        Self { from, to }
    }

    pub fn between(from: T, to: T) -> Self {
        Self::new(Some(from), Some(to))
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, value: T) -> bool {
        self.from.is_none_or(|from| from <= value) && self.to.is_none_or(|to| value <= to)
    }

    /// `max(lowA, lowB) <= min(highA, highB)` with absent bounds at ±∞.
    pub fn overlaps(&self, other: &Range<T>) -> bool {
        let low = match (self.from, other.from) {
            (Some(a), Some(b)) => Some(if a >= b { a } else { b }),
            (a, b) => a.or(b),
        };
        let high = match (self.to, other.to) {
            (Some(a), Some(b)) => Some(if a <= b { a } else { b }),
            (a, b) => a.or(b),
        };
        match (low, high) {
            (Some(low), Some(high)) => low <= high,
            _ => true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personal {
    pub username: String,
    #[serde(default)]
    pub avatar_link: String,
    pub gender: Gender,
    pub age: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Empty means any region is acceptable.
    #[serde(default)]
    pub regions: BTreeSet<RegionId>,
    #[serde(default)]
    pub price_range: Range<f64>,
    #[serde(default)]
    pub gender_wanted: Gender,
    #[serde(default)]
    pub age_range: Range<u32>,
}

impl SearchCriteria {
    pub fn region_overlap(&self, other: &SearchCriteria) -> bool {
        self.regions.is_empty()
            || other.regions.is_empty()
            || !self.regions.is_disjoint(&other.regions)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub uuid: Uuid,
    pub personal: Personal,
    pub criteria: SearchCriteria,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: i64,
}

/// Everything a user has published. Each section is optional; a user that
/// exists with no sections is "present but empty", not missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal: Option<Personal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<SearchCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl UserConfig {
    pub fn empty(uuid: Uuid) -> Self {
        Self { uuid, personal: None, criteria: None, settings: None }
    }

    /// A matchable profile needs at least the personal section. Missing
    /// criteria means "no constraints".
    pub fn profile(&self) -> Option<Profile> {
        Some(Profile {
            uuid: self.uuid,
            personal: self.personal.clone()?,
            criteria: self.criteria.clone().unwrap_or_default(),
        })
    }
}
