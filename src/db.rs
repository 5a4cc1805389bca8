use std::collections::{BTreeSet, HashSet};

use anyhow::Context;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppError, AppResult, Config, StoreContext,
    chat::{ChatStore, Message},
    matches::CandidatePool,
    profiles::{Gender, Personal, Profile, Range, Region, RegionId, SearchCriteria, Settings, UserConfig},
    relations::{Relation, RelationKind},
    store::Storage,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS configs (
    uuid TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS personal (
    uuid        TEXT PRIMARY KEY REFERENCES configs (uuid),
    username    TEXT NOT NULL,
    avatar_link TEXT NOT NULL,
    gender      INTEGER NOT NULL,
    age         INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS criteria (
    uuid       TEXT PRIMARY KEY REFERENCES configs (uuid),
    regions    TEXT NOT NULL DEFAULT '[]',
    price_from REAL,
    price_to   REAL,
    gender     INTEGER NOT NULL,
    age_from   INTEGER,
    age_to     INTEGER
);
CREATE TABLE IF NOT EXISTS settings (
    uuid  TEXT PRIMARY KEY REFERENCES configs (uuid),
    theme INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS regions (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS relations (
    actor   TEXT NOT NULL,
    target  TEXT NOT NULL,
    kind    INTEGER NOT NULL,
    touched INTEGER NOT NULL,
    PRIMARY KEY (actor, target)
);
CREATE INDEX IF NOT EXISTS relations_by_kind ON relations (actor, kind, touched);
CREATE TABLE IF NOT EXISTS messages (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    sender   TEXT NOT NULL,
    receiver TEXT NOT NULL,
    sent_at  TEXT NOT NULL,
    body     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_by_sender ON messages (sender);
CREATE INDEX IF NOT EXISTS messages_by_receiver ON messages (receiver);
"#;

const PROFILE_SELECT: &str = r#"
SELECT p.uuid, p.username, p.avatar_link, p.gender, p.age,
       c.regions, c.price_from, c.price_to, c.gender, c.age_from, c.age_to
FROM personal p
LEFT JOIN criteria c ON c.uuid = p.uuid
"#;

type ProfileRow = (
    String,
    String,
    String,
    i64,
    i64,
    Option<String>,
    Option<f64>,
    Option<f64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

type CriteriaRow = (String, Option<f64>, Option<f64>, i64, Option<i64>, Option<i64>);

fn criteria_from_columns(
    regions: Option<String>,
    price_from: Option<f64>,
    price_to: Option<f64>,
    wanted: i64,
    age_from: Option<i64>,
    age_to: Option<i64>,
) -> anyhow::Result<SearchCriteria> {
    Ok(SearchCriteria {
        regions: match regions {
            Some(json) => serde_json::from_str::<BTreeSet<RegionId>>(&json).context("regions column")?,
            None => BTreeSet::new(),
        },
        price_range: Range::new(price_from, price_to),
        gender_wanted: Gender::try_from(wanted)?,
        age_range: Range::new(age_from.map(u32::try_from).transpose()?, age_to.map(u32::try_from).transpose()?),
    })
}

fn profile_from_row(row: ProfileRow) -> anyhow::Result<Profile> {
    let (uuid, username, avatar_link, gender, age, regions, price_from, price_to, wanted, age_from, age_to) = row;

    let criteria = match wanted {
        // no criteria row: no constraints
        None => SearchCriteria::default(),
        Some(wanted) => criteria_from_columns(regions, price_from, price_to, wanted, age_from, age_to)?,
    };

    Ok(Profile {
        uuid: Uuid::parse_str(&uuid)?,
        personal: Personal {
            username,
            avatar_link,
            gender: Gender::try_from(gender)?,
            age: u32::try_from(age)?,
        },
        criteria,
    })
}

fn parse_ids(rows: Vec<(String,)>) -> anyhow::Result<Vec<Uuid>> {
    rows.into_iter()
        .map(|(id,)| Uuid::parse_str(&id).map_err(anyhow::Error::from))
        .collect()
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &Config) -> AppResult<Self> {
        // every connection to :memory: is its own database
        let max_connections = if config.database_url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&config.database_url)
            .await
            .store_ctx("connect", &config.database_url)?;
        info!(url = %config.database_url, max_connections, "connected to sqlite");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> AppResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .store_ctx("init_schema", "sqlite")?;
        Ok(())
    }

    pub async fn add_region(&self, region: &Region) -> AppResult<()> {
        sqlx::query("INSERT INTO regions (id,name,description) VALUES (?,?,?) ON CONFLICT (id) DO UPDATE SET name = excluded.name, description = excluded.description")
            .bind(region.id)
            .bind(&region.name)
            .bind(&region.description)
            .execute(&self.pool)
            .await
            .store_ctx("add_region", region.id)?;
        Ok(())
    }

    async fn fetch_profile(&self, uuid: Uuid) -> AppResult<Option<Profile>> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!("{PROFILE_SELECT} WHERE p.uuid = ?"))
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await
            .store_ctx("get_profile", uuid)?;

        row.map(profile_from_row).transpose().store_ctx("get_profile", uuid)
    }
}

#[async_trait::async_trait]
impl Storage for SqliteStore {
    async fn save_config(&self, config: &UserConfig) -> AppResult<()> {
        let uuid = config.uuid.to_string();
        let mut tx = self.pool.begin().await.store_ctx("save_config", &uuid)?;

        sqlx::query("INSERT INTO configs (uuid) VALUES (?) ON CONFLICT (uuid) DO NOTHING")
            .bind(&uuid)
            .execute(&mut *tx)
            .await
            .store_ctx("save_config", &uuid)?;

        if let Some(personal) = &config.personal {
            sqlx::query(
                r#"INSERT INTO personal (uuid,username,avatar_link,gender,age) VALUES (?,?,?,?,?)
                ON CONFLICT (uuid) DO UPDATE SET username = excluded.username,
                                                 avatar_link = excluded.avatar_link,
                                                 gender = excluded.gender,
                                                 age = excluded.age"#,
            )
            .bind(&uuid)
            .bind(&personal.username)
            .bind(&personal.avatar_link)
            .bind(personal.gender.code())
            .bind(i64::from(personal.age))
            .execute(&mut *tx)
            .await
            .store_ctx("save_personal", &uuid)?;
        }

        if let Some(criteria) = &config.criteria {
            let regions = serde_json::to_string(&criteria.regions).store_ctx("save_criteria", &uuid)?;
            sqlx::query(
                r#"INSERT INTO criteria (uuid,regions,price_from,price_to,gender,age_from,age_to) VALUES (?,?,?,?,?,?,?)
                ON CONFLICT (uuid) DO UPDATE SET regions = excluded.regions,
                                                 price_from = excluded.price_from,
                                                 price_to = excluded.price_to,
                                                 gender = excluded.gender,
                                                 age_from = excluded.age_from,
                                                 age_to = excluded.age_to"#,
            )
            .bind(&uuid)
            .bind(regions)
            .bind(criteria.price_range.from)
            .bind(criteria.price_range.to)
            .bind(criteria.gender_wanted.code())
            .bind(criteria.age_range.from.map(i64::from))
            .bind(criteria.age_range.to.map(i64::from))
            .execute(&mut *tx)
            .await
            .store_ctx("save_criteria", &uuid)?;
        }

        if let Some(settings) = &config.settings {
            sqlx::query("INSERT INTO settings (uuid,theme) VALUES (?,?) ON CONFLICT (uuid) DO UPDATE SET theme = excluded.theme")
                .bind(&uuid)
                .bind(settings.theme)
                .execute(&mut *tx)
                .await
                .store_ctx("save_settings", &uuid)?;
        }

        tx.commit().await.store_ctx("save_config", &uuid)?;
        Ok(())
    }

    async fn get_config(&self, uuid: Uuid) -> AppResult<UserConfig> {
        let key = uuid.to_string();
        if sqlx::query("SELECT 1 FROM configs WHERE uuid=?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .store_ctx("get_config", uuid)?
            .is_none()
        {
            return Err(AppError::not_found("config", uuid));
        }

        let personal: Option<(String, String, i64, i64)> =
            sqlx::query_as("SELECT username,avatar_link,gender,age FROM personal WHERE uuid=?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await
                .store_ctx("get_personal", uuid)?;
        let personal = personal
            .map(|(username, avatar_link, gender, age)| -> anyhow::Result<Personal> {
                Ok(Personal {
                    username,
                    avatar_link,
                    gender: Gender::try_from(gender)?,
                    age: u32::try_from(age)?,
                })
            })
            .transpose()
            .store_ctx("get_personal", uuid)?;

        let criteria: Option<CriteriaRow> =
            sqlx::query_as("SELECT regions,price_from,price_to,gender,age_from,age_to FROM criteria WHERE uuid=?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await
                .store_ctx("get_criteria", uuid)?;
        let criteria = criteria
            .map(|(regions, price_from, price_to, wanted, age_from, age_to)| {
                criteria_from_columns(Some(regions), price_from, price_to, wanted, age_from, age_to)
            })
            .transpose()
            .store_ctx("get_criteria", uuid)?;

        let settings: Option<(i64,)> = sqlx::query_as("SELECT theme FROM settings WHERE uuid=?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .store_ctx("get_settings", uuid)?;

        Ok(UserConfig {
            uuid,
            personal,
            criteria,
            settings: settings.map(|(theme,)| Settings { theme }),
        })
    }

    async fn get_profile(&self, uuid: Uuid) -> AppResult<Profile> {
        self.fetch_profile(uuid)
            .await?
            .ok_or_else(|| AppError::not_found("profile", uuid))
    }

    async fn get_profiles(&self, ids: &[Uuid]) -> AppResult<Vec<Profile>> {
        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = self.fetch_profile(*id).await? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    async fn get_candidate_pool(&self, requester: Uuid, criteria: &SearchCriteria) -> AppResult<CandidatePool> {
        let age_from = criteria.age_range.from.map(i64::from);
        let age_to = criteria.age_range.to.map(i64::from);
        let wanted = criteria.gender_wanted.code();

        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            r#"{PROFILE_SELECT}
            WHERE p.uuid != ?
              AND (? IS NULL OR p.age >= ?)
              AND (? IS NULL OR p.age <= ?)
              AND (? = 0 OR p.gender = 0 OR p.gender = ?)"#
        ))
        .bind(requester.to_string())
        .bind(age_from)
        .bind(age_from)
        .bind(age_to)
        .bind(age_to)
        .bind(wanted)
        .bind(wanted)
        .fetch_all(&self.pool)
        .await
        .store_ctx("get_candidate_pool", requester)?;

        let profiles = rows
            .into_iter()
            .map(profile_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .store_ctx("get_candidate_pool", requester)?;
        Ok(CandidatePool::unordered(profiles))
    }

    async fn get_regions(&self) -> AppResult<Vec<Region>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as("SELECT id,name,description FROM regions ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .store_ctx("get_regions", "*")?;

        Ok(rows
            .into_iter()
            .map(|(id, name, description)| Region { id, name, description })
            .collect())
    }

    async fn upsert_relation(&self, relation: &Relation) -> AppResult<()> {
        let key = format!("{}->{}", relation.actor(), relation.target());
        sqlx::query(
            r#"INSERT INTO relations (actor,target,kind,touched)
            VALUES (?,?,?,(SELECT COALESCE(MAX(touched), 0) + 1 FROM relations))
            ON CONFLICT (actor, target) DO UPDATE SET kind = excluded.kind, touched = excluded.touched
            WHERE relations.kind != excluded.kind"#,
        )
        .bind(relation.actor().to_string())
        .bind(relation.target().to_string())
        .bind(relation.kind().code())
        .execute(&self.pool)
        .await
        .store_ctx("upsert_relation", key)?;
        Ok(())
    }

    async fn list_related(&self, actor: Uuid, kind: RelationKind, limit: usize, offset: usize) -> AppResult<Vec<Uuid>> {
        // sqlite reads a negative LIMIT as "no limit"
        let limit = if limit == 0 { -1 } else { i64::try_from(limit).unwrap_or(i64::MAX) };
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT target FROM relations WHERE actor=? AND kind=? ORDER BY touched LIMIT ? OFFSET ?")
                .bind(actor.to_string())
                .bind(kind.code())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .store_ctx("list_related", actor)?;

        parse_ids(rows).store_ctx("list_related", actor)
    }

    async fn resolved_targets(&self, actor: Uuid) -> AppResult<HashSet<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT target FROM relations WHERE actor=?")
            .bind(actor.to_string())
            .fetch_all(&self.pool)
            .await
            .store_ctx("resolved_targets", actor)?;

        Ok(parse_ids(rows).store_ctx("resolved_targets", actor)?.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl ChatStore for SqliteStore {
    async fn list_partners(&self, uuid: Uuid) -> AppResult<Vec<Uuid>> {
        let key = uuid.to_string();
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT DISTINCT CASE WHEN sender = ? THEN receiver ELSE sender END AS partner
            FROM messages WHERE sender = ? OR receiver = ?
            ORDER BY partner"#,
        )
        .bind(&key)
        .bind(&key)
        .bind(&key)
        .fetch_all(&self.pool)
        .await
        .store_ctx("list_partners", uuid)?;

        parse_ids(rows).store_ctx("list_partners", uuid)
    }

    async fn save_message(&self, message: &Message) -> AppResult<()> {
        sqlx::query("INSERT INTO messages (sender,receiver,sent_at,body) VALUES (?,?,?,?)")
            .bind(message.sender.to_string())
            .bind(message.receiver.to_string())
            .bind(message.sent_at)
            .bind(&message.body)
            .execute(&self.pool)
            .await
            .store_ctx("save_message", message.pair())?;
        Ok(())
    }

    async fn load_messages(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>> {
        let (a, b) = (a.to_string(), b.to_string());
        let rows: Vec<(String, String, OffsetDateTime, String)> = sqlx::query_as(
            r#"SELECT sender,receiver,sent_at,body FROM messages
            WHERE (sender = ? AND receiver = ?) OR (sender = ? AND receiver = ?)
            ORDER BY id"#,
        )
        .bind(&a)
        .bind(&b)
        .bind(&b)
        .bind(&a)
        .fetch_all(&self.pool)
        .await
        .store_ctx("load_messages", format!("{a}+{b}"))?;

        rows.into_iter()
            .map(|(sender, receiver, sent_at, body)| -> anyhow::Result<Message> {
                Ok(Message {
                    sender: Uuid::parse_str(&sender)?,
                    receiver: Uuid::parse_str(&receiver)?,
                    sent_at,
                    body,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .store_ctx("load_messages", format!("{a}+{b}"))
    }
}
