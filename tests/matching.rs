use std::{collections::HashSet, sync::Arc};

use homie::{
    AppError, AppResult, AppState, Config, StoreContext,
    chat::NoopChatStore,
    logging,
    matches::CandidatePool,
    profiles::{Gender, Personal, Profile, Range, Region, SearchCriteria, Settings, UserConfig},
    relations::{Relation, RelationKind},
    store::{MemoryStore, Storage},
};
use uuid::Uuid;

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn config(n: u128, gender: Gender, wants: Gender, regions: &[i64]) -> UserConfig {
    UserConfig {
        uuid: id(n),
        personal: Some(Personal {
            username: format!("user{n}"),
            avatar_link: format!("https://avatars.example/{n}.png"),
            gender,
            age: 25,
        }),
        criteria: Some(SearchCriteria {
            regions: regions.iter().copied().collect(),
            price_range: Range::new(Some(20000.0), Some(45000.0)),
            gender_wanted: wants,
            age_range: Range::new(Some(20), None),
        }),
        settings: None,
    }
}

fn ids(profiles: &[Profile]) -> Vec<Uuid> {
    profiles.iter().map(|p| p.uuid).collect()
}

fn memory_app() -> AppState {
    logging::init();
    AppState::new(Arc::new(MemoryStore::new()), Arc::new(NoopChatStore), &Config::default())
}

async fn sqlite_app() -> AppState {
    logging::init();
    AppState::from_config(&Config::default()).await.unwrap()
}

async fn region_scenario(app: AppState) {
    let (a, b, c) = (id(1), id(2), id(3));
    app.save_config(&config(1, Gender::Male, Gender::Female, &[1, 5])).await.unwrap();
    app.save_config(&config(2, Gender::Female, Gender::Male, &[2, 3])).await.unwrap();

    assert!(app.get_matches(a, 10).await.unwrap().is_empty());

    app.save_config(&config(3, Gender::Female, Gender::Male, &[2, 5])).await.unwrap();
    assert_eq!(ids(&app.get_matches(a, 10).await.unwrap()), vec![c]);

    // b shares region 2 with c, but c wants a man
    assert_eq!(ids(&app.get_matches(c, 10).await.unwrap()), vec![a]);
    assert!(app.get_matches(b, 10).await.unwrap().is_empty());
}

async fn exclusion_scenario(app: AppState) {
    let (a, b) = (id(1), id(2));
    app.save_config(&config(1, Gender::Male, Gender::Female, &[])).await.unwrap();
    app.save_config(&config(2, Gender::Female, Gender::Male, &[7])).await.unwrap();
    assert_eq!(ids(&app.get_matches(a, 10).await.unwrap()), vec![b]);

    app.relate(a, b, RelationKind::Liked).await.unwrap();
    assert!(app.get_matches(a, 10).await.unwrap().is_empty());

    app.relate(a, b, RelationKind::Disliked).await.unwrap();
    assert!(app.get_matches(a, 10).await.unwrap().is_empty());

    // exclusion only applies to the actor's own list
    assert_eq!(ids(&app.get_matches(b, 10).await.unwrap()), vec![a]);
}

async fn pagination_scenario(app: AppState) {
    let me = id(100);
    app.save_config(&config(100, Gender::Male, Gender::Any, &[])).await.unwrap();
    for n in [30, 10, 20] {
        app.save_config(&config(n, Gender::Female, Gender::Any, &[])).await.unwrap();
        app.relate(me, id(n), RelationKind::Liked).await.unwrap();
    }

    for _ in 0..3 {
        let page = app.list_related_profiles(me, RelationKind::Liked, 1, 1).await.unwrap();
        assert_eq!(ids(&page), vec![id(10)]);
    }
    let all = app.list_related_profiles(me, RelationKind::Liked, 0, 0).await.unwrap();
    assert_eq!(ids(&all), vec![id(30), id(10), id(20)]);
    assert!(app.list_related_profiles(me, RelationKind::Disliked, 0, 0).await.unwrap().is_empty());
}

async fn config_scenario(app: AppState) {
    let uuid = Uuid::now_v7();
    assert!(app.get_config(uuid).await.unwrap_err().is_not_found());

    app.save_config(&UserConfig::empty(uuid)).await.unwrap();
    assert_eq!(app.get_config(uuid).await.unwrap(), UserConfig::empty(uuid));
    assert!(app.get_matches(uuid, 0).await.unwrap_err().is_not_found());

    let mut full = config(1, Gender::Male, Gender::Any, &[1, 3]);
    full.uuid = uuid;
    full.settings = Some(Settings { theme: 12 });
    app.save_config(&full).await.unwrap();
    assert_eq!(app.get_config(uuid).await.unwrap(), full);
}

#[tokio::test]
async fn region_overlap_memory() {
    region_scenario(memory_app()).await;
}

#[tokio::test]
async fn region_overlap_sqlite() {
    region_scenario(sqlite_app().await).await;
}

#[tokio::test]
async fn relations_exclude_memory() {
    exclusion_scenario(memory_app()).await;
}

#[tokio::test]
async fn relations_exclude_sqlite() {
    exclusion_scenario(sqlite_app().await).await;
}

#[tokio::test]
async fn related_pages_memory() {
    pagination_scenario(memory_app()).await;
}

#[tokio::test]
async fn related_pages_sqlite() {
    pagination_scenario(sqlite_app().await).await;
}

#[tokio::test]
async fn configs_memory() {
    config_scenario(memory_app()).await;
}

#[tokio::test]
async fn configs_sqlite() {
    config_scenario(sqlite_app().await).await;
}

#[tokio::test]
async fn super_likes_exclude_too() {
    let app = memory_app();
    app.save_config(&config(1, Gender::Any, Gender::Any, &[])).await.unwrap();
    app.save_config(&config(2, Gender::Any, Gender::Any, &[])).await.unwrap();
    app.save_config(&config(3, Gender::Any, Gender::Any, &[])).await.unwrap();

    app.relate(id(1), id(3), RelationKind::SuperLiked).await.unwrap();
    assert_eq!(ids(&app.get_matches(id(1), 0).await.unwrap()), vec![id(2)]);
}

#[tokio::test]
async fn self_relation_is_invalid() {
    let app = memory_app();
    let err = app.relate(id(1), id(1), RelationKind::Liked).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn zero_count_uses_configured_default() {
    let config_with_limit = Config { match_limit: 3, ..Config::default() };
    let app = AppState::new(Arc::new(MemoryStore::new()), Arc::new(NoopChatStore), &config_with_limit);
    for n in 1..=6 {
        app.save_config(&config(n, Gender::Any, Gender::Any, &[])).await.unwrap();
    }

    assert_eq!(ids(&app.get_matches(id(1), 0).await.unwrap()), vec![id(2), id(3), id(4)]);
    assert_eq!(app.get_matches(id(1), 5).await.unwrap().len(), 5);
}

#[tokio::test]
async fn zero_page_size_uses_configured_default() {
    logging::init();
    let small_pages = Config { match_limit: 2, ..Config::default() };
    let app = AppState::new(Arc::new(MemoryStore::new()), Arc::new(NoopChatStore), &small_pages);
    app.save_config(&config(100, Gender::Any, Gender::Any, &[])).await.unwrap();
    for n in 1..=3 {
        app.save_config(&config(n, Gender::Any, Gender::Any, &[])).await.unwrap();
        app.relate(id(100), id(n), RelationKind::Disliked).await.unwrap();
    }

    let first = app.list_related_profiles(id(100), RelationKind::Disliked, 0, 0).await.unwrap();
    assert_eq!(ids(&first), vec![id(1), id(2)]);
    let rest = app.list_related_profiles(id(100), RelationKind::Disliked, 0, 2).await.unwrap();
    assert_eq!(ids(&rest), vec![id(3)]);
    // the ledger itself still reads 0 as unbounded
    assert_eq!(app.ledger().list_by_kind(id(100), RelationKind::Disliked, 0, 0).await.unwrap().len(), 3);
}

#[tokio::test]
async fn zero_match_limit_in_config_still_matches() {
    logging::init();
    let zero = Config { match_limit: 0, ..Config::default() };
    let app = AppState::new(Arc::new(MemoryStore::new()), Arc::new(NoopChatStore), &zero);
    for n in 1..=3 {
        app.save_config(&config(n, Gender::Any, Gender::Any, &[])).await.unwrap();
    }

    assert_eq!(ids(&app.get_matches(id(1), 0).await.unwrap()), vec![id(2), id(3)]);
}

#[tokio::test]
async fn sqlite_pool_prefilters_but_engine_decides() {
    let app = sqlite_app().await;
    let mut young = config(2, Gender::Female, Gender::Any, &[]);
    young.personal.as_mut().unwrap().age = 18;
    app.save_config(&config(1, Gender::Male, Gender::Female, &[])).await.unwrap();
    app.save_config(&young).await.unwrap();
    app.save_config(&config(3, Gender::Female, Gender::Any, &[])).await.unwrap();
    app.save_config(&config(4, Gender::Male, Gender::Any, &[])).await.unwrap();

    assert_eq!(ids(&app.get_matches(id(1), 10).await.unwrap()), vec![id(3)]);
}

#[tokio::test]
async fn regions_are_listed_by_id() {
    logging::init();
    let store = MemoryStore::new();
    store.add_region(Region { id: 2, name: "Vake".into(), description: String::new() }).await;
    store.add_region(Region { id: 1, name: "Saburtalo".into(), description: "north".into() }).await;
    let app = AppState::new(Arc::new(store), Arc::new(NoopChatStore), &Config::default());

    let names: Vec<String> = app.get_regions().await.unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["Saburtalo", "Vake"]);
}

/// Serves everything from memory except the candidate pool.
struct BrokenPool(MemoryStore);

#[async_trait::async_trait]
impl Storage for BrokenPool {
    async fn save_config(&self, config: &UserConfig) -> AppResult<()> {
        self.0.save_config(config).await
    }

    async fn get_config(&self, uuid: Uuid) -> AppResult<UserConfig> {
        self.0.get_config(uuid).await
    }

    async fn get_profile(&self, uuid: Uuid) -> AppResult<Profile> {
        self.0.get_profile(uuid).await
    }

    async fn get_profiles(&self, ids: &[Uuid]) -> AppResult<Vec<Profile>> {
        self.0.get_profiles(ids).await
    }

    async fn get_candidate_pool(&self, requester: Uuid, _criteria: &SearchCriteria) -> AppResult<CandidatePool> {
        Err(std::io::Error::other("connection reset")).store_ctx("get_candidate_pool", requester)
    }

    async fn get_regions(&self) -> AppResult<Vec<Region>> {
        self.0.get_regions().await
    }

    async fn upsert_relation(&self, relation: &Relation) -> AppResult<()> {
        self.0.upsert_relation(relation).await
    }

    async fn list_related(&self, actor: Uuid, kind: RelationKind, limit: usize, offset: usize) -> AppResult<Vec<Uuid>> {
        self.0.list_related(actor, kind, limit, offset).await
    }

    async fn resolved_targets(&self, actor: Uuid) -> AppResult<HashSet<Uuid>> {
        self.0.resolved_targets(actor).await
    }
}

#[tokio::test]
async fn pool_failure_aborts_the_whole_call() {
    logging::init();
    let app = AppState::new(Arc::new(BrokenPool(MemoryStore::new())), Arc::new(NoopChatStore), &Config::default());
    app.save_config(&config(1, Gender::Any, Gender::Any, &[])).await.unwrap();
    app.save_config(&config(2, Gender::Any, Gender::Any, &[])).await.unwrap();

    let err = app.get_matches(id(1), 10).await.unwrap_err();
    let AppError::Store { op, key, .. } = err else {
        panic!("expected a store failure, got {err:?}");
    };
    assert_eq!(op, "get_candidate_pool");
    assert_eq!(key, id(1).to_string());
}
