//! Tests for the collection state container.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rstest::{fixture, rstest};
use tokio::sync::watch;

use super::*;
use crate::domain::ports::MockCollectionRepository;
use crate::domain::{ErrorCode, Field, FieldType, User};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

#[fixture]
fn owner() -> UserId {
    UserId::random()
}

fn signed_in(owner: &UserId) -> watch::Receiver<AuthState> {
    let (_tx, rx) = watch::channel(AuthState {
        user: Some(User {
            id: owner.clone(),
            email: None,
        }),
        initialized: true,
        loading: false,
    });
    rx
}

fn signed_out() -> watch::Receiver<AuthState> {
    let (_tx, rx) = watch::channel(AuthState::default());
    rx
}

fn schema() -> Schema {
    Schema::new(vec![Field::new("Title", FieldType::Text, true)])
}

fn collection(owner: &UserId, name: &str, minutes: i64, is_favorite: bool) -> Collection {
    Collection {
        id: CollectionId::random(),
        name: name.to_owned(),
        schema: schema(),
        color: DEFAULT_COLOR.to_owned(),
        icon: DEFAULT_ICON.to_owned(),
        is_favorite,
        created_at: base_time() + TimeDelta::minutes(minutes),
        owner: owner.clone(),
    }
}

fn store(repo: MockCollectionRepository, auth: watch::Receiver<AuthState>) -> CollectionStore {
    CollectionStore::new(Arc::new(repo), auth)
}

#[rstest]
#[tokio::test]
async fn fetch_list_keeps_backend_order(owner: UserId) {
    let listed = vec![
        collection(&owner, "Books", 0, true),
        collection(&owner, "Films", 5, false),
    ];
    let expected = listed.clone();
    let expected_owner = owner.clone();
    let mut repo = MockCollectionRepository::new();
    repo.expect_list_for_user()
        .withf(move |id| *id == expected_owner)
        .times(1)
        .return_once(move |_| Ok(listed));

    let store = store(repo, signed_in(&owner));
    let outcome = store.fetch_list().await.expect("fetch succeeds");

    assert_eq!(outcome, FetchOutcome::Applied);
    let state = store.snapshot();
    assert_eq!(state.collections, expected);
    assert!(!state.loading);
}

#[rstest]
#[tokio::test]
async fn fetch_list_without_user_clears_list() {
    let store = store(MockCollectionRepository::new(), signed_out());
    let outcome = store.fetch_list().await.expect("no remote call");
    assert_eq!(outcome, FetchOutcome::Applied);
    assert!(store.snapshot().collections.is_empty());
}

#[rstest]
#[tokio::test]
async fn fetch_failure_is_recorded_and_returned(owner: UserId) {
    let mut repo = MockCollectionRepository::new();
    repo.expect_list_for_user()
        .return_once(|_| Err(CollectionRepositoryError::transport("connection reset")));

    let store = store(repo, signed_in(&owner));
    let err = store.fetch_list().await.expect_err("failure surfaces");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    let state = store.snapshot();
    assert_eq!(state.last_error, Some(err));
    assert!(!state.loading);
}

#[rstest]
#[tokio::test]
async fn create_without_user_is_unauthorized() {
    let store = store(MockCollectionRepository::new(), signed_out());
    let err = store
        .create(NewCollectionRequest::new("Books", schema()))
        .await
        .expect_err("needs a user");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert!(!store.snapshot().loading);
}

#[rstest]
#[case("  ", schema(), "Collection name is required")]
#[case("Books", Schema::default(), "Collection must have at least one field")]
#[tokio::test]
async fn create_validates_name_and_schema(
    owner: UserId,
    #[case] name: &str,
    #[case] schema: Schema,
    #[case] message: &str,
) {
    let store = store(MockCollectionRepository::new(), signed_in(&owner));
    let err = store
        .create(NewCollectionRequest::new(name, schema))
        .await
        .expect_err("validation fails");
    assert_eq!(err.message(), message);
}

#[rstest]
#[tokio::test]
async fn create_prepends_with_defaults(owner: UserId) {
    let existing = collection(&owner, "Films", 0, false);
    let listed = vec![existing.clone()];
    let created = collection(&owner, "Books", 10, false);
    let returned = created.clone();
    let mut repo = MockCollectionRepository::new();
    repo.expect_list_for_user().return_once(move |_| Ok(listed));
    repo.expect_insert()
        .withf(|new| new.name == "Books" && new.color == DEFAULT_COLOR && new.icon == DEFAULT_ICON)
        .times(1)
        .return_once(move |_| Ok(returned));

    let store = store(repo, signed_in(&owner));
    store.fetch_list().await.expect("fetch");
    store
        .create(NewCollectionRequest::new(" Books ", schema()))
        .await
        .expect("create");

    assert_eq!(store.snapshot().collections, vec![created, existing]);
}

#[rstest]
#[tokio::test]
async fn toggle_favorite_moves_collection_to_front(owner: UserId) {
    let newest = collection(&owner, "Newest", 30, false);
    let middle = collection(&owner, "Middle", 20, false);
    let oldest = collection(&owner, "Oldest", 10, false);
    let listed = vec![newest.clone(), middle.clone(), oldest.clone()];
    let stored = middle.clone();
    let mut favourite = middle.clone();
    favourite.is_favorite = true;
    let returned = favourite.clone();

    let mut repo = MockCollectionRepository::new();
    repo.expect_list_for_user().return_once(move |_| Ok(listed));
    repo.expect_find_by_id()
        .times(1)
        .return_once(move |_| Ok(Some(stored)));
    repo.expect_update()
        .withf(|_, patch| patch.is_favorite == Some(true) && patch.name.is_none())
        .times(1)
        .return_once(move |_, _| Ok(returned));

    let store = store(repo, signed_in(&owner));
    store.fetch_list().await.expect("fetch");
    store.toggle_favorite(&middle.id).await.expect("toggle");

    let names: Vec<_> = store
        .snapshot()
        .collections
        .into_iter()
        .map(|collection| collection.name)
        .collect();
    assert_eq!(names, ["Middle", "Newest", "Oldest"]);
}

#[rstest]
#[tokio::test]
async fn toggle_favorite_on_missing_record_is_not_found(owner: UserId) {
    let mut repo = MockCollectionRepository::new();
    repo.expect_find_by_id().return_once(|_| Ok(None));
    repo.expect_update().never();

    let store = store(repo, signed_in(&owner));
    let err = store
        .toggle_favorite(&CollectionId::random())
        .await
        .expect_err("missing");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn delete_failure_keeps_snapshot(owner: UserId) {
    let kept = collection(&owner, "Books", 0, false);
    let listed = vec![kept.clone()];
    let mut repo = MockCollectionRepository::new();
    repo.expect_list_for_user().return_once(move |_| Ok(listed));
    repo.expect_delete()
        .return_once(|_| Err(CollectionRepositoryError::unauthorized("jwt expired")));

    let store = store(repo, signed_in(&owner));
    store.fetch_list().await.expect("fetch");
    let err = store.delete(&kept.id).await.expect_err("rejected");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert_eq!(store.snapshot().collections, vec![kept]);
}

#[rstest]
#[tokio::test]
async fn update_replaces_record_in_place(owner: UserId) {
    let first = collection(&owner, "Books", 10, false);
    let second = collection(&owner, "Films", 0, false);
    let listed = vec![first.clone(), second.clone()];
    let mut renamed = second.clone();
    renamed.name = "Movies".to_owned();
    let returned = renamed.clone();
    let mut repo = MockCollectionRepository::new();
    repo.expect_list_for_user().return_once(move |_| Ok(listed));
    repo.expect_update().return_once(move |_, _| Ok(returned));

    let store = store(repo, signed_in(&owner));
    store.fetch_list().await.expect("fetch");
    let patch = CollectionPatch {
        name: Some("Movies".to_owned()),
        ..CollectionPatch::default()
    };
    store.update(&second.id, patch).await.expect("update");

    assert_eq!(store.snapshot().collections, vec![first, renamed]);
}

/// Repository whose listing blocks until the test releases it.
struct GatedRepository {
    started: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    release: tokio::sync::Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    listed: Vec<Collection>,
}

#[async_trait::async_trait]
impl CollectionRepository for GatedRepository {
    async fn list_for_user(
        &self,
        _owner: &UserId,
    ) -> Result<Vec<Collection>, CollectionRepositoryError> {
        let started = self.started.lock().ok().and_then(|mut slot| slot.take());
        if let Some(started) = started {
            let _ = started.send(());
        }
        if let Some(release) = self.release.lock().await.take() {
            let _ = release.await;
        }
        Ok(self.listed.clone())
    }

    async fn find_by_id(
        &self,
        _id: &CollectionId,
    ) -> Result<Option<Collection>, CollectionRepositoryError> {
        Ok(None)
    }

    async fn insert(
        &self,
        _collection: &NewCollection,
    ) -> Result<Collection, CollectionRepositoryError> {
        Err(CollectionRepositoryError::rejected("read only"))
    }

    async fn update(
        &self,
        _id: &CollectionId,
        _patch: &CollectionPatch,
    ) -> Result<Collection, CollectionRepositoryError> {
        Err(CollectionRepositoryError::rejected("read only"))
    }

    async fn delete(&self, _id: &CollectionId) -> Result<(), CollectionRepositoryError> {
        Err(CollectionRepositoryError::rejected("read only"))
    }
}

#[rstest]
#[tokio::test]
async fn reset_discards_in_flight_fetch(owner: UserId) {
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel();
    let repo = GatedRepository {
        started: std::sync::Mutex::new(Some(started_tx)),
        release: tokio::sync::Mutex::new(Some(release_rx)),
        listed: vec![collection(&owner, "Books", 0, false)],
    };

    let store = CollectionStore::new(Arc::new(repo), signed_in(&owner));
    let fetching = tokio::spawn({
        let store = store.clone();
        async move { store.fetch_list().await }
    });
    started_rx.await.expect("fetch started");
    store.reset();
    release_tx.send(()).expect("fetch still waiting");

    let outcome = fetching.await.expect("join").expect("fetch");
    assert_eq!(outcome, FetchOutcome::Stale);
    assert!(store.snapshot().collections.is_empty());
}
