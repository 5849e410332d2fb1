//! End-to-end checks of the containers against the in-process backend.

use std::sync::Arc;
use std::time::Duration;

use collector::domain::{
    ErrorCode, Field, FieldType, ItemData, NewCollectionRequest, Schema, UndoSlot,
};
use collector::outbound::memory::InMemoryBackend;
use collector::test_support::MutableClock;
use collector::Collector;
use rstest::{fixture, rstest};
use serde_json::json;

struct Setup {
    app: Collector,
    backend: InMemoryBackend,
    clock: Arc<MutableClock>,
}

#[fixture]
fn setup() -> Setup {
    let clock = Arc::new(MutableClock::default());
    let backend = InMemoryBackend::new(clock.clone());
    let app = Collector::new(backend.clone().into(), clock.clone(), Duration::from_secs(5));
    Setup {
        app,
        backend,
        clock,
    }
}

fn books() -> NewCollectionRequest {
    NewCollectionRequest::new(
        "Books",
        Schema::new(vec![
            Field::new("Title", FieldType::Text, true),
            Field::new("Qty", FieldType::Number, false),
        ]),
    )
}

fn titled(title: &str) -> ItemData {
    let mut data = ItemData::new();
    data.insert("Title".to_owned(), json!(title));
    data
}

async fn sign_up(app: &Collector, email: &str) {
    app.auth.sign_up(email, "secret1").await.expect("sign up");
    app.sync_user().await.expect("sync");
}

#[rstest]
#[tokio::test]
async fn users_only_see_their_own_collections(setup: Setup) {
    let Setup { app, .. } = setup;
    app.start().await.expect("start");

    sign_up(&app, "ada@example.com").await;
    app.collections.create(books()).await.expect("create");
    assert_eq!(app.collections.snapshot().collections.len(), 1);

    app.auth.sign_out().await.expect("sign out");
    app.sync_user().await.expect("sync");
    assert!(app.collections.snapshot().collections.is_empty());

    sign_up(&app, "grace@example.com").await;
    assert!(app.collections.snapshot().collections.is_empty());

    app.auth.sign_out().await.expect("sign out");
    app.auth
        .sign_in("ada@example.com", "secret1")
        .await
        .expect("sign in");
    app.sync_user().await.expect("sync");
    let names: Vec<_> = app
        .collections
        .snapshot()
        .collections
        .into_iter()
        .map(|collection| collection.name)
        .collect();
    assert_eq!(names, ["Books"]);
}

#[rstest]
#[tokio::test]
async fn restored_item_survives_a_reload(setup: Setup) {
    let Setup { app, clock, .. } = setup;
    sign_up(&app, "ada@example.com").await;
    let collection = app.collections.create(books()).await.expect("create");
    app.open_collection(&collection.id).await.expect("open");
    let item = app
        .items
        .create(&collection.id, titled("Dune"))
        .await
        .expect("add");

    app.items.delete(&item.id).await.expect("delete");
    clock.advance_seconds(3);
    let restored = app.items.undo_delete().await.expect("undo");
    assert_eq!(restored.as_ref(), Some(&item));

    app.items
        .fetch_items(&collection.id)
        .await
        .expect("reload");
    assert_eq!(app.items.snapshot().items, vec![item]);
}

#[rstest]
#[tokio::test]
async fn outage_is_surfaced_and_snapshot_kept(setup: Setup) {
    let Setup { app, backend, .. } = setup;
    sign_up(&app, "ada@example.com").await;
    let collection = app.collections.create(books()).await.expect("create");

    backend.simulate_outage("connection refused");
    let err = app
        .collections
        .toggle_favorite(&collection.id)
        .await
        .expect_err("backend down");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);

    let state = app.collections.snapshot();
    assert_eq!(state.collections, vec![collection]);
    assert_eq!(state.last_error, Some(err));
    assert!(!state.loading);

    backend.restore_service();
    app.collections.fetch_list().await.expect("fetch");
    assert!(app.collections.snapshot().last_error.is_none());
}

#[rstest]
#[tokio::test]
async fn deleting_a_collection_removes_its_items(setup: Setup) {
    let Setup { app, backend, .. } = setup;
    sign_up(&app, "ada@example.com").await;
    let collection = app.collections.create(books()).await.expect("create");
    app.open_collection(&collection.id).await.expect("open");
    for title in ["Dune", "Emma"] {
        app.items
            .create(&collection.id, titled(title))
            .await
            .expect("add");
    }
    assert_eq!(backend.item_count(), 2);

    app.delete_collection(&collection.id).await.expect("delete");
    assert_eq!(backend.item_count(), 0);
    assert!(app.collections.snapshot().collections.is_empty());
    assert!(app.items.snapshot().current.is_none());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn undo_slot_expires_on_its_own(setup: Setup) {
    let Setup { app, .. } = setup;
    sign_up(&app, "ada@example.com").await;
    let collection = app.collections.create(books()).await.expect("create");
    app.open_collection(&collection.id).await.expect("open");
    let item = app
        .items
        .create(&collection.id, titled("Dune"))
        .await
        .expect("add");
    app.items.delete(&item.id).await.expect("delete");

    let mut updates = app.items.subscribe();
    tokio::time::advance(Duration::from_secs(6)).await;
    let cleared = updates
        .wait_for(|state| state.undo == UndoSlot::Cleared)
        .await
        .map(|_| ());
    assert!(cleared.is_ok());
    assert!(!app.items.clear_deleted_slot());
}
