//! Item state container.
//!
//! [`ItemStore`] holds the items of the collection currently open, the sort
//! settings applied to them and the undo slot for the last deletion.
//!
//! Opening another collection bumps a request generation; responses that
//! arrive for an older generation are dropped instead of overwriting the
//! newer list. Undo deadlines are checked against the injected clock, and a
//! background timer clears the slot once the window has passed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mockable::Clock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::ports::{ItemRepository, ItemRepositoryError};
use crate::domain::{
    Collection, CollectionId, DEFAULT_UNDO_WINDOW, DeletionToken, Error, FetchOutcome, Item,
    ItemData, ItemId, NewItem, SortSettings, UndoSlot, filter_items, sort_items,
};

/// Snapshot of the open collection's items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsState {
    /// Collection whose items are loaded.
    pub current: Option<Collection>,
    /// Items newest first, as fetched.
    pub items: Vec<Item>,
    pub sort: SortSettings,
    pub undo: UndoSlot,
    pub loading: bool,
    /// Most recent remote failure, cleared by the next successful fetch.
    pub last_error: Option<Error>,
}

impl ItemsState {
    fn is_current(&self, collection_id: &CollectionId) -> bool {
        self.current
            .as_ref()
            .is_none_or(|current| current.id == *collection_id)
    }
}

/// Item state container backed by an [`ItemRepository`].
#[derive(Clone)]
pub struct ItemStore {
    repo: Arc<dyn ItemRepository>,
    clock: Arc<dyn Clock>,
    undo_window: Duration,
    state: Arc<watch::Sender<ItemsState>>,
    generation: Arc<AtomicU64>,
}

impl ItemStore {
    /// Create a store with the default five second undo window.
    pub fn new(repo: Arc<dyn ItemRepository>, clock: Arc<dyn Clock>) -> Self {
        Self::with_undo_window(repo, clock, DEFAULT_UNDO_WINDOW)
    }

    /// Create a store with a custom undo window.
    pub fn with_undo_window(
        repo: Arc<dyn ItemRepository>,
        clock: Arc<dyn Clock>,
        undo_window: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ItemsState::default());
        Self {
            repo,
            clock,
            undo_window,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ItemsState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ItemsState> {
        self.state.subscribe()
    }

    /// Configured undo window.
    pub fn undo_window(&self) -> Duration {
        self.undo_window
    }

    /// Open `collection`, or close the current one with `None`.
    ///
    /// Items, sort settings and any pending undo are dropped.
    pub fn set_current_collection(&self, collection: Option<Collection>) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.state.send_replace(ItemsState {
            current: collection,
            ..ItemsState::default()
        });
    }

    /// Load the items of `collection_id`, newest first.
    ///
    /// A collection other than the open one is not fetched at all.
    pub async fn fetch_items(&self, collection_id: &CollectionId) -> Result<FetchOutcome, Error> {
        if !self.state.borrow().is_current(collection_id) {
            debug!(%collection_id, "ignoring item fetch for a closed collection");
            return Ok(FetchOutcome::Stale);
        }
        let generation = self.generation.load(Ordering::Acquire);
        self.state.send_modify(|state| state.loading = true);
        let result = self.repo.list_for_collection(collection_id).await;

        if self.generation.load(Ordering::Acquire) != generation {
            debug!(%collection_id, "discarding stale item list");
            return Ok(FetchOutcome::Stale);
        }

        let items = result.map_err(|err| self.fail("fetch items", err))?;
        self.state.send_modify(|state| {
            state.items = items;
            state.loading = false;
            state.last_error = None;
        });
        Ok(FetchOutcome::Applied)
    }

    /// Insert an item and put it first when its collection is open.
    pub async fn create(&self, collection_id: &CollectionId, data: ItemData) -> Result<Item, Error> {
        let new_item = NewItem {
            collection_id: *collection_id,
            data,
        };
        let created = self
            .repo
            .insert(&new_item)
            .await
            .map_err(|err| self.fail("create item", err))?;
        self.state.send_if_modified(|state| {
            if state.current.as_ref().is_some_and(|c| c.id == created.collection_id) {
                state.items.insert(0, created.clone());
                true
            } else {
                false
            }
        });
        Ok(created)
    }

    /// Replace an item's data and update it in place.
    pub async fn update(&self, id: &ItemId, data: ItemData) -> Result<Item, Error> {
        let updated = self
            .repo
            .update(id, &data)
            .await
            .map_err(|err| self.fail("update item", err))?;
        self.state.send_modify(|state| {
            if let Some(slot) = state.items.iter_mut().find(|item| item.id == updated.id) {
                *slot = updated.clone();
            }
        });
        Ok(updated)
    }

    /// Delete an item remotely, then hold it for undo.
    ///
    /// Returns whether the item was in the snapshot and can be undone.
    pub async fn delete(&self, id: &ItemId) -> Result<bool, Error> {
        self.repo
            .delete(id)
            .await
            .map_err(|err| self.fail("delete item", err))?;

        let now = self.clock.utc();
        let window = self.undo_window;
        let mut token = None;
        self.state.send_modify(|state| {
            if let Some(index) = state.items.iter().position(|item| item.id == *id) {
                let removed = state.items.remove(index);
                token = Some(state.undo.record(removed, now, window));
            }
        });
        if let Some(token) = token {
            self.schedule_expiry(token);
        }
        Ok(token.is_some())
    }

    fn schedule_expiry(&self, token: DeletionToken) {
        let state = Arc::downgrade(&self.state);
        let window = self.undo_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            if state.send_if_modified(|current| current.undo.expire(token)) {
                debug!(?token, "undo window elapsed");
            }
        });
    }

    /// Restore the last deleted item if its undo window is still open.
    ///
    /// Returns `Ok(None)` when nothing can be undone. A failed restore is
    /// returned as an error and the slot stays cleared.
    pub async fn undo_delete(&self) -> Result<Option<Item>, Error> {
        let now = self.clock.utc();
        let mut taken = None;
        self.state.send_if_modified(|state| {
            let before = matches!(state.undo, UndoSlot::Pending(_));
            taken = state.undo.take_for_undo(now);
            before
        });
        let Some(item) = taken else {
            return Ok(None);
        };

        let restored = self
            .repo
            .restore(&item)
            .await
            .map_err(|err| self.fail("restore item", err))?;
        info!(item_id = %restored.id, "deleted item restored");
        self.state.send_if_modified(|state| {
            if !state.current.as_ref().is_some_and(|c| c.id == restored.collection_id) {
                return false;
            }
            let index = state
                .items
                .iter()
                .position(|item| item.created_at < restored.created_at)
                .unwrap_or(state.items.len());
            state.items.insert(index, restored.clone());
            true
        });
        Ok(Some(restored))
    }

    /// Dismiss the pending deletion. Returns whether anything was pending.
    ///
    /// An entry whose window has passed but whose timer has not fired yet
    /// counts as nothing pending.
    pub fn clear_deleted_slot(&self) -> bool {
        let now = self.clock.utc();
        let mut dismissed = false;
        self.state.send_if_modified(|state| {
            let before = matches!(state.undo, UndoSlot::Pending(_));
            dismissed = state.undo.clear(now);
            before
        });
        dismissed
    }

    /// Deleted item still restorable right now, if any.
    pub fn pending_undo(&self) -> Option<Item> {
        let now = self.clock.utc();
        self.state
            .borrow()
            .undo
            .pending(now)
            .map(|pending| pending.item.clone())
    }

    /// Change how [`ItemStore::sorted_items`] orders the snapshot.
    pub fn set_sort(&self, sort: SortSettings) {
        self.state.send_modify(|state| state.sort = sort);
    }

    /// Snapshot items ordered by the active sort settings.
    pub fn sorted_items(&self) -> Vec<Item> {
        let state = self.state.borrow();
        let schema = state.current.as_ref().map(|collection| &collection.schema);
        sort_items(&state.items, schema, &state.sort)
    }

    /// Sorted items whose values contain `query`.
    pub fn visible_items(&self, query: &str) -> Vec<Item> {
        filter_items(&self.sorted_items(), query)
    }

    fn fail(&self, operation: &'static str, error: ItemRepositoryError) -> Error {
        warn!(operation, error = %error, kind = error.kind(), "item request failed");
        let mapped = map_repository_error(error);
        self.state.send_modify(|state| {
            state.loading = false;
            state.last_error = Some(mapped.clone());
        });
        mapped
    }
}

fn map_repository_error(error: ItemRepositoryError) -> Error {
    match error {
        ItemRepositoryError::Unauthorized { .. } => Error::unauthorized(error.to_string()),
        ItemRepositoryError::NotFound { .. } => Error::not_found(error.to_string()),
        ItemRepositoryError::Conflict { .. } => Error::conflict(error.to_string()),
        ItemRepositoryError::Rejected { .. } => Error::invalid_request(error.to_string()),
        ItemRepositoryError::Timeout { .. } | ItemRepositoryError::Transport { .. } => {
            Error::service_unavailable(error.to_string())
        }
        ItemRepositoryError::Decode { .. } => Error::internal(error.to_string()),
    }
}

#[cfg(test)]
#[path = "item_service_tests.rs"]
mod tests;
