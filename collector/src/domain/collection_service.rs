//! Collection state container.
//!
//! [`CollectionStore`] keeps the signed-in user's collections in display
//! order and mirrors every successful remote write into its snapshot. Remote
//! failures leave the snapshot untouched and are recorded in
//! [`CollectionsState::last_error`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::ports::{CollectionRepository, CollectionRepositoryError};
use crate::domain::{
    AuthState, Collection, CollectionId, CollectionPatch, DEFAULT_COLOR, DEFAULT_ICON, Error,
    NewCollection, Schema, SchemaDraftError, UserId, sort_for_display,
};

/// Snapshot of the collection list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionsState {
    /// Collections in display order.
    pub collections: Vec<Collection>,
    pub loading: bool,
    /// Most recent remote failure, cleared by the next successful fetch.
    pub last_error: Option<Error>,
}

/// Whether a fetched response was applied to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The store was reset while the request was in flight.
    Stale,
}

/// Input for [`CollectionStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollectionRequest {
    pub name: String,
    pub schema: Schema,
    /// Defaults to [`DEFAULT_COLOR`].
    pub color: Option<String>,
    /// Defaults to [`DEFAULT_ICON`].
    pub icon: Option<String>,
}

impl NewCollectionRequest {
    /// Request with default colour and icon.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            color: None,
            icon: None,
        }
    }
}

/// Collection state container backed by a [`CollectionRepository`].
#[derive(Clone)]
pub struct CollectionStore {
    repo: Arc<dyn CollectionRepository>,
    auth: watch::Receiver<AuthState>,
    state: Arc<watch::Sender<CollectionsState>>,
    generation: Arc<AtomicU64>,
}

impl CollectionStore {
    /// Create a store that scopes requests to the user in `auth`.
    pub fn new(repo: Arc<dyn CollectionRepository>, auth: watch::Receiver<AuthState>) -> Self {
        let (state, _) = watch::channel(CollectionsState::default());
        Self {
            repo,
            auth,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> CollectionsState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<CollectionsState> {
        self.state.subscribe()
    }

    /// Collection with `id` from the snapshot.
    pub fn get(&self, id: &CollectionId) -> Option<Collection> {
        self.state
            .borrow()
            .collections
            .iter()
            .find(|collection| collection.id == *id)
            .cloned()
    }

    fn current_owner(&self) -> Option<UserId> {
        self.auth.borrow().user.as_ref().map(|user| user.id.clone())
    }

    /// Load the current user's collections. Signed out, the list is cleared.
    pub async fn fetch_list(&self) -> Result<FetchOutcome, Error> {
        let Some(owner) = self.current_owner() else {
            self.state.send_modify(|state| {
                state.collections.clear();
                state.loading = false;
            });
            return Ok(FetchOutcome::Applied);
        };

        let generation = self.generation.load(Ordering::Acquire);
        self.state.send_modify(|state| state.loading = true);
        let result = self.repo.list_for_user(&owner).await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(%owner, "discarding stale collection list");
            return Ok(FetchOutcome::Stale);
        }

        let collections = result.map_err(|err| self.fail("fetch collections", err))?;
        self.state.send_modify(|state| {
            state.collections = collections;
            state.loading = false;
            state.last_error = None;
        });
        Ok(FetchOutcome::Applied)
    }

    /// Create a collection owned by the signed-in user and put it first.
    pub async fn create(&self, request: NewCollectionRequest) -> Result<Collection, Error> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(SchemaDraftError::EmptyCollectionName.into());
        }
        if request.schema.is_empty() {
            return Err(SchemaDraftError::NoFields.into());
        }
        let Some(owner) = self.current_owner() else {
            self.state.send_modify(|state| state.loading = false);
            return Err(Error::unauthorized("sign in to create collections"));
        };

        let new_collection = NewCollection {
            owner,
            name: name.to_owned(),
            schema: request.schema,
            color: request.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned()),
            icon: request.icon.unwrap_or_else(|| DEFAULT_ICON.to_owned()),
        };
        self.state.send_modify(|state| state.loading = true);
        let created = self
            .repo
            .insert(&new_collection)
            .await
            .map_err(|err| self.fail("create collection", err))?;

        self.state.send_modify(|state| {
            state.collections.insert(0, created.clone());
            state.loading = false;
        });
        Ok(created)
    }

    /// Apply `patch` remotely and replace the record in place.
    pub async fn update(
        &self,
        id: &CollectionId,
        patch: CollectionPatch,
    ) -> Result<Collection, Error> {
        let updated = self
            .repo
            .update(id, &patch)
            .await
            .map_err(|err| self.fail("update collection", err))?;
        self.replace(&updated);
        Ok(updated)
    }

    /// Delete a collection and drop it from the snapshot.
    pub async fn delete(&self, id: &CollectionId) -> Result<(), Error> {
        self.repo
            .delete(id)
            .await
            .map_err(|err| self.fail("delete collection", err))?;
        self.state
            .send_modify(|state| state.collections.retain(|collection| collection.id != *id));
        Ok(())
    }

    /// Flip the favourite flag of the stored record, then re-sort the list.
    pub async fn toggle_favorite(&self, id: &CollectionId) -> Result<Collection, Error> {
        let stored = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|err| self.fail("load collection", err))?
            .ok_or_else(|| Error::not_found(format!("collection {id} not found")))?;

        let patch = CollectionPatch::favorite(!stored.is_favorite);
        let updated = self
            .repo
            .update(id, &patch)
            .await
            .map_err(|err| self.fail("toggle favourite", err))?;
        self.state.send_modify(|state| {
            if let Some(slot) = state.collections.iter_mut().find(|c| c.id == updated.id) {
                *slot = updated.clone();
            }
            sort_for_display(&mut state.collections);
        });
        Ok(updated)
    }

    /// Forget all collections and discard in-flight fetches.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.state.send_replace(CollectionsState::default());
    }

    fn replace(&self, updated: &Collection) {
        self.state.send_modify(|state| {
            if let Some(slot) = state.collections.iter_mut().find(|c| c.id == updated.id) {
                *slot = updated.clone();
            }
        });
    }

    fn fail(&self, operation: &'static str, error: CollectionRepositoryError) -> Error {
        warn!(operation, error = %error, kind = error.kind(), "collection request failed");
        let mapped = map_repository_error(error);
        self.state.send_modify(|state| {
            state.loading = false;
            state.last_error = Some(mapped.clone());
        });
        mapped
    }
}

fn map_repository_error(error: CollectionRepositoryError) -> Error {
    match error {
        CollectionRepositoryError::Unauthorized { .. } => Error::unauthorized(error.to_string()),
        CollectionRepositoryError::NotFound { .. } => Error::not_found(error.to_string()),
        CollectionRepositoryError::Conflict { .. } => Error::conflict(error.to_string()),
        CollectionRepositoryError::Rejected { .. } => Error::invalid_request(error.to_string()),
        CollectionRepositoryError::Timeout { .. } | CollectionRepositoryError::Transport { .. } => {
            Error::service_unavailable(error.to_string())
        }
        CollectionRepositoryError::Decode { .. } => Error::internal(error.to_string()),
    }
}

#[cfg(test)]
#[path = "collection_service_tests.rs"]
mod tests;
