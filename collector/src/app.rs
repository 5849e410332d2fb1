//! Application wiring: the three state containers over one set of ports.
//!
//! [`Collector`] keeps the containers consistent with each other. When the
//! signed-in user changes, the collection list is reset and reloaded for the
//! new user and any open collection is closed.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::ports::{AuthGateway, CollectionRepository, ItemRepository};
use crate::domain::{
    AuthService, AuthState, Collection, CollectionId, CollectionStore, Error, ItemStore, UserId,
};
use crate::outbound::memory::InMemoryBackend;
use crate::outbound::supabase::SupabaseBackend;

/// Port implementations the containers run against.
#[derive(Clone)]
pub struct Ports {
    pub auth: Arc<dyn AuthGateway>,
    pub collections: Arc<dyn CollectionRepository>,
    pub items: Arc<dyn ItemRepository>,
}

impl From<InMemoryBackend> for Ports {
    fn from(backend: InMemoryBackend) -> Self {
        let shared = Arc::new(backend);
        Self {
            auth: shared.clone(),
            collections: shared.clone(),
            items: shared,
        }
    }
}

impl From<SupabaseBackend> for Ports {
    fn from(backend: SupabaseBackend) -> Self {
        Self {
            auth: backend.auth,
            collections: backend.collections,
            items: backend.items,
        }
    }
}

/// Auth, collection and item containers wired together.
#[derive(Clone)]
pub struct Collector {
    pub auth: AuthService,
    pub collections: CollectionStore,
    pub items: ItemStore,
    sync: UserSync,
}

impl Collector {
    /// Build the containers. Call [`Collector::start`] before use.
    pub fn new(ports: Ports, clock: Arc<dyn Clock>, undo_window: Duration) -> Self {
        let auth = AuthService::new(ports.auth);
        let collections = CollectionStore::new(ports.collections, auth.subscribe());
        let items = ItemStore::with_undo_window(ports.items, clock, undo_window);
        let sync = UserSync {
            synced: Arc::new(Mutex::new(SyncedUser::Never)),
            auth: auth.subscribe(),
            collections: collections.clone(),
            items: items.clone(),
        };
        Self {
            auth,
            collections,
            items,
            sync,
        }
    }

    /// Restore the session, load the user's collections and start following
    /// user changes.
    ///
    /// The returned handle finishes once every [`AuthService`] clone is gone.
    ///
    /// # Errors
    ///
    /// Returns the session lookup or the first collection fetch failure. The
    /// follower is only started once both succeed.
    pub async fn start(&self) -> Result<JoinHandle<()>, Error> {
        self.auth.initialize().await?;
        let updates = self.auth.subscribe();
        self.sync_user().await?;
        Ok(tokio::spawn(follow_user(updates, self.sync.clone())))
    }

    /// Bring the collection and item containers in line with the signed-in
    /// user. Waits for a reload already started by the follower.
    ///
    /// # Errors
    ///
    /// Returns the collection fetch failure when a reload was needed.
    pub async fn sync_user(&self) -> Result<(), Error> {
        self.sync.apply().await
    }

    /// Open the collection with `id` from the loaded list and fetch its items.
    ///
    /// # Errors
    ///
    /// `NotFound` when the list holds no such collection, otherwise the
    /// item fetch failure.
    pub async fn open_collection(&self, id: &CollectionId) -> Result<Collection, Error> {
        let collection = self
            .collections
            .get(id)
            .ok_or_else(|| Error::not_found(format!("collection {id} not found")))?;
        self.items.set_current_collection(Some(collection.clone()));
        self.items.fetch_items(id).await?;
        Ok(collection)
    }

    /// Delete a collection, closing it first when it is open.
    ///
    /// # Errors
    ///
    /// Returns the repository failure; the open collection is kept then.
    pub async fn delete_collection(&self, id: &CollectionId) -> Result<(), Error> {
        self.collections.delete(id).await?;
        let open = self.items.snapshot().current.is_some_and(|c| c.id == *id);
        if open {
            self.items.set_current_collection(None);
        }
        Ok(())
    }
}

/// User the containers were last loaded for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncedUser {
    Never,
    Loaded(Option<UserId>),
}

/// Resets the containers when the user they were loaded for changes.
#[derive(Clone)]
struct UserSync {
    synced: Arc<Mutex<SyncedUser>>,
    auth: watch::Receiver<AuthState>,
    collections: CollectionStore,
    items: ItemStore,
}

impl UserSync {
    async fn apply(&self) -> Result<(), Error> {
        let mut synced = self.synced.lock().await;
        let user = self.auth.borrow().user.as_ref().map(|user| user.id.clone());
        let signed_in = user.is_some();
        let current = SyncedUser::Loaded(user);
        if *synced == current {
            return Ok(());
        }
        debug!(signed_in, "user changed; reloading collections");
        *synced = current;
        self.collections.reset();
        self.items.set_current_collection(None);
        self.collections.fetch_list().await.map(|_| ())
    }
}

async fn follow_user(mut updates: watch::Receiver<AuthState>, sync: UserSync) {
    while updates.changed().await.is_ok() {
        if let Err(err) = sync.apply().await {
            warn!(error = %err, "collection reload failed");
        }
    }
}
