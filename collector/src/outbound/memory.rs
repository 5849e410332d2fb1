//! Process-local backend implementing every port.
//!
//! Behaves like the hosted backend as far as the containers can observe:
//! accounts with passwords, one current session, rows scoped to their owner,
//! newest-first ordering and cascade deletion of a collection's items.
//! Nothing is persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use mockable::Clock;
use tokio::sync::broadcast;
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::ports::{
    AuthChange, AuthEvent, AuthGateway, AuthGatewayError, CollectionRepository,
    CollectionRepositoryError, ItemRepository, ItemRepositoryError,
};
use crate::domain::{
    Collection, CollectionId, CollectionPatch, Credentials, Item, ItemData, ItemId, NewCollection,
    NewItem, Session, User, UserId, sort_for_display,
};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

struct Account {
    user: User,
    password: Zeroizing<String>,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    collections: Vec<Collection>,
    items: Vec<Item>,
    /// Set to make the next call of any kind fail with this message.
    outage: Option<String>,
}

impl Tables {
    fn signed_in(&self) -> Option<&UserId> {
        self.session.as_ref().map(|session| &session.user.id)
    }

    fn owns_collection(&self, user: &UserId, collection_id: &CollectionId) -> bool {
        self.collections
            .iter()
            .any(|collection| collection.id == *collection_id && collection.owner == *user)
    }

    fn item_owner_check(&self, user: &UserId, item_id: &ItemId) -> Result<(), ItemRepositoryError> {
        let item = self
            .items
            .iter()
            .find(|item| item.id == *item_id)
            .ok_or_else(|| ItemRepositoryError::not_found(item_id.to_string()))?;
        if self.owns_collection(user, &item.collection_id) {
            Ok(())
        } else {
            Err(ItemRepositoryError::unauthorized("item belongs to another user"))
        }
    }
}

/// In-memory stand-in for the hosted backend.
#[derive(Clone)]
pub struct InMemoryBackend {
    tables: Arc<Mutex<Tables>>,
    changes: broadcast::Sender<AuthChange>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBackend {
    /// Empty backend timestamping rows with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            changes,
            clock,
        }
    }

    /// Make every following call fail as unreachable until [`Self::restore_service`].
    pub fn simulate_outage(&self, message: impl Into<String>) {
        self.lock().outage = Some(message.into());
    }

    /// End a simulated outage.
    pub fn restore_service(&self) {
        self.lock().outage = None;
    }

    /// Number of stored items across all collections.
    pub fn item_count(&self) -> usize {
        self.lock().items.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: AuthEvent, session: Option<Session>) {
        if self.changes.send(AuthChange::new(event, session)).is_err() {
            debug!(?event, "no auth change subscribers");
        }
    }

    fn issue_session(&self, user: &User) -> Session {
        Session {
            access_token: format!("memory-{}", uuid::Uuid::new_v4()),
            refresh_token: None,
            expires_at: None,
            user: user.clone(),
        }
    }

    fn collection_guard(&self) -> Result<(MutexGuard<'_, Tables>, UserId), CollectionRepositoryError> {
        let tables = self.lock();
        if let Some(message) = &tables.outage {
            return Err(CollectionRepositoryError::transport(message.clone()));
        }
        let user = tables
            .signed_in()
            .cloned()
            .ok_or_else(|| CollectionRepositoryError::unauthorized("no active session"))?;
        Ok((tables, user))
    }

    fn item_guard(&self) -> Result<(MutexGuard<'_, Tables>, UserId), ItemRepositoryError> {
        let tables = self.lock();
        if let Some(message) = &tables.outage {
            return Err(ItemRepositoryError::transport(message.clone()));
        }
        let user = tables
            .signed_in()
            .cloned()
            .ok_or_else(|| ItemRepositoryError::unauthorized("no active session"))?;
        Ok((tables, user))
    }

    fn auth_guard(&self) -> Result<MutexGuard<'_, Tables>, AuthGatewayError> {
        let tables = self.lock();
        match &tables.outage {
            Some(message) => Err(AuthGatewayError::transport(message.clone())),
            None => Ok(tables),
        }
    }
}

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthGatewayError> {
        Ok(self.auth_guard()?.session.clone())
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Session>, AuthGatewayError> {
        let session = {
            let mut tables = self.auth_guard()?;
            let key = credentials.email().to_lowercase();
            if tables.accounts.contains_key(&key) {
                return Err(AuthGatewayError::rejected("User already registered"));
            }
            let user = User {
                id: UserId::random(),
                email: Some(credentials.email().to_owned()),
            };
            let session = self.issue_session(&user);
            tables.accounts.insert(
                key,
                Account {
                    user,
                    password: Zeroizing::new(credentials.password().to_owned()),
                },
            );
            tables.session = Some(session.clone());
            session
        };
        self.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, AuthGatewayError> {
        let session = {
            let mut tables = self.auth_guard()?;
            let account = tables
                .accounts
                .get(&credentials.email().to_lowercase())
                .filter(|account| account.password.as_str() == credentials.password())
                .ok_or_else(|| AuthGatewayError::rejected("Invalid login credentials"))?;
            let session = self.issue_session(&account.user);
            tables.session = Some(session.clone());
            session
        };
        self.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthGatewayError> {
        let result = {
            let mut tables = self.lock();
            tables.session = None;
            match &tables.outage {
                Some(message) => Err(AuthGatewayError::transport(message.clone())),
                None => Ok(()),
            }
        };
        self.publish(AuthEvent::SignedOut, None);
        result
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl CollectionRepository for InMemoryBackend {
    async fn list_for_user(
        &self,
        owner: &UserId,
    ) -> Result<Vec<Collection>, CollectionRepositoryError> {
        let (tables, user) = self.collection_guard()?;
        if user != *owner {
            return Err(CollectionRepositoryError::unauthorized(
                "cannot list another user's collections",
            ));
        }
        let mut collections: Vec<_> = tables
            .collections
            .iter()
            .filter(|collection| collection.owner == *owner)
            .cloned()
            .collect();
        sort_for_display(&mut collections);
        Ok(collections)
    }

    async fn find_by_id(
        &self,
        id: &CollectionId,
    ) -> Result<Option<Collection>, CollectionRepositoryError> {
        let (tables, user) = self.collection_guard()?;
        Ok(tables
            .collections
            .iter()
            .find(|collection| collection.id == *id && collection.owner == user)
            .cloned())
    }

    async fn insert(
        &self,
        collection: &NewCollection,
    ) -> Result<Collection, CollectionRepositoryError> {
        let (mut tables, user) = self.collection_guard()?;
        if user != collection.owner {
            return Err(CollectionRepositoryError::unauthorized(
                "cannot create collections for another user",
            ));
        }
        let stored = Collection {
            id: CollectionId::random(),
            name: collection.name.clone(),
            schema: collection.schema.clone(),
            color: collection.color.clone(),
            icon: collection.icon.clone(),
            is_favorite: false,
            created_at: self.clock.utc(),
            owner: collection.owner.clone(),
        };
        tables.collections.push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        id: &CollectionId,
        patch: &CollectionPatch,
    ) -> Result<Collection, CollectionRepositoryError> {
        let (mut tables, user) = self.collection_guard()?;
        let stored = tables
            .collections
            .iter_mut()
            .find(|collection| collection.id == *id && collection.owner == user)
            .ok_or_else(|| CollectionRepositoryError::not_found(id.to_string()))?;
        patch.apply_to(stored);
        Ok(stored.clone())
    }

    async fn delete(&self, id: &CollectionId) -> Result<(), CollectionRepositoryError> {
        let (mut tables, user) = self.collection_guard()?;
        tables
            .collections
            .retain(|collection| !(collection.id == *id && collection.owner == user));
        if !tables.collections.iter().any(|collection| collection.id == *id) {
            tables.items.retain(|item| item.collection_id != *id);
        }
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for InMemoryBackend {
    async fn list_for_collection(
        &self,
        collection_id: &CollectionId,
    ) -> Result<Vec<Item>, ItemRepositoryError> {
        let (tables, user) = self.item_guard()?;
        if !tables.owns_collection(&user, collection_id) {
            return Ok(Vec::new());
        }
        let mut items: Vec<_> = tables
            .items
            .iter()
            .filter(|item| item.collection_id == *collection_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn insert(&self, item: &NewItem) -> Result<Item, ItemRepositoryError> {
        let (mut tables, user) = self.item_guard()?;
        if !tables.owns_collection(&user, &item.collection_id) {
            return Err(ItemRepositoryError::rejected(format!(
                "collection {} does not exist",
                item.collection_id
            )));
        }
        let stored = Item {
            id: ItemId::random(),
            collection_id: item.collection_id,
            data: item.data.clone(),
            created_at: self.clock.utc(),
        };
        tables.items.push(stored.clone());
        Ok(stored)
    }

    async fn restore(&self, item: &Item) -> Result<Item, ItemRepositoryError> {
        let (mut tables, user) = self.item_guard()?;
        if !tables.owns_collection(&user, &item.collection_id) {
            return Err(ItemRepositoryError::rejected(format!(
                "collection {} does not exist",
                item.collection_id
            )));
        }
        if tables.items.iter().any(|stored| stored.id == item.id) {
            return Err(ItemRepositoryError::conflict(format!(
                "item {} already exists",
                item.id
            )));
        }
        tables.items.push(item.clone());
        Ok(item.clone())
    }

    async fn update(&self, id: &ItemId, data: &ItemData) -> Result<Item, ItemRepositoryError> {
        let (mut tables, user) = self.item_guard()?;
        tables.item_owner_check(&user, id)?;
        let stored = tables
            .items
            .iter_mut()
            .find(|item| item.id == *id)
            .ok_or_else(|| ItemRepositoryError::not_found(id.to_string()))?;
        stored.data = data.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: &ItemId) -> Result<(), ItemRepositoryError> {
        let (mut tables, user) = self.item_guard()?;
        match tables.item_owner_check(&user, id) {
            Ok(()) => {
                tables.items.retain(|item| item.id != *id);
                Ok(())
            }
            Err(ItemRepositoryError::NotFound { .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}
