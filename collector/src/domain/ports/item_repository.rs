//! Port for item persistence.

use async_trait::async_trait;

use crate::domain::{CollectionId, Item, ItemData, ItemId, NewItem};

use super::define_port_error;

define_port_error! {
    /// Errors raised by item repository adapters.
    pub enum ItemRepositoryError {
        /// The session is missing, expired or lacks access to the row.
        Unauthorized { message: String } => "not authorised: {message}",
        /// No item matched the identifier.
        NotFound { message: String } => "item not found: {message}",
        /// The write conflicted with stored state, e.g. a restored id exists.
        Conflict { message: String } => "item write conflicted: {message}",
        /// The backend refused the request.
        Rejected { message: String } => "item request rejected: {message}",
        /// The backend did not answer in time.
        Timeout { message: String } => "item request timed out: {message}",
        /// The backend could not be reached or failed internally.
        Transport { message: String } => "item backend unavailable: {message}",
        /// The backend answered with rows the adapter could not read.
        Decode { message: String } => "item rows could not be decoded: {message}",
    }
}

/// Port for reading and writing items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Items of a collection, newest first.
    async fn list_for_collection(
        &self,
        collection_id: &CollectionId,
    ) -> Result<Vec<Item>, ItemRepositoryError>;

    /// Store a new item; the backend assigns id and creation time.
    async fn insert(&self, item: &NewItem) -> Result<Item, ItemRepositoryError>;

    /// Re-create a previously deleted item keeping its id and creation time.
    async fn restore(&self, item: &Item) -> Result<Item, ItemRepositoryError>;

    /// Replace an item's data and return the updated record.
    async fn update(&self, id: &ItemId, data: &ItemData) -> Result<Item, ItemRepositoryError>;

    /// Delete a single item.
    async fn delete(&self, id: &ItemId) -> Result<(), ItemRepositoryError>;
}
