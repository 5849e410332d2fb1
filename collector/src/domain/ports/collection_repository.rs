//! Port for collection persistence.
//!
//! Adapters store collections scoped to their owning user. Listing returns
//! favourites first, then newest first; callers rely on that order and do
//! not re-sort fetched lists.

use async_trait::async_trait;

use crate::domain::{Collection, CollectionId, CollectionPatch, NewCollection, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by collection repository adapters.
    pub enum CollectionRepositoryError {
        /// The session is missing, expired or lacks access to the row.
        Unauthorized { message: String } => "not authorised: {message}",
        /// No collection matched the identifier.
        NotFound { message: String } => "collection not found: {message}",
        /// The write conflicted with stored state.
        Conflict { message: String } => "collection write conflicted: {message}",
        /// The backend refused the request.
        Rejected { message: String } => "collection request rejected: {message}",
        /// The backend did not answer in time.
        Timeout { message: String } => "collection request timed out: {message}",
        /// The backend could not be reached or failed internally.
        Transport { message: String } => "collection backend unavailable: {message}",
        /// The backend answered with rows the adapter could not read.
        Decode { message: String } => "collection rows could not be decoded: {message}",
    }
}

/// Port for reading and writing collections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// All collections owned by `owner`, favourites first then newest first.
    async fn list_for_user(
        &self,
        owner: &UserId,
    ) -> Result<Vec<Collection>, CollectionRepositoryError>;

    /// A single collection, or `None` when it does not exist.
    async fn find_by_id(
        &self,
        id: &CollectionId,
    ) -> Result<Option<Collection>, CollectionRepositoryError>;

    /// Store a new collection and return the stored record.
    async fn insert(
        &self,
        collection: &NewCollection,
    ) -> Result<Collection, CollectionRepositoryError>;

    /// Apply `patch` and return the updated record.
    async fn update(
        &self,
        id: &CollectionId,
        patch: &CollectionPatch,
    ) -> Result<Collection, CollectionRepositoryError>;

    /// Delete a collection together with its items.
    async fn delete(&self, id: &CollectionId) -> Result<(), CollectionRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn not_found_formats_identifier() {
        let id = CollectionId::random();
        let err = CollectionRepositoryError::not_found(id.to_string());
        assert!(err.to_string().contains(&id.to_string()));
        assert_eq!(err.kind(), "not_found");
    }
}
