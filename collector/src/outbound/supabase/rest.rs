//! PostgREST-backed implementations of the collection and item ports.
//!
//! Requests run with the signed-in user's access token so row-level
//! security scopes every query to that user.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::auth::SupabaseAuthGateway;
use super::dto::{ItemDataPatchDto, ItemInsertDto, ItemRowDto, ListRowDto, NewListRowDto};
use super::http::{FailureKind, HttpFailure, SupabaseHttp};
use crate::domain::ports::{
    AuthGatewayError, CollectionRepository, CollectionRepositoryError, ItemRepository,
    ItemRepositoryError,
};
use crate::domain::{
    Collection, CollectionId, CollectionPatch, Item, ItemData, ItemId, NewCollection, NewItem,
    UserId,
};

const RETURN_REPRESENTATION: &str = "return=representation";

/// Table access shared by both repositories.
#[derive(Clone)]
struct Table {
    http: SupabaseHttp,
    auth: Arc<SupabaseAuthGateway>,
    name: String,
}

impl Table {
    fn url(&self, filters: &[(&str, String)]) -> Result<Url, HttpFailure> {
        let mut url = self.http.rest_url(&self.name)?;
        if !filters.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, HttpFailure> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(session_failure)?
            .ok_or_else(|| HttpFailure::unauthorized("no active session"))?;
        Ok(self.http.request(method, url, Some(&token)))
    }

    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, HttpFailure> {
        let body = self.http.send(request).await?;
        serde_json::from_slice(&body).map_err(|error| {
            HttpFailure::decode(format!("invalid rows from {}: {error}", self.name))
        })
    }

    async fn single_row<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        missing: &str,
    ) -> Result<T, HttpFailure> {
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HttpFailure {
                kind: FailureKind::NotFound,
                message: missing.to_owned(),
            })
    }

    async fn delete(&self, id: String) -> Result<(), HttpFailure> {
        let url = self.url(&[("id", format!("eq.{id}"))])?;
        let request = self.request(Method::DELETE, url).await?;
        self.http.send(request).await.map(|_| ())
    }
}

fn session_failure(error: AuthGatewayError) -> HttpFailure {
    let kind = match error {
        AuthGatewayError::Timeout { .. } => FailureKind::Timeout,
        AuthGatewayError::Transport { .. } => FailureKind::Transport,
        _ => FailureKind::Unauthorized,
    };
    HttpFailure {
        kind,
        message: error.to_string(),
    }
}

/// Collections stored in the `lists` table.
pub struct SupabaseCollectionRepository {
    table: Table,
}

impl SupabaseCollectionRepository {
    pub(super) fn new(http: SupabaseHttp, auth: Arc<SupabaseAuthGateway>, table: String) -> Self {
        Self {
            table: Table {
                http,
                auth,
                name: table,
            },
        }
    }

    fn by_id(id: &CollectionId) -> [(&'static str, String); 2] {
        [("select", "*".to_owned()), ("id", format!("eq.{id}"))]
    }
}

#[async_trait]
impl CollectionRepository for SupabaseCollectionRepository {
    async fn list_for_user(
        &self,
        owner: &UserId,
    ) -> Result<Vec<Collection>, CollectionRepositoryError> {
        let url = self
            .table
            .url(&[
                ("select", "*".to_owned()),
                ("user_id", format!("eq.{owner}")),
                ("order", "is_favorite.desc,created_at.desc".to_owned()),
            ])
            .map_err(collection_failure)?;
        let request = self
            .table
            .request(Method::GET, url)
            .await
            .map_err(collection_failure)?;
        let rows: Vec<ListRowDto> = self.table.rows(request).await.map_err(collection_failure)?;
        Ok(rows.into_iter().map(Collection::from).collect())
    }

    async fn find_by_id(
        &self,
        id: &CollectionId,
    ) -> Result<Option<Collection>, CollectionRepositoryError> {
        let url = self.table.url(&Self::by_id(id)).map_err(collection_failure)?;
        let request = self
            .table
            .request(Method::GET, url)
            .await
            .map_err(collection_failure)?;
        let rows: Vec<ListRowDto> = self.table.rows(request).await.map_err(collection_failure)?;
        Ok(rows.into_iter().next().map(Collection::from))
    }

    async fn insert(
        &self,
        collection: &NewCollection,
    ) -> Result<Collection, CollectionRepositoryError> {
        let url = self.table.url(&[]).map_err(collection_failure)?;
        let request = self
            .table
            .request(Method::POST, url)
            .await
            .map_err(collection_failure)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&NewListRowDto::from(collection));
        let row: ListRowDto = self
            .table
            .single_row(request, "insert returned no row")
            .await
            .map_err(collection_failure)?;
        Ok(row.into())
    }

    async fn update(
        &self,
        id: &CollectionId,
        patch: &CollectionPatch,
    ) -> Result<Collection, CollectionRepositoryError> {
        let url = self.table.url(&Self::by_id(id)).map_err(collection_failure)?;
        let request = self
            .table
            .request(Method::PATCH, url)
            .await
            .map_err(collection_failure)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch);
        let row: ListRowDto = self
            .table
            .single_row(request, &id.to_string())
            .await
            .map_err(collection_failure)?;
        Ok(row.into())
    }

    async fn delete(&self, id: &CollectionId) -> Result<(), CollectionRepositoryError> {
        self.table
            .delete(id.to_string())
            .await
            .map_err(collection_failure)
    }
}

fn collection_failure(failure: HttpFailure) -> CollectionRepositoryError {
    let HttpFailure { kind, message } = failure;
    match kind {
        FailureKind::Unauthorized => CollectionRepositoryError::unauthorized(message),
        FailureKind::NotFound => CollectionRepositoryError::not_found(message),
        FailureKind::Conflict => CollectionRepositoryError::conflict(message),
        FailureKind::Rejected => CollectionRepositoryError::rejected(message),
        FailureKind::Timeout => CollectionRepositoryError::timeout(message),
        FailureKind::Transport => CollectionRepositoryError::transport(message),
        FailureKind::Decode => CollectionRepositoryError::decode(message),
    }
}

/// Items stored in the `items` table.
pub struct SupabaseItemRepository {
    table: Table,
}

impl SupabaseItemRepository {
    pub(super) fn new(http: SupabaseHttp, auth: Arc<SupabaseAuthGateway>, table: String) -> Self {
        Self {
            table: Table {
                http,
                auth,
                name: table,
            },
        }
    }

    async fn insert_row(&self, payload: ItemInsertDto<'_>) -> Result<Item, ItemRepositoryError> {
        let url = self.table.url(&[]).map_err(item_failure)?;
        let request = self
            .table
            .request(Method::POST, url)
            .await
            .map_err(item_failure)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&payload);
        let row: ItemRowDto = self
            .table
            .single_row(request, "insert returned no row")
            .await
            .map_err(item_failure)?;
        Ok(row.into())
    }
}

#[async_trait]
impl ItemRepository for SupabaseItemRepository {
    async fn list_for_collection(
        &self,
        collection_id: &CollectionId,
    ) -> Result<Vec<Item>, ItemRepositoryError> {
        let url = self
            .table
            .url(&[
                ("select", "*".to_owned()),
                ("list_id", format!("eq.{collection_id}")),
                ("order", "created_at.desc".to_owned()),
            ])
            .map_err(item_failure)?;
        let request = self
            .table
            .request(Method::GET, url)
            .await
            .map_err(item_failure)?;
        let rows: Vec<ItemRowDto> = self.table.rows(request).await.map_err(item_failure)?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn insert(&self, item: &NewItem) -> Result<Item, ItemRepositoryError> {
        self.insert_row(ItemInsertDto::from(item)).await
    }

    async fn restore(&self, item: &Item) -> Result<Item, ItemRepositoryError> {
        self.insert_row(ItemInsertDto::from(item)).await
    }

    async fn update(&self, id: &ItemId, data: &ItemData) -> Result<Item, ItemRepositoryError> {
        let url = self
            .table
            .url(&[("select", "*".to_owned()), ("id", format!("eq.{id}"))])
            .map_err(item_failure)?;
        let request = self
            .table
            .request(Method::PATCH, url)
            .await
            .map_err(item_failure)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&ItemDataPatchDto { data });
        let row: ItemRowDto = self
            .table
            .single_row(request, &id.to_string())
            .await
            .map_err(item_failure)?;
        Ok(row.into())
    }

    async fn delete(&self, id: &ItemId) -> Result<(), ItemRepositoryError> {
        self.table.delete(id.to_string()).await.map_err(item_failure)
    }
}

fn item_failure(failure: HttpFailure) -> ItemRepositoryError {
    let HttpFailure { kind, message } = failure;
    match kind {
        FailureKind::Unauthorized => ItemRepositoryError::unauthorized(message),
        FailureKind::NotFound => ItemRepositoryError::not_found(message),
        FailureKind::Conflict => ItemRepositoryError::conflict(message),
        FailureKind::Rejected => ItemRepositoryError::rejected(message),
        FailureKind::Timeout => ItemRepositoryError::timeout(message),
        FailureKind::Transport => ItemRepositoryError::transport(message),
        FailureKind::Decode => ItemRepositoryError::decode(message),
    }
}
