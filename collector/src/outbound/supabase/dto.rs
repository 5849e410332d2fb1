//! DTOs for GoTrue and PostgREST payloads.
//!
//! Responses decode into these transport shapes first and are mapped into
//! domain records in one pass. Row names follow the storage schema (`lists`,
//! `list_id`), not the domain vocabulary.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    Collection, CollectionId, DEFAULT_COLOR, DEFAULT_ICON, Item, ItemData, ItemId, NewCollection,
    NewItem, Schema, Session, User, UserId,
};

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponseDto {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserDto {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl UserDto {
    fn into_domain(self) -> Result<User, String> {
        let id = UserId::new(&self.id).map_err(|error| format!("user id {}: {error}", self.id))?;
        Ok(User {
            id,
            email: self.email.filter(|email| !email.is_empty()),
        })
    }
}

impl TokenResponseDto {
    pub(super) fn into_session(self, now: DateTime<Utc>) -> Result<Session, String> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(epoch), _) => Some(
                DateTime::from_timestamp(epoch, 0)
                    .ok_or_else(|| format!("expires_at {epoch} is out of range"))?,
            ),
            (None, Some(seconds)) => now.checked_add_signed(TimeDelta::seconds(seconds)),
            (None, None) => None,
        };
        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
            expires_at,
            user: self.user.into_domain()?,
        })
    }
}

/// Sign-up answers with a session when confirmation is disabled and with the
/// bare user otherwise.
pub(super) fn decode_sign_up(body: &[u8]) -> Result<Option<TokenResponseDto>, String> {
    let value: Value = serde_json::from_slice(body).map_err(|error| error.to_string())?;
    if value.get("access_token").is_none() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|error| error.to_string())
}

#[derive(Debug, Serialize)]
pub(super) struct PasswordGrantDto<'a> {
    pub(super) email: &'a str,
    pub(super) password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshGrantDto<'a> {
    pub(super) refresh_token: &'a str,
}

/// Error envelope shared by GoTrue and PostgREST. Each service fills a
/// different subset of these keys.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBodyDto {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBodyDto {
    /// First non-blank human message in the body.
    pub(super) fn message(body: &[u8]) -> Option<String> {
        let decoded: Self = serde_json::from_slice(body).ok()?;
        [
            decoded.msg,
            decoded.error_description,
            decoded.message,
            decoded.error,
        ]
        .into_iter()
        .flatten()
        .map(|message| message.trim().to_owned())
        .find(|message| !message.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ListRowDto {
    id: CollectionId,
    name: String,
    schema: Schema,
    user_id: UserId,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    is_favorite: Option<bool>,
    created_at: DateTime<Utc>,
}

impl From<ListRowDto> for Collection {
    fn from(row: ListRowDto) -> Self {
        Self {
            id: row.id,
            name: row.name,
            schema: row.schema,
            color: row.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned()),
            icon: row.icon.unwrap_or_else(|| DEFAULT_ICON.to_owned()),
            is_favorite: row.is_favorite.unwrap_or(false),
            created_at: row.created_at,
            owner: row.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NewListRowDto<'a> {
    name: &'a str,
    schema: &'a Schema,
    user_id: &'a UserId,
    color: &'a str,
    icon: &'a str,
}

impl<'a> From<&'a NewCollection> for NewListRowDto<'a> {
    fn from(collection: &'a NewCollection) -> Self {
        Self {
            name: collection.name.as_str(),
            schema: &collection.schema,
            user_id: &collection.owner,
            color: collection.color.as_str(),
            icon: collection.icon.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ItemRowDto {
    id: ItemId,
    list_id: CollectionId,
    #[serde(default)]
    data: Option<ItemData>,
    created_at: DateTime<Utc>,
}

impl From<ItemRowDto> for Item {
    fn from(row: ItemRowDto) -> Self {
        Self {
            id: row.id,
            collection_id: row.list_id,
            data: row.data.unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

/// Insert payload. `id` and `created_at` are only sent when restoring.
#[derive(Debug, Serialize)]
pub(super) struct ItemInsertDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a ItemId>,
    list_id: &'a CollectionId,
    data: &'a ItemData,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<&'a DateTime<Utc>>,
}

impl<'a> From<&'a NewItem> for ItemInsertDto<'a> {
    fn from(item: &'a NewItem) -> Self {
        Self {
            id: None,
            list_id: &item.collection_id,
            data: &item.data,
            created_at: None,
        }
    }
}

impl<'a> From<&'a Item> for ItemInsertDto<'a> {
    fn from(item: &'a Item) -> Self {
        Self {
            id: Some(&item.id),
            list_id: &item.collection_id,
            data: &item.data,
            created_at: Some(&item.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ItemDataPatchDto<'a> {
    pub(super) data: &'a ItemData,
}
