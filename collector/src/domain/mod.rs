//! Domain primitives, rules and state containers.
//!
//! Purpose: model collections, their schemas and items independently of any
//! backend or front end. Remote systems are reached only through the traits
//! in [`ports`]; the state containers own the in-memory snapshots front ends
//! render from.
//!
//! Public surface:
//! - Error / ErrorCode: transport agnostic failure payload.
//! - Schema / SchemaDraft / FieldType: collection shape and its editing rules.
//! - Collection / Item and their ids, patches and display helpers.
//! - FormState / validate: schema-driven form model.
//! - sort_items / filter_items: pure projections over item lists.
//! - UndoSlot: one-slot timed undo buffer.
//! - AuthService / CollectionStore / ItemStore: state containers.

pub mod auth_service;
pub mod collection;
pub mod collection_service;
pub mod error;
pub mod form;
pub mod item;
pub mod item_service;
pub mod ports;
pub mod schema;
pub mod sorting;
pub mod undo;
pub mod user;

pub use self::auth_service::{AuthService, AuthState};
pub use self::collection::{
    COLOR_PALETTE, Collection, CollectionId, CollectionPatch, DEFAULT_COLOR, DEFAULT_ICON,
    ICON_PALETTE, NewCollection, display_order, sort_for_display,
};
pub use self::collection_service::{
    CollectionStore, CollectionsState, FetchOutcome, NewCollectionRequest,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::form::{
    ControlKind, DATE_FORMAT_HINT, DATE_PLACEHOLDER, FieldControl, FieldRule, FieldRuleViolation,
    FormState, FormValidationError, RawValue, rule_for, validate,
};
pub use self::item::{
    EMPTY_VALUE, Item, ItemData, ItemId, NewItem, display_value, value_text,
};
pub use self::item_service::{ItemStore, ItemsState};
pub use self::schema::{
    Field, FieldType, Schema, SchemaDraft, SchemaDraftError, UnknownFieldType,
};
pub use self::sorting::{
    SortMode, SortOrder, SortSettings, UnknownSortOrder, filter_items, sort_items,
};
pub use self::undo::{DEFAULT_UNDO_WINDOW, DeletionToken, PendingDeletion, UndoSlot};
pub use self::user::{
    Credentials, PASSWORD_MIN, Session, User, UserId, UserValidationError,
};

/// Convenient result alias for container operations.
pub type DomainResult<T> = Result<T, Error>;
