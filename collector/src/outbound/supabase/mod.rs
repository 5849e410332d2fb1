//! Supabase outbound adapters.
//!
//! GoTrue implements [`crate::domain::ports::AuthGateway`]; PostgREST tables
//! implement the collection and item repositories. All three share one
//! reqwest client and the session held by the auth adapter.

mod auth;
mod dto;
mod http;
mod rest;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use reqwest::Url;
use thiserror::Error;

pub use auth::SupabaseAuthGateway;
pub use rest::{SupabaseCollectionRepository, SupabaseItemRepository};

/// Default table holding collections.
pub const DEFAULT_COLLECTIONS_TABLE: &str = "lists";
/// Default table holding items.
pub const DEFAULT_ITEMS_TABLE: &str = "items";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseEndpoint {
    /// Project URL, e.g. `https://<ref>.supabase.co`.
    pub base_url: Url,
    /// Public anon key sent as `apikey`.
    pub anon_key: String,
    pub timeout: Duration,
    /// JSON file mirroring the current session between runs.
    pub session_file: Option<PathBuf>,
    pub collections_table: String,
    pub items_table: String,
}

impl SupabaseEndpoint {
    /// Endpoint with default tables, timeout and no session file.
    pub fn new(base_url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            base_url,
            anon_key: anon_key.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            session_file: None,
            collections_table: DEFAULT_COLLECTIONS_TABLE.to_owned(),
            items_table: DEFAULT_ITEMS_TABLE.to_owned(),
        }
    }
}

/// Errors raised while wiring the adapters.
#[derive(Debug, Error)]
pub enum SupabaseSetupError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("invalid session file: {0}")]
    SessionFile(#[from] std::io::Error),
}

/// The three Supabase adapters sharing one client and session.
pub struct SupabaseBackend {
    pub auth: Arc<SupabaseAuthGateway>,
    pub collections: Arc<SupabaseCollectionRepository>,
    pub items: Arc<SupabaseItemRepository>,
}

impl SupabaseBackend {
    /// Build all adapters for `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built or the session file path
    /// has no file name.
    pub fn connect(
        endpoint: &SupabaseEndpoint,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SupabaseSetupError> {
        let http = http::SupabaseHttp::new(endpoint)?;
        let auth = Arc::new(SupabaseAuthGateway::new(
            http.clone(),
            endpoint.session_file.as_deref(),
            clock,
        )?);
        let collections = Arc::new(SupabaseCollectionRepository::new(
            http.clone(),
            Arc::clone(&auth),
            endpoint.collections_table.clone(),
        ));
        let items = Arc::new(SupabaseItemRepository::new(
            http,
            Arc::clone(&auth),
            endpoint.items_table.clone(),
        ));
        Ok(Self {
            auth,
            collections,
            items,
        })
    }
}
