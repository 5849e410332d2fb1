//! Port for the remote authentication backend.
//!
//! The [`AuthGateway`] owns the session lifecycle: it exchanges credentials
//! for sessions, remembers the current session between calls, and announces
//! session transitions on a broadcast channel so state containers can follow
//! changes they did not initiate (token refresh, sign-out elsewhere).

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{Credentials, Session};

use super::define_port_error;

define_port_error! {
    /// Errors raised by authentication adapters.
    pub enum AuthGatewayError {
        /// The backend refused the request; `message` is shown to the user.
        Rejected { message: String } => "{message}",
        /// The backend could not be reached.
        Transport { message: String } => "auth backend unreachable: {message}",
        /// The backend did not answer in time.
        Timeout { message: String } => "auth backend timed out: {message}",
        /// The backend answered with a payload the adapter could not read.
        Decode { message: String } => "auth response could not be decoded: {message}",
        /// Local session storage failed.
        Storage { message: String } => "session storage failed: {message}",
    }
}

/// Kind of session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A session transition published by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    /// Session after the transition; `None` once signed out.
    pub session: Option<Session>,
}

impl AuthChange {
    /// Convenience constructor.
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Port for authentication and session management.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Return the persisted session, if any.
    ///
    /// Adapters may refresh an expired session transparently; a session that
    /// cannot be refreshed is reported as `None`.
    async fn get_session(&self) -> Result<Option<Session>, AuthGatewayError>;

    /// Register a new account.
    ///
    /// Returns `None` when the backend requires email confirmation before a
    /// session is issued.
    async fn sign_up(&self, credentials: &Credentials)
    -> Result<Option<Session>, AuthGatewayError>;

    /// Exchange an email and password for a session.
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, AuthGatewayError>;

    /// End the current session. Local session state is dropped even when
    /// the backend call fails.
    async fn sign_out(&self) -> Result<(), AuthGatewayError>;

    /// Subscribe to session transitions.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}
