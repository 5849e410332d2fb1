//! GoTrue-backed implementation of the [`AuthGateway`] port.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use reqwest::Method;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::dto::{PasswordGrantDto, RefreshGrantDto, TokenResponseDto, decode_sign_up};
use super::http::{FailureKind, HttpFailure, SupabaseHttp};
use super::session::SessionStore;
use crate::domain::ports::{AuthChange, AuthEvent, AuthGateway, AuthGatewayError};
use crate::domain::{Credentials, Session};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Auth adapter talking to `<base>/auth/v1`.
pub struct SupabaseAuthGateway {
    http: SupabaseHttp,
    sessions: SessionStore,
    changes: broadcast::Sender<AuthChange>,
    clock: Arc<dyn Clock>,
}

impl SupabaseAuthGateway {
    pub(super) fn new(
        http: SupabaseHttp,
        session_file: Option<&Path>,
        clock: Arc<dyn Clock>,
    ) -> std::io::Result<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            sessions: SessionStore::new(session_file)?,
            changes,
            clock,
        })
    }

    /// Access token of a live session, refreshing it first when expired.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure when the backend could not be reached.
    pub async fn access_token(&self) -> Result<Option<String>, AuthGatewayError> {
        Ok(self
            .get_session()
            .await?
            .map(|session| session.access_token))
    }

    fn publish(&self, event: AuthEvent, session: Option<Session>) {
        if self.changes.send(AuthChange::new(event, session)).is_err() {
            debug!(?event, "no auth change subscribers");
        }
    }

    async fn token_grant<T>(&self, grant_type: &str, body: &T) -> Result<Session, AuthGatewayError>
    where
        T: serde::Serialize + Sync,
    {
        let mut url = self.http.auth_url("token").map_err(map_failure)?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let request = self.http.request(Method::POST, url, None).json(body);
        let body = self.http.send(request).await.map_err(map_failure)?;
        let dto: TokenResponseDto = serde_json::from_slice(&body).map_err(|error| {
            AuthGatewayError::decode(format!("invalid token response: {error}"))
        })?;
        dto.into_session(self.clock.utc())
            .map_err(AuthGatewayError::decode)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthGatewayError> {
        let session = self
            .token_grant("refresh_token", &RefreshGrantDto { refresh_token })
            .await?;
        self.sessions.save(&session)?;
        self.publish(AuthEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    fn drop_session(&self) -> Result<(), AuthGatewayError> {
        self.sessions.clear()?;
        self.publish(AuthEvent::SignedOut, None);
        Ok(())
    }
}

#[async_trait]
impl AuthGateway for SupabaseAuthGateway {
    async fn get_session(&self) -> Result<Option<Session>, AuthGatewayError> {
        let Some(session) = self.sessions.load()? else {
            return Ok(None);
        };
        if !session.is_expired(self.clock.utc()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            info!("stored session expired without a refresh token");
            self.drop_session()?;
            return Ok(None);
        };
        match self.refresh(&refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthGatewayError::Rejected { message }) => {
                info!(%message, "session refresh rejected");
                self.drop_session()?;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Session>, AuthGatewayError> {
        let url = self.http.auth_url("signup").map_err(map_failure)?;
        let payload = PasswordGrantDto {
            email: credentials.email(),
            password: credentials.password(),
        };
        let request = self.http.request(Method::POST, url, None).json(&payload);
        let body = self.http.send(request).await.map_err(map_failure)?;
        let Some(dto) = decode_sign_up(&body).map_err(|error| {
            AuthGatewayError::decode(format!("invalid sign up response: {error}"))
        })?
        else {
            info!("account created; confirmation pending");
            return Ok(None);
        };

        let session = dto
            .into_session(self.clock.utc())
            .map_err(AuthGatewayError::decode)?;
        self.sessions.save(&session)?;
        self.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, AuthGatewayError> {
        let payload = PasswordGrantDto {
            email: credentials.email(),
            password: credentials.password(),
        };
        let session = self.token_grant("password", &payload).await?;
        self.sessions.save(&session)?;
        self.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthGatewayError> {
        let token = self.sessions.cached().map(|session| session.access_token);
        let remote = match token {
            Some(token) => {
                let url = self.http.auth_url("logout").map_err(map_failure)?;
                let request = self.http.request(Method::POST, url, Some(&token));
                self.http.send(request).await.map(|_| ()).map_err(map_failure)
            }
            None => Ok(()),
        };
        if let Err(error) = &remote {
            warn!(%error, "remote sign out failed; clearing local session anyway");
        }
        self.drop_session()?;
        remote
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

fn map_failure(failure: HttpFailure) -> AuthGatewayError {
    let HttpFailure { kind, message } = failure;
    match kind {
        FailureKind::Timeout => AuthGatewayError::timeout(message),
        FailureKind::Transport => AuthGatewayError::transport(message),
        FailureKind::Decode => AuthGatewayError::decode(message),
        FailureKind::Unauthorized
        | FailureKind::NotFound
        | FailureKind::Conflict
        | FailureKind::Rejected => AuthGatewayError::rejected(message),
    }
}
