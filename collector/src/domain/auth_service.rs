//! Authentication state container.
//!
//! [`AuthService`] owns the [`AuthState`] snapshot and is the only writer of
//! it. Every change is a single `watch` publication, so observers never see
//! a half-applied transition.

use std::sync::Arc;

use tokio::sync::{OnceCell, broadcast, watch};
use tracing::{debug, info, warn};

use crate::domain::ports::{AuthChange, AuthGateway, AuthGatewayError};
use crate::domain::{Credentials, Error, Session, User};

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// Signed-in user, if any.
    pub user: Option<User>,
    /// Set once the persisted session has been looked up.
    pub initialized: bool,
    /// Set while a sign-in or sign-up call is in flight.
    pub loading: bool,
}

/// Auth state container backed by an [`AuthGateway`].
#[derive(Clone)]
pub struct AuthService {
    gateway: Arc<dyn AuthGateway>,
    state: Arc<watch::Sender<AuthState>>,
    started: Arc<OnceCell<()>>,
}

impl AuthService {
    /// Create a container; call [`AuthService::initialize`] before use.
    pub fn new(gateway: Arc<dyn AuthGateway>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            gateway,
            state: Arc::new(state),
            started: Arc::new(OnceCell::new()),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Restore the persisted session and start following session changes.
    ///
    /// Only the first successful call has any effect. A failed lookup still
    /// marks the state initialised (signed out) and may be retried.
    pub async fn initialize(&self) -> Result<(), Error> {
        self.started
            .get_or_try_init(|| self.bootstrap())
            .await
            .map(|_| ())
    }

    async fn bootstrap(&self) -> Result<(), Error> {
        // Subscribe first so a change racing the lookup is not missed.
        let changes = self.gateway.subscribe();
        let session = match self.gateway.get_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "session lookup failed");
                self.state.send_modify(|state| state.initialized = true);
                return Err(map_gateway_error(err));
            }
        };

        info!(signed_in = session.is_some(), "auth state initialised");
        self.state.send_modify(|state| {
            state.user = session.map(|session| session.user);
            state.initialized = true;
        });
        self.spawn_listener(changes);
        Ok(())
    }

    fn spawn_listener(&self, mut changes: broadcast::Receiver<AuthChange>) {
        let state = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(state) = state.upgrade() else {
                            break;
                        };
                        debug!(event = ?change.event, "auth change received");
                        let user = change.session.map(|session| session.user);
                        state.send_if_modified(|current| {
                            if current.user == user {
                                return false;
                            }
                            current.user = user;
                            true
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth change listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Create an account and sign in when the backend issues a session.
    ///
    /// Returns `None` when the backend wants the address confirmed first.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<User>, Error> {
        let credentials = Credentials::for_sign_up(email, password)?;
        let session = self
            .with_loading(self.gateway.sign_up(&credentials))
            .await
            .inspect_err(|err| warn!(error = %err, kind = err.kind(), "sign up failed"))
            .map_err(map_gateway_error)?;
        let user = session.map(|session| session.user);
        if user.is_some() {
            self.state.send_modify(|state| state.user.clone_from(&user));
        }
        Ok(user)
    }

    /// Sign in with an email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, Error> {
        let credentials = Credentials::for_sign_in(email, password)?;
        let session: Session = self
            .with_loading(self.gateway.sign_in_with_password(&credentials))
            .await
            .inspect_err(|err| warn!(error = %err, kind = err.kind(), "sign in failed"))
            .map_err(map_gateway_error)?;
        info!(user_id = %session.user.id, "signed in");
        let user = session.user;
        self.state.send_modify(|state| state.user = Some(user.clone()));
        Ok(user)
    }

    /// Sign out. The local user is cleared even when the backend call fails.
    pub async fn sign_out(&self) -> Result<(), Error> {
        let result = self.gateway.sign_out().await;
        self.state.send_modify(|state| state.user = None);
        match result {
            Ok(()) => {
                info!("signed out");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "sign out failed remotely");
                Err(map_gateway_error(err))
            }
        }
    }

    async fn with_loading<T>(&self, call: impl Future<Output = T>) -> T {
        self.state.send_modify(|state| state.loading = true);
        let output = call.await;
        self.state.send_modify(|state| state.loading = false);
        output
    }
}

fn map_gateway_error(error: AuthGatewayError) -> Error {
    match error {
        AuthGatewayError::Rejected { message } if message.trim().is_empty() => {
            Error::unauthorized("authentication was rejected")
        }
        AuthGatewayError::Rejected { message } => Error::unauthorized(message),
        AuthGatewayError::Transport { .. } | AuthGatewayError::Timeout { .. } => {
            Error::service_unavailable(error.to_string())
        }
        AuthGatewayError::Decode { .. } | AuthGatewayError::Storage { .. } => {
            Error::internal(error.to_string())
        }
    }
}

#[cfg(test)]
#[path = "auth_service_tests.rs"]
mod tests;
