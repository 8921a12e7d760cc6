//! Session manager: wires the token components together and owns login and
//! logout.
//!
//! ARCHITECTURE
//! ============
//! ```text
//!   TokenStore ──┬── TokenRefresher ── AuthInterceptor ── AuthenticatedClient
//!                │                                           │
//!   Notifier ────┤                                      TokenValidator
//!                │                                           │
//!                └────────── SessionGate ◀── SessionGuard ◀──┘
//! ```
//!
//! The store, notifier, transport and redirector are injected; everything
//! else is built here from [`SessionConfig`] and shared behind `Arc`.

use std::sync::Arc;

use crate::api::{Endpoints, parse_login};
use crate::config::SessionConfig;
use crate::error::{RequestError, SessionError};
use crate::gate::SessionGate;
use crate::guard::{Redirect, RouteClass, SessionGuard};
use crate::notify::{AuthEvent, Notifier};
use crate::refresher::TokenRefresher;
use crate::request::{AuthInterceptor, AuthenticatedClient, RequestOptions};
use crate::store::{Session, TokenKey, TokenStore};
use crate::transport::{HttpTransport, Method};
use crate::validator::TokenValidator;
use crate::watch::StorageWatcher;

pub struct SessionManager {
    config: SessionConfig,
    endpoints: Endpoints,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    refresher: Arc<TokenRefresher>,
    client: Arc<AuthenticatedClient>,
    validator: Arc<TokenValidator>,
    guard: Arc<SessionGuard>,
    gate: SessionGate,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
        transport: Arc<dyn HttpTransport>,
        redirect: Arc<dyn Redirect>,
    ) -> Self {
        let endpoints = Endpoints::from_config(&config);
        let refresher = Arc::new(TokenRefresher::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&transport),
            endpoints.refresh_token.clone(),
            config.timeouts.request,
        ));
        let interceptor = Arc::new(AuthInterceptor::new(Arc::clone(&store), Arc::clone(&refresher)));
        let client = Arc::new(AuthenticatedClient::new(
            transport,
            interceptor,
            config.timeouts.request,
            config.retry,
        ));
        let validator = Arc::new(TokenValidator::new(
            Arc::clone(&client),
            endpoints.validate_access_token.clone(),
        ));
        let guard = Arc::new(SessionGuard::new(
            Arc::clone(&validator),
            Arc::clone(&refresher),
            redirect,
            config.login_path.clone(),
        ));
        let gate = SessionGate::new(Arc::clone(&guard), Arc::clone(&store), notifier.as_ref());

        Self { config, endpoints, store, notifier, refresher, client, validator, guard, gate }
    }

    // =========================================================================
    // LOGIN / LOGOUT
    // =========================================================================

    /// Exchange credentials for a token pair and persist it.
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] when the backend refuses the credentials,
    /// [`SessionError::Request`] for transport, status and decode failures.
    /// The store is left untouched on any error.
    pub async fn login(&self, account: &str, password: &str) -> Result<(), SessionError> {
        let options = RequestOptions::default()
            .form(vec![
                ("account".to_owned(), account.to_owned()),
                ("password".to_owned(), password.to_owned()),
            ])
            .without_refresh();
        let response = self.client.request(Method::POST, &self.endpoints.login, options).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, "login failed");
            return Err(RequestError::from_status(response.status).into());
        }

        let tokens = match parse_login(&response.body) {
            Ok(tokens) => tokens,
            Err(RequestError::Api { code, msg }) => {
                tracing::warn!(code, %msg, "login rejected");
                return Err(SessionError::Rejected(msg));
            }
            Err(e) => {
                tracing::warn!(error = %e, "login response unusable");
                return Err(e.into());
            }
        };

        self.store.set(TokenKey::AccessToken, &tokens.access_token);
        self.store.set(TokenKey::RefreshToken, &tokens.refresh_token);
        self.notifier.emit(AuthEvent::TokenChange);
        tracing::info!("logged in");
        Ok(())
    }

    /// Forget both tokens locally.
    pub fn logout(&self) {
        self.store.clear(&TokenKey::ALL);
        self.notifier.emit(AuthEvent::TokenClearing);
        tracing::info!("logged out");
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Run the gated guard for a route of class `route`.
    pub async fn check(&self, route: RouteClass) -> bool {
        self.gate.ensure(route).await
    }

    /// `true` once this session passed the guard and has not been cleared.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.gate.is_authenticated() && self.store.get(TokenKey::AccessToken).is_some()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.store.get(TokenKey::AccessToken)
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.store.snapshot()
    }

    /// Announce changes other processes make to the shared store.
    #[must_use]
    pub fn watch(&self) -> StorageWatcher {
        StorageWatcher::spawn(Arc::clone(&self.store), Arc::clone(&self.notifier), self.config.watch_interval)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    #[must_use]
    pub fn refresher(&self) -> &Arc<TokenRefresher> {
        &self.refresher
    }

    #[must_use]
    pub fn client(&self) -> &Arc<AuthenticatedClient> {
        &self.client
    }

    #[must_use]
    pub fn validator(&self) -> &Arc<TokenValidator> {
        &self.validator
    }

    #[must_use]
    pub fn guard(&self) -> &Arc<SessionGuard> {
        &self.guard
    }

    #[must_use]
    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
