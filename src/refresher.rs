//! Token refresher: exchanges the refresh token for a new access token.
//!
//! DESIGN
//! ======
//! Concurrent callers coalesce onto one shared future stored in the
//! refresher itself, so late joiners await the real outcome instead of
//! polling a flag. The exchange runs as a spawned task: a caller that stops
//! waiting (timeout, drop) never cancels a refresh other callers depend on.
//!
//! The in-flight slot is cleared by a drop guard inside the task, so it is
//! released on success, failure and panic alike.
//!
//! FAILURE POLICY
//! ==============
//! Any failure is terminal for the session: both tokens are cleared and
//! `TokenClearing` is emitted. Nothing is retried here.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::json;

use crate::api::parse_refresh;
use crate::error::RequestError;
use crate::notify::{AuthEvent, Notifier};
use crate::store::{TokenKey, TokenStore};
use crate::transport::{Body, HttpRequest, HttpTransport, Method};

type RefreshFuture = Shared<BoxFuture<'static, bool>>;

pub struct TokenRefresher {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    timeout: Duration,
    inflight: Mutex<Option<RefreshFuture>>,
}

fn lock(slot: &Mutex<Option<RefreshFuture>>) -> MutexGuard<'_, Option<RefreshFuture>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight slot when the refresh task ends, however it ends.
struct ReleaseInflight(Arc<Inner>);

impl Drop for ReleaseInflight {
    fn drop(&mut self) {
        lock(&self.0.inflight).take();
    }
}

impl TokenRefresher {
    pub fn new(
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
        transport: Arc<dyn HttpTransport>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                notifier,
                transport,
                endpoint: endpoint.into(),
                timeout,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Refresh the access token, joining any refresh already in flight.
    ///
    /// Resolves `true` when a new access token was stored. Every caller that
    /// joined the same attempt observes the same result.
    pub async fn refresh(&self) -> bool {
        self.join_or_start().await
    }

    /// `true` while a refresh attempt is running.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        lock(&self.inner.inflight).is_some()
    }

    fn join_or_start(&self) -> RefreshFuture {
        let mut slot = lock(&self.inner.inflight);
        if let Some(existing) = slot.as_ref() {
            tracing::debug!("joining in-flight token refresh");
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _release = ReleaseInflight(Arc::clone(&inner));
            inner.run().await
        });
        let shared = async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "token refresh task aborted");
                false
            })
        }
        .boxed()
        .shared();

        *slot = Some(shared.clone());
        shared
    }
}

impl Inner {
    async fn run(&self) -> bool {
        let Some(refresh_token) = self.store.get(TokenKey::RefreshToken) else {
            tracing::debug!("no refresh token stored; refresh skipped");
            if self.store.get(TokenKey::AccessToken).is_some() {
                self.store.clear(&TokenKey::ALL);
                self.notifier.emit(AuthEvent::TokenClearing);
            }
            return false;
        };

        match self.exchange(&refresh_token).await {
            Ok(access_token) => {
                self.store.set(TokenKey::AccessToken, &access_token);
                self.notifier.emit(AuthEvent::TokenUpdating);
                tracing::info!("access token refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed; clearing session");
                self.store.clear(&TokenKey::ALL);
                self.notifier.emit(AuthEvent::TokenClearing);
                false
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<String, RequestError> {
        let mut request = HttpRequest::new(Method::POST, self.endpoint.clone(), self.timeout);
        request.body = Some(Body::Json(json!({ "refresh_token": refresh_token })));

        let response = tokio::time::timeout(self.timeout, self.transport.send(&request))
            .await
            .map_err(|_| RequestError::TimedOut)??;
        if !response.is_success() {
            return Err(RequestError::from_status(response.status));
        }
        parse_refresh(&response.body).ok_or_else(|| RequestError::Decode("refresh response rejected".into()))
    }
}

#[cfg(test)]
#[path = "refresher_test.rs"]
mod tests;
