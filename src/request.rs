//! Authenticated request wrapper.
//!
//! ARCHITECTURE
//! ============
//! [`AuthenticatedClient`] sends every call through one [`Interceptor`]: the
//! interceptor adapts the outgoing request (attaches credentials) and, after
//! a response, decides whether to resend it once. [`AuthInterceptor`] is the
//! production policy: bearer token from the store, refresh-and-retry on a
//! credentialed 401.
//!
//! Independently of auth, network failures and 5xx responses may be retried
//! a bounded number of times (`retries`, `retry_delay`). Timeouts are never
//! retried and are reported as [`RequestError::TimedOut`].
//!
//! TIMEOUTS
//! ========
//! Each HTTP exchange is bounded by the request timeout and cancelled when it
//! expires. Waiting on a token refresh is bounded by the same timeout, but
//! giving up only abandons the wait: the shared refresh keeps running.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::api::parse_envelope;
use crate::config::RetryPolicy;
use crate::error::RequestError;
use crate::refresher::TokenRefresher;
use crate::store::{TokenKey, TokenStore};
use crate::transport::{Body, HttpRequest, HttpResponse, HttpTransport, Method};

// =============================================================================
// INTERCEPTOR
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    DoNotRetry,
}

/// The single extension point of the request pipeline.
#[async_trait::async_trait]
pub trait Interceptor: Send + Sync {
    /// Prepare an outgoing request. Returns `true` when credentials were attached.
    fn adapt(&self, request: &mut HttpRequest) -> bool;

    /// Decide whether `response` to the first attempt of `request` warrants
    /// one resend.
    async fn retry(&self, request: &HttpRequest, response: &HttpResponse, credentialed: bool) -> RetryDecision;
}

pub struct AuthInterceptor {
    store: Arc<dyn TokenStore>,
    refresher: Arc<TokenRefresher>,
}

impl AuthInterceptor {
    pub fn new(store: Arc<dyn TokenStore>, refresher: Arc<TokenRefresher>) -> Self {
        Self { store, refresher }
    }
}

#[async_trait::async_trait]
impl Interceptor for AuthInterceptor {
    fn adapt(&self, request: &mut HttpRequest) -> bool {
        match self.store.get(TokenKey::AccessToken) {
            Some(token) => {
                request.set_header("Authorization", format!("Bearer {token}"));
                true
            }
            None => {
                request.remove_header("Authorization");
                false
            }
        }
    }

    async fn retry(&self, request: &HttpRequest, response: &HttpResponse, credentialed: bool) -> RetryDecision {
        if response.status != 401 || !credentialed {
            return RetryDecision::DoNotRetry;
        }
        // Another caller already refreshed while this request was in flight.
        let current = self.store.get(TokenKey::AccessToken);
        if current.is_some() && current.as_deref() != request.bearer_token() {
            tracing::debug!("access token replaced since request was sent; resending without refresh");
            return RetryDecision::Retry;
        }
        if self.refresher.refresh().await {
            RetryDecision::Retry
        } else {
            RetryDecision::DoNotRetry
        }
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Per-call settings. Unset timeout/retry values fall back to the client's
/// configured defaults.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    /// Let the interceptor refresh and resend on 401.
    pub refresh_on_unauthorized: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            retries: None,
            retry_delay: None,
            refresh_on_unauthorized: true,
        }
    }
}

impl RequestOptions {
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    #[must_use]
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(Body::Form(fields));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = Some(retries);
        self.retry_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct AuthenticatedClient {
    transport: Arc<dyn HttpTransport>,
    interceptor: Arc<dyn Interceptor>,
    default_timeout: Duration,
    retry: RetryPolicy,
}

impl AuthenticatedClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        interceptor: Arc<dyn Interceptor>,
        default_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self { transport, interceptor, default_timeout, retry }
    }

    /// Send a request, refreshing and resending once on a credentialed 401.
    ///
    /// Any HTTP status is returned as `Ok`; when the refresh fails the
    /// original 401 response is what the caller gets.
    ///
    /// # Errors
    ///
    /// [`RequestError::TimedOut`] when the call (or the refresh wait) exceeds
    /// the timeout, [`RequestError::Network`] when no response arrived after
    /// the allowed transient retries.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let policy = RetryPolicy {
            retries: options.retries.unwrap_or(self.retry.retries),
            delay: options.retry_delay.unwrap_or(self.retry.delay),
        };

        let mut request = HttpRequest::new(method, url, timeout);
        request.query = options.query;
        request.headers = options.headers;
        request.body = options.body;

        let credentialed = self.interceptor.adapt(&mut request);
        let response = self.send_with_retries(&request, policy).await?;
        if !options.refresh_on_unauthorized {
            return Ok(response);
        }

        let decision = tokio::time::timeout(timeout, self.interceptor.retry(&request, &response, credentialed))
            .await
            .map_err(|_| RequestError::TimedOut)?;
        match decision {
            RetryDecision::DoNotRetry => Ok(response),
            RetryDecision::Retry => {
                let credentialed = self.interceptor.adapt(&mut request);
                tracing::debug!(method = %request.method, url, credentialed, "resending after token refresh");
                self.send_with_retries(&request, policy).await
            }
        }
    }

    async fn send_with_retries(&self, request: &HttpRequest, policy: RetryPolicy) -> Result<HttpResponse, RequestError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(request.timeout, self.transport.send(request)).await {
                Ok(sent) => sent.map_err(RequestError::from),
                Err(_) => Err(RequestError::TimedOut),
            };
            let transient = match &result {
                Ok(response) => (500..600).contains(&response.status),
                Err(e) => matches!(e, RequestError::Network(_)),
            };
            if !transient || attempt >= policy.retries {
                return result;
            }
            attempt += 1;
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                attempt,
                retries = policy.retries,
                "transient request failure; retrying"
            );
            tokio::time::sleep(policy.delay).await;
        }
    }

    /// Send a request and decode the `{code, msg, data}` envelope.
    ///
    /// # Errors
    ///
    /// Transport failures as in [`Self::request`], a status-derived
    /// [`RequestError`] for non-2xx responses, [`RequestError::Api`] for a
    /// non-zero code and [`RequestError::Decode`] for unexpected bodies.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<T, RequestError> {
        let result = self
            .request(method.clone(), url, options)
            .await
            .and_then(|response| {
                if response.is_success() {
                    parse_envelope(&response.body)
                } else {
                    Err(RequestError::from_status(response.status))
                }
            });
        if let Err(e) = &result {
            tracing::warn!(%method, url, error = %e, "request failed");
        }
        result
    }

    /// # Errors
    ///
    /// See [`Self::send_json`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Result<T, RequestError> {
        self.send_json(Method::GET, url, options).await
    }

    /// # Errors
    ///
    /// See [`Self::send_json`].
    pub async fn post_json<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Result<T, RequestError> {
        self.send_json(Method::POST, url, options).await
    }

    /// # Errors
    ///
    /// See [`Self::send_json`].
    pub async fn put_json<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Result<T, RequestError> {
        self.send_json(Method::PUT, url, options).await
    }

    /// # Errors
    ///
    /// See [`Self::send_json`].
    pub async fn delete_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T, RequestError> {
        self.send_json(Method::DELETE, url, options).await
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
