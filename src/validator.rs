//! Token validator: asks the backend whether the access token is valid.
//!
//! Goes through the request wrapper so the bearer token is attached from the
//! store, but with refresh-on-401 disabled: deciding to refresh is the
//! session guard's job. Read-only with respect to the store.

use std::sync::Arc;

use crate::api::parse_validate;
use crate::request::{AuthenticatedClient, RequestOptions};
use crate::transport::Method;

pub struct TokenValidator {
    client: Arc<AuthenticatedClient>,
    endpoint: String,
}

impl TokenValidator {
    pub fn new(client: Arc<AuthenticatedClient>, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    /// `true` only when the backend explicitly confirms the token.
    ///
    /// Network errors, timeouts, non-2xx statuses and malformed bodies all
    /// resolve `false`.
    pub async fn validate(&self) -> bool {
        let options = RequestOptions::default().without_refresh();
        match self.client.request(Method::POST, &self.endpoint, options).await {
            Ok(response) if response.is_success() => {
                let valid = parse_validate(&response.body);
                tracing::debug!(valid, "access token validated");
                valid
            }
            Ok(response) => {
                tracing::debug!(status = response.status, "access token validation rejected");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "access token validation failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
