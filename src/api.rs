//! Backend auth API contract: endpoint URLs, response envelope, payloads.
//!
//! Every backend response is wrapped as `{code, msg, data}` with `code == 0`
//! meaning success. Parsing lives in pure functions so the decision rules
//! (what counts as "valid", what counts as a usable refresh) are testable
//! without a transport.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::SessionConfig;
use crate::error::RequestError;

// =============================================================================
// ENDPOINTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub validate_access_token: String,
    pub refresh_token: String,
}

impl Endpoints {
    #[must_use]
    pub fn new(base_url: &str, api_prefix: &str) -> Self {
        let root = format!("{}/{}", base_url.trim_end_matches('/'), api_prefix.trim_matches('/'));
        Self {
            login: format!("{root}/login"),
            validate_access_token: format!("{root}/validateAccessToken"),
            refresh_token: format!("{root}/refreshToken"),
        }
    }

    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(&config.base_url, &config.api_prefix)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Standard response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateData {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefreshData {
    pub success: bool,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub success: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Tokens issued by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IssuedTokens(<redacted>)")
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Decode an envelope and return its `data`, rejecting non-zero codes.
///
/// # Errors
///
/// [`RequestError::Decode`] for bodies that are not a well-formed envelope or
/// lack `data`; [`RequestError::Api`] when `code != 0`.
pub fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, RequestError> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|e| RequestError::Decode(e.to_string()))?;
    if envelope.code != 0 {
        return Err(RequestError::Api { code: envelope.code, msg: envelope.msg.unwrap_or_default() });
    }
    envelope
        .data
        .ok_or_else(|| RequestError::Decode("envelope missing data".into()))
}

/// `true` only for an explicit `{code: 0, data: {valid: true}}`.
#[must_use]
pub fn parse_validate(body: &str) -> bool {
    parse_envelope::<ValidateData>(body).is_ok_and(|data| data.valid)
}

/// The new access token, if the refresh succeeded with a usable token.
#[must_use]
pub fn parse_refresh(body: &str) -> Option<String> {
    let data = parse_envelope::<RefreshData>(body).ok()?;
    if !data.success {
        return None;
    }
    data.access_token.filter(|token| !token.is_empty())
}

/// Both tokens from a login response.
///
/// # Errors
///
/// Envelope errors as in [`parse_envelope`]; [`RequestError::Decode`] when
/// `success` is true but a token is missing; [`RequestError::Api`] when the
/// backend reports `success: false`.
pub fn parse_login(body: &str) -> Result<IssuedTokens, RequestError> {
    let data = parse_envelope::<LoginData>(body)?;
    if !data.success {
        return Err(RequestError::Api { code: 0, msg: "login unsuccessful".into() });
    }
    let access_token = data.access_token.filter(|t| !t.is_empty());
    let refresh_token = data.refresh_token.filter(|t| !t.is_empty());
    match (access_token, refresh_token) {
        (Some(access_token), Some(refresh_token)) => Ok(IssuedTokens { access_token, refresh_token }),
        _ => Err(RequestError::Decode("login response missing tokens".into())),
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
