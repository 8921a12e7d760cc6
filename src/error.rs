//! Error taxonomy shared by the transport, request wrapper and session layers.
//!
//! DESIGN
//! ======
//! Each concern owns a `thiserror` enum. All of them implement [`ErrorCode`]
//! so callers can branch on a stable string code and on retryability without
//! matching every variant. The validator, refresher and guard never surface
//! these errors; they fold them into boolean outcomes.

// =============================================================================
// ERROR CODE
// =============================================================================

/// Stable machine-readable classification for an error.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Failures raised by an [`crate::transport::HttpTransport`] before any HTTP
/// status is available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The call did not complete within its deadline.
    #[error("request timed out")]
    TimedOut,

    /// Connection, TLS or body read failure.
    #[error("network failure: {0}")]
    Network(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TimedOut => "E_TIMED_OUT",
            Self::Network(_) => "E_NETWORK",
            Self::ClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Errors produced by the authenticated request wrapper and its typed helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The HTTP call exceeded the caller's timeout.
    #[error("request timed out")]
    TimedOut,

    /// The request never produced a response.
    #[error("network failure: {0}")]
    Network(String),

    /// The backend rejected the credentials (HTTP 401), after any refresh.
    #[error("unauthorized")]
    Unauthorized,

    /// HTTP 403.
    #[error("forbidden")]
    Forbidden,

    /// HTTP 404.
    #[error("resource not found")]
    NotFound,

    /// Any other 4xx status.
    #[error("client error: status {status}")]
    Client { status: u16 },

    /// Any 5xx status.
    #[error("server error: status {status}")]
    Server { status: u16 },

    /// The envelope carried a non-zero application code.
    #[error("api error {code}: {msg}")]
    Api { code: i64, msg: String },

    /// The response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl RequestError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::Server { status },
            _ => Self::Client { status },
        }
    }
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::TimedOut => Self::TimedOut,
            TransportError::Network(msg) | TransportError::ClientBuild(msg) => Self::Network(msg),
        }
    }
}

impl ErrorCode for RequestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TimedOut => "E_TIMED_OUT",
            Self::Network(_) => "E_NETWORK",
            Self::Unauthorized => "E_UNAUTHORIZED",
            Self::Forbidden => "E_FORBIDDEN",
            Self::NotFound => "E_NOT_FOUND",
            Self::Client { .. } => "E_CLIENT",
            Self::Server { .. } => "E_SERVER",
            Self::Api { .. } => "E_API",
            Self::Decode(_) => "E_DECODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Errors from explicit session operations such as login.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The backend answered but refused to open a session.
    #[error("login rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "E_LOGIN_REJECTED",
            Self::Request(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Rejected(_) => false,
            Self::Request(e) => e.retryable(),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
