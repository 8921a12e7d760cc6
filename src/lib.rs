//! Client-side session management for access/refresh token backends.
//!
//! A [`session::SessionManager`] keeps a token pair in a [`store::TokenStore`],
//! attaches the access token to outgoing requests, refreshes it once on 401
//! (coalescing concurrent refreshes), and guards routes with a
//! validate-then-refresh check.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod guard;
pub mod notify;
pub mod refresher;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;
pub mod validator;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
