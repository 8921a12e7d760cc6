//! Session guard: validate, refresh, then continue or redirect.
//!
//! STATE MACHINE
//! =============
//! `Idle → Validating → {Valid, Refreshing} → {Valid, Invalid}`
//!
//! Every path ends in exactly one boolean. On `Invalid` the refresher has
//! already cleared the tokens; restricted routes are sent to the login entry
//! point, public routes simply render logged out.
//!
//! The guard does not deduplicate concurrent checks (only the refresher
//! coalesces) and caches nothing between calls. Callers that must not
//! re-check on every render use [`crate::gate::SessionGate`].

use std::sync::Arc;

use crate::refresher::TokenRefresher;
use crate::validator::TokenValidator;

/// Navigation side effect for restricted routes that lost their session.
pub trait Redirect: Send + Sync {
    fn redirect(&self, target: &str);
}

/// Failure policy of a page or view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Degrades silently to "not logged in".
    Public,
    /// Redirects to login on unrecoverable auth failure.
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Validating,
    Refreshing,
    Valid,
    Invalid,
}

pub struct SessionGuard {
    validator: Arc<TokenValidator>,
    refresher: Arc<TokenRefresher>,
    redirect: Arc<dyn Redirect>,
    login_path: String,
}

impl SessionGuard {
    pub fn new(
        validator: Arc<TokenValidator>,
        refresher: Arc<TokenRefresher>,
        redirect: Arc<dyn Redirect>,
        login_path: impl Into<String>,
    ) -> Self {
        Self { validator, refresher, redirect, login_path: login_path.into() }
    }

    /// Ensure the session is usable for a route of class `route`.
    pub async fn check_and_refresh(&self, route: RouteClass) -> bool {
        let state = step(route, GuardState::Idle, GuardState::Validating);
        if self.validator.validate().await {
            step(route, state, GuardState::Valid);
            return true;
        }

        let state = step(route, state, GuardState::Refreshing);
        if self.refresher.refresh().await {
            step(route, state, GuardState::Valid);
            return true;
        }

        step(route, state, GuardState::Invalid);
        if route == RouteClass::Restricted {
            tracing::info!(login_path = %self.login_path, "session lost on restricted route; redirecting");
            self.redirect.redirect(&self.login_path);
        }
        false
    }
}

fn step(route: RouteClass, from: GuardState, to: GuardState) -> GuardState {
    tracing::debug!(?route, ?from, ?to, "session guard transition");
    to
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
