//! Session gate: an "already authenticated this session" flag in front of the
//! guard, so repeated mounts don't re-validate on every render.
//!
//! The flag is dropped whenever tokens are cleared or replaced by a login or
//! another context, and it is only trusted while an access token is still
//! present in the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::guard::{RouteClass, SessionGuard};
use crate::notify::{AuthEvent, Notifier, Subscription};
use crate::store::{TokenKey, TokenStore};

pub struct SessionGate {
    guard: Arc<SessionGuard>,
    store: Arc<dyn TokenStore>,
    authenticated: Arc<AtomicBool>,
    _reset_on_change: Subscription,
}

impl SessionGate {
    pub fn new(guard: Arc<SessionGuard>, store: Arc<dyn TokenStore>, notifier: &dyn Notifier) -> Self {
        let authenticated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&authenticated);
        let reset_on_change = notifier.subscribe(Arc::new(move |event| {
            if matches!(event, AuthEvent::TokenClearing | AuthEvent::TokenChange) {
                flag.store(false, Ordering::Release);
            }
        }));
        Self { guard, store, authenticated, _reset_on_change: reset_on_change }
    }

    /// Run the guard unless this session already passed it.
    ///
    /// A public route with no access token resolves `false` immediately;
    /// a restricted route always reaches the guard so it can redirect.
    pub async fn ensure(&self, route: RouteClass) -> bool {
        let has_token = self.store.get(TokenKey::AccessToken).is_some();
        if !has_token {
            self.reset();
            if route == RouteClass::Public {
                return false;
            }
        } else if self.authenticated.load(Ordering::Acquire) {
            return true;
        }

        let ok = self.guard.check_and_refresh(route).await;
        self.authenticated.store(ok, Ordering::Release);
        ok
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.authenticated.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
