//! Auth-state notifications.
//!
//! DESIGN
//! ======
//! Events carry no payload; consumers re-read the token store. Same-context
//! delivery is synchronous and ordered by registration. Other contexts learn
//! about changes through the storage layer instead (see [`crate::watch`]),
//! with no ordering guarantee relative to local events.
//!
//! Handlers are invoked outside the registry lock, so a handler may
//! subscribe or unsubscribe while it runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

/// Kind of auth-state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// Tokens were set by a login, or changed by another context.
    TokenChange,
    /// Tokens were cleared (logout or terminal refresh failure).
    TokenClearing,
    /// The access token was replaced by a successful refresh.
    TokenUpdating,
}

impl AuthEvent {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TokenChange => "tokenChange",
            Self::TokenClearing => "tokenClearing",
            Self::TokenUpdating => "tokenUpdating",
        }
    }
}

pub type Handler = Arc<dyn Fn(AuthEvent) + Send + Sync>;

/// Publish/subscribe channel for [`AuthEvent`]s.
pub trait Notifier: Send + Sync {
    /// Deliver `event` to every current subscriber before returning.
    fn emit(&self, event: AuthEvent);

    /// Register `handler`. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    fn subscribe(&self, handler: Handler) -> Subscription;
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Registration handle. Dropping it removes the handler.
#[must_use = "dropping a Subscription unsubscribes its handler immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the handler registered for the lifetime of the notifier.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}

// =============================================================================
// LOCAL NOTIFIER
// =============================================================================

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process event bus.
#[derive(Clone, Default)]
pub struct LocalNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl LocalNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).handlers.len()
    }
}

impl Notifier for LocalNotifier {
    fn emit(&self, event: AuthEvent) {
        let handlers: Vec<Handler> = lock(&self.registry)
            .handlers
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        tracing::debug!(event = event.name(), listeners = handlers.len(), "auth event");
        for handler in handlers {
            handler(event);
        }
    }

    fn subscribe(&self, handler: Handler) -> Subscription {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.push((id, handler));
            id
        };

        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                lock(&registry).handlers.retain(|(hid, _)| *hid != id);
            }
        })
    }
}

impl std::fmt::Debug for LocalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalNotifier").field("subscribers", &self.subscriber_count()).finish()
    }
}

/// Forward events into a channel holding at most `capacity` undelivered
/// events. Events emitted while the channel is full are dropped and logged.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn subscribe_channel(notifier: &dyn Notifier, capacity: usize) -> (Subscription, mpsc::Receiver<AuthEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    let subscription = notifier.subscribe(Arc::new(move |event| {
        if let Err(mpsc::error::TrySendError::Full(dropped)) = tx.try_send(event) {
            tracing::warn!(event = dropped.name(), "auth event channel full; event dropped");
        }
    }));
    (subscription, rx)
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
