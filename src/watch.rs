//! Storage watcher: the cross-context half of auth notifications.
//!
//! Another process sharing the token file mutates it without going through
//! our notifier. The watcher polls the store and emits `TokenChange` when the
//! persisted tokens differ from the last value it saw. Local events move its
//! baseline forward, so same-context mutations are not announced twice.
//!
//! A local mutation that lands between its store write and its event may
//! still be reported once more as `TokenChange`; consumers re-read the store
//! on every event, so a duplicate is harmless.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::notify::{AuthEvent, Notifier, Subscription};
use crate::store::{Session, TokenStore};

fn lock(baseline: &Mutex<Session>) -> MutexGuard<'_, Session> {
    baseline.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Running watcher. Dropping it stops polling.
pub struct StorageWatcher {
    task: JoinHandle<()>,
    _baseline_sync: Subscription,
}

impl StorageWatcher {
    #[must_use]
    pub fn spawn(store: Arc<dyn TokenStore>, notifier: Arc<dyn Notifier>, interval: Duration) -> Self {
        let baseline = Arc::new(Mutex::new(store.snapshot()));

        let sync_store = Arc::clone(&store);
        let sync_baseline = Arc::clone(&baseline);
        let baseline_sync = notifier.subscribe(Arc::new(move |_| {
            *lock(&sync_baseline) = sync_store.snapshot();
        }));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let current = store.snapshot();
                let changed = {
                    let mut seen = lock(&baseline);
                    if *seen == current {
                        false
                    } else {
                        *seen = current;
                        true
                    }
                };
                if changed {
                    tracing::debug!("token storage changed outside this context");
                    notifier.emit(AuthEvent::TokenChange);
                }
            }
        });

        Self { task, _baseline_sync: baseline_sync }
    }

    pub fn stop(self) {}
}

impl Drop for StorageWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "watch_test.rs"]
mod tests;
