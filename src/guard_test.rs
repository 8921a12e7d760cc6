use super::*;
use std::time::Duration;

use crate::config::RetryPolicy;
use crate::error::TransportError;
use crate::notify::AuthEvent;
use crate::request::{AuthInterceptor, AuthenticatedClient};
use crate::store::{TokenKey, TokenStore};
use crate::test_helpers::*;

fn guard(h: &Harness) -> SessionGuard {
    let refresher = Arc::new(TokenRefresher::new(
        h.store.clone(),
        h.notifier.clone(),
        h.transport.clone(),
        REFRESH_URL,
        Duration::from_secs(5),
    ));
    let interceptor = Arc::new(AuthInterceptor::new(h.store.clone(), refresher.clone()));
    let client = Arc::new(AuthenticatedClient::new(
        h.transport.clone(),
        interceptor,
        Duration::from_secs(5),
        RetryPolicy { retries: 0, delay: Duration::ZERO },
    ));
    let validator = Arc::new(TokenValidator::new(client, VALIDATE_URL));
    SessionGuard::new(validator, refresher, h.redirect.clone(), "/login")
}

#[tokio::test]
async fn valid_token_short_circuits() {
    let h = harness(Some("A"), Some("R"));
    h.transport.on(VALIDATE_URL, validate_reply(true));

    assert!(guard(&h).check_and_refresh(RouteClass::Restricted).await);

    assert_eq!(h.transport.calls_to(REFRESH_URL), 0);
    assert!(h.redirect.targets().is_empty());
}

#[tokio::test]
async fn sequential_checks_validate_independently() {
    let h = harness(Some("A"), Some("R"));
    h.transport.on(VALIDATE_URL, validate_reply(true));
    let guard = guard(&h);

    assert!(guard.check_and_refresh(RouteClass::Public).await);
    assert!(guard.check_and_refresh(RouteClass::Public).await);

    assert_eq!(h.transport.calls_to(VALIDATE_URL), 2);
}

#[tokio::test]
async fn invalid_token_recovered_by_refresh() {
    let h = harness(Some("A"), Some("R"));
    h.transport.on(VALIDATE_URL, validate_reply(false));
    h.transport.on(REFRESH_URL, refresh_reply("B"));

    assert!(guard(&h).check_and_refresh(RouteClass::Restricted).await);

    assert_eq!(h.store.get(TokenKey::AccessToken).as_deref(), Some("B"));
    assert_eq!(h.store.get(TokenKey::RefreshToken).as_deref(), Some("R"));
    assert!(h.redirect.targets().is_empty());
}

#[tokio::test]
async fn validation_network_error_still_attempts_refresh() {
    let h = harness(Some("A"), Some("R"));
    h.transport.on(VALIDATE_URL, Reply::fail(TransportError::Network("offline".into())));
    h.transport.on(REFRESH_URL, refresh_reply("B"));

    assert!(guard(&h).check_and_refresh(RouteClass::Public).await);
    assert_eq!(h.store.get(TokenKey::AccessToken).as_deref(), Some("B"));
}

#[tokio::test]
async fn restricted_failure_redirects_exactly_once() {
    let h = harness(Some("A"), Some("R"));
    h.transport.on(VALIDATE_URL, validate_reply(false));
    h.transport.on(REFRESH_URL, refresh_rejected_reply());
    let (_sub, events) = record_events(h.notifier.as_ref());

    assert!(!guard(&h).check_and_refresh(RouteClass::Restricted).await);

    assert_eq!(h.redirect.targets(), vec!["/login".to_owned()]);
    assert!(h.store.snapshot().is_empty());
    assert_eq!(*events.lock().unwrap(), vec![AuthEvent::TokenClearing]);
}

#[tokio::test]
async fn public_failure_does_not_redirect() {
    let h = harness(Some("A"), Some("R"));
    h.transport.on(VALIDATE_URL, validate_reply(false));
    h.transport.on(REFRESH_URL, refresh_rejected_reply());

    assert!(!guard(&h).check_and_refresh(RouteClass::Public).await);

    assert!(h.redirect.targets().is_empty());
    assert!(h.store.snapshot().is_empty());
}

#[tokio::test]
async fn no_tokens_restricted_redirects_public_does_not() {
    let h = harness(None, None);
    h.transport.on(VALIDATE_URL, Reply::status(401, ""));
    let guard = guard(&h);

    assert!(!guard.check_and_refresh(RouteClass::Restricted).await);
    assert_eq!(h.redirect.targets().len(), 1);

    assert!(!guard.check_and_refresh(RouteClass::Public).await);
    assert_eq!(h.redirect.targets().len(), 1);
    assert_eq!(h.transport.calls_to(REFRESH_URL), 0);
}
