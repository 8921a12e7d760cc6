//! Shared fakes for unit tests: a scripted transport, a recording
//! redirector and an event log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use crate::error::TransportError;
use crate::guard::Redirect;
use crate::notify::{AuthEvent, LocalNotifier, Notifier, Subscription};
use crate::store::MemoryTokenStore;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

pub const VALIDATE_URL: &str = "http://blog.test/api/v1/user/validateAccessToken";
pub const REFRESH_URL: &str = "http://blog.test/api/v1/user/refreshToken";
pub const LOGIN_URL: &str = "http://blog.test/api/v1/user/login";
pub const PROTECTED_URL: &str = "http://blog.test/api/v1/article/add";

// =========================================================================
// Replies
// =========================================================================

#[derive(Clone, Debug)]
pub struct Reply {
    pub delay: Duration,
    pub result: Result<HttpResponse, TransportError>,
}

impl Reply {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self { delay: Duration::ZERO, result: Ok(HttpResponse::new(status, body)) }
    }

    pub fn ok_json(body: serde_json::Value) -> Self {
        Self::status(200, body.to_string())
    }

    pub fn fail(err: TransportError) -> Self {
        Self { delay: Duration::ZERO, result: Err(err) }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub fn validate_reply(valid: bool) -> Reply {
    Reply::ok_json(json!({ "code": 0, "data": { "valid": valid } }))
}

pub fn refresh_reply(access_token: &str) -> Reply {
    Reply::ok_json(json!({ "code": 0, "data": { "success": true, "access_token": access_token } }))
}

pub fn refresh_rejected_reply() -> Reply {
    Reply::ok_json(json!({ "code": 40102, "msg": "refresh token invalid", "data": { "success": false } }))
}

pub fn login_reply(access_token: &str, refresh_token: &str) -> Reply {
    Reply::ok_json(json!({
        "code": 0,
        "msg": "ok",
        "data": { "success": true, "access_token": access_token, "refresh_token": refresh_token }
    }))
}

// =========================================================================
// ScriptedTransport
// =========================================================================

type Route = Box<dyn Fn(&HttpRequest, usize) -> Reply + Send + Sync>;

/// Transport answering per URL from scripted replies and recording every call.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Always answer `url` with `reply`.
    pub fn on(&self, url: &str, reply: Reply) {
        self.on_fn(url, move |_, _| reply.clone());
    }

    /// Answer successive calls with `replies`, repeating the last one.
    pub fn on_sequence(&self, url: &str, replies: Vec<Reply>) {
        assert!(!replies.is_empty());
        self.on_fn(url, move |_, n| replies[n.min(replies.len() - 1)].clone());
    }

    /// Answer from a closure over the request and its per-URL call index.
    pub fn on_fn(&self, url: &str, route: impl Fn(&HttpRequest, usize) -> Reply + Send + Sync + 'static) {
        self.routes.lock().unwrap().insert(url.to_owned(), Box::new(route));
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.url == url).count()
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let index = self.calls_to(&request.url);
            self.calls.lock().unwrap().push(request.clone());
            let routes = self.routes.lock().unwrap();
            match routes.get(&request.url) {
                Some(route) => route(request, index),
                None => Reply::status(404, "not found"),
            }
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

// =========================================================================
// RecordingRedirect / event log
// =========================================================================

#[derive(Default)]
pub struct RecordingRedirect {
    targets: Mutex<Vec<String>>,
}

impl RecordingRedirect {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl Redirect for RecordingRedirect {
    fn redirect(&self, target: &str) {
        self.targets.lock().unwrap().push(target.to_owned());
    }
}

pub type EventLog = Arc<Mutex<Vec<AuthEvent>>>;

pub fn record_events(notifier: &dyn Notifier) -> (Subscription, EventLog) {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let sub = notifier.subscribe(Arc::new(move |event| sink.lock().unwrap().push(event)));
    (sub, log)
}

// =========================================================================
// Harness
// =========================================================================

pub struct Harness {
    pub store: Arc<MemoryTokenStore>,
    pub notifier: Arc<LocalNotifier>,
    pub transport: Arc<ScriptedTransport>,
    pub redirect: Arc<RecordingRedirect>,
}

pub fn harness(access_token: Option<&str>, refresh_token: Option<&str>) -> Harness {
    Harness {
        store: Arc::new(MemoryTokenStore::with_tokens(access_token, refresh_token)),
        notifier: Arc::new(LocalNotifier::new()),
        transport: ScriptedTransport::new(),
        redirect: RecordingRedirect::new(),
    }
}
