use super::*;
use mockito::Matcher;
use serde_json::json;

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Timeouts { request: Duration::from_secs(5), connect: Duration::from_secs(1) }).unwrap()
}

// =============================================================
// HttpRequest helpers
// =============================================================

#[test]
fn set_header_replaces_case_insensitively() {
    let mut req = HttpRequest::new(Method::GET, "http://x", Duration::from_secs(1));
    req.set_header("authorization", "Bearer A");
    req.set_header("Authorization", "Bearer B");
    assert_eq!(req.headers.len(), 1);
    assert_eq!(req.bearer_token(), Some("B"));

    req.remove_header("AUTHORIZATION");
    assert!(req.bearer_token().is_none());
}

#[test]
fn response_success_range() {
    assert!(HttpResponse::new(204, "").is_success());
    assert!(!HttpResponse::new(401, "").is_success());
    assert!(!HttpResponse::new(302, "").is_success());
}

// =============================================================
// ReqwestTransport
// =============================================================

#[tokio::test]
async fn sends_json_body_headers_and_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/article/list")
        .match_header("authorization", "Bearer A")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("tag".into(), "rust".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .match_body(Matcher::Json(json!({ "title": "hello" })))
        .with_status(200)
        .with_body(r#"{"code":0,"data":[]}"#)
        .create_async()
        .await;

    let mut req = HttpRequest::new(Method::POST, format!("{}/api/v1/article/list", server.url()), Duration::from_secs(5));
    req.query = vec![("tag".into(), "rust".into()), ("page".into(), "2".into())];
    req.set_header("Authorization", "Bearer A");
    req.body = Some(Body::Json(json!({ "title": "hello" })));

    let resp = transport().send(&req).await.unwrap();
    assert_eq!(resp, HttpResponse::new(200, r#"{"code":0,"data":[]}"#));
    mock.assert_async().await;
}

#[tokio::test]
async fn sends_form_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/login")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("account".into(), "alice".into()),
            Matcher::UrlEncoded("password".into(), "pw".into()),
        ]))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let mut req = HttpRequest::new(Method::POST, format!("{}/login", server.url()), Duration::from_secs(5));
    req.body = Some(Body::Form(vec![("account".into(), "alice".into()), ("password".into(), "pw".into())]));

    transport().send(&req).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_returned_not_raised() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/protected")
        .with_status(401)
        .with_body("expired")
        .create_async()
        .await;

    let req = HttpRequest::new(Method::GET, format!("{}/protected", server.url()), Duration::from_secs(5));
    let resp = transport().send(&req).await.unwrap();
    assert_eq!(resp.status, 401);
    assert_eq!(resp.body, "expired");
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let req = HttpRequest::new(Method::GET, format!("http://{addr}/slow"), Duration::from_millis(100));
    let err = transport().send(&req).await.unwrap_err();
    assert_eq!(err, TransportError::TimedOut);
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let req = HttpRequest::new(Method::GET, format!("http://{addr}/"), Duration::from_secs(2));
    let err = transport().send(&req).await.unwrap_err();
    assert!(matches!(err, TransportError::Network(_)), "{err:?}");
}
