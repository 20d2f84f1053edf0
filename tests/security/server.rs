//! Server hardening tests against the house-rules API.
//!
//! Each test starts the real server, speaks raw TCP to it and checks what a
//! client observes: configured limits, standard headers on every kind of
//! reply, and panic isolation inside a bound chain.

use std::time::Duration;

use serde_json::json;
use taxiway::config::{Config, Limits};
use taxiway::{Binder, Context, Middleware, Registry, Reply, Router, Schemas};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::common::{
    raw_partial_request, raw_request, request, start, start_house_rules, start_house_rules_with,
    test_config,
};

fn limited(limits: Limits) -> Config {
    Config {
        limits,
        ..test_config()
    }
}

/// A declared Content-Length over the limit is refused from the headers
/// alone; a body that is too long is refused even when the rule itself is
/// valid.
#[tokio::test]
async fn body_limit_applies_before_validation() {
    let (server, _db) = start_house_rules_with(limited(Limits {
        max_body_bytes: 64,
        ..Limits::default()
    }))
    .await;
    let addr = server.addr();

    let declared = raw_request(
        addr,
        b"POST /house-rules HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10485760\r\nConnection: close\r\n\r\n",
    )
    .await;
    let long_rule = "No loud music after ten in the evening, please respect the neighbours.";
    let too_long = request(addr, "POST", "/house-rules", Some(&json!({ "rule": long_rule })), None).await;
    let short = request(addr, "POST", "/house-rules", Some(&json!({ "rule": "No pets" })), None).await;

    server.shutdown().await.unwrap();

    let declared = String::from_utf8_lossy(&declared);
    assert!(declared.starts_with("HTTP/1.1 413"), "got:\n{declared}");
    assert_eq!(too_long.status, 413);
    assert_eq!(too_long.body, json!({ "error": "Payload too large" }));
    assert_eq!(short.status, 200);
}

/// Connections beyond the configured limit are answered with a JSON 503
/// while the admitted ones are still served.
#[tokio::test]
async fn connection_limit_answers_503() {
    let (server, _db) = start_house_rules_with(limited(Limits {
        max_connections: 2,
        ..Limits::default()
    }))
    .await;
    let addr = server.addr();

    let mut streams = Vec::new();
    for _ in 0..4 {
        streams.push(TcpStream::connect(addr).await.expect("failed to connect"));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut responses = Vec::new();
    for mut stream in streams {
        stream
            .write_all(b"GET /house-rules HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("failed to write");
        let mut buf = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
        responses.push(String::from_utf8_lossy(&buf).into_owned());
    }

    server.shutdown().await.unwrap();

    assert!(responses[0].starts_with("HTTP/1.1 200"), "got:\n{}", responses[0]);
    let rejected: Vec<&String> = responses.iter().filter(|r| r.starts_with("HTTP/1.1 503")).collect();
    assert!(!rejected.is_empty(), "no connection was turned away: {responses:?}");
    assert!(rejected.iter().all(|r| r.contains(r#"{"error":"Service unavailable"}"#)));
}

/// A client that never finishes its headers is disconnected after the
/// configured header timeout.
#[tokio::test]
async fn stalled_headers_are_cut_off() {
    let (server, _db) = start_house_rules_with(limited(Limits {
        header_timeout_ms: 300,
        ..Limits::default()
    }))
    .await;

    let mut stream =
        raw_partial_request(server.addr(), b"GET /house-rules HTTP/1.1\r\nHost: localhost\r\n").await;
    let mut buf = vec![0u8; 4096];
    let result = tokio::time::timeout(Duration::from_secs(3), stream.read(&mut buf)).await;

    server.shutdown().await.unwrap();

    match result {
        Ok(Ok(0)) | Ok(Err(_)) => {}
        Ok(Ok(n)) => {
            let resp = String::from_utf8_lossy(&buf[..n]);
            assert!(resp.contains("408"), "Expected close or 408, got:\n{resp}");
        }
        Err(_) => panic!("stalled connection was still open after 3 seconds"),
    }
}

/// Success, validation failure, missing entity, unrouted path and empty
/// replies all carry the standard headers.
#[tokio::test]
async fn standard_headers_on_every_reply() {
    let (server, _db) = start_house_rules().await;
    let addr = server.addr();

    let created = request(addr, "POST", "/house-rules", Some(&json!({ "rule": "No pets" })), None).await;
    let id = created.body["id"].as_i64().unwrap();
    let replies = vec![
        created,
        request(addr, "POST", "/house-rules", Some(&json!({})), None).await,
        request(addr, "PUT", "/house-rules/999", Some(&json!({ "rule": "x" })), None).await,
        request(addr, "GET", "/nowhere", None, None).await,
        request(addr, "DELETE", &format!("/house-rules/{id}"), None, None).await,
    ];

    server.shutdown().await.unwrap();

    let statuses: Vec<u16> = replies.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![200, 400, 404, 404, 204]);
    for reply in &replies {
        for header in [
            "x-content-type-options: nosniff",
            "x-frame-options: deny",
            "cache-control: no-store",
            "content-security-policy: default-src 'none'",
        ] {
            assert!(reply.headers.contains(header), "missing {header} in:\n{}", reply.headers);
        }
    }
}

/// Unknown paths and methods the collection does not bind get JSON errors.
#[tokio::test]
async fn unrouted_requests_get_json_errors() {
    let (server, _db) = start_house_rules().await;
    let addr = server.addr();

    let missing = request(addr, "GET", "/house-rules/1/comments", None, None).await;
    let not_allowed = request(addr, "PATCH", "/house-rules", None, None).await;

    server.shutdown().await.unwrap();

    assert_eq!(missing.status, 404);
    assert_eq!(missing.body, json!({ "error": "Not found" }));
    assert_eq!(not_allowed.status, 405);
    assert_eq!(not_allowed.body, json!({ "error": "Method not allowed" }));
}

/// A client opening with the HTTP/2 preface gets a SETTINGS frame back.
#[tokio::test]
async fn http2_preface_is_answered() {
    let (server, _db) = start_house_rules().await;

    let mut preface = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n".to_vec();
    // empty SETTINGS frame: length 0, type 0x04, no flags, stream 0
    preface.extend_from_slice(&[0, 0, 0, 0x04, 0x00, 0, 0, 0, 0]);
    let mut stream = TcpStream::connect(server.addr()).await.expect("failed to connect");
    stream.write_all(&preface).await.expect("failed to write");

    let mut buf = vec![0u8; 256];
    let result = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await;

    server.shutdown().await.unwrap();

    let n = match result {
        Ok(Ok(n)) if n > 0 => n,
        other => panic!("no HTTP/2 reply: {other:?}"),
    };
    assert!(n >= 9 && buf[3] == 0x04, "expected SETTINGS frame, got {:?}", &buf[..n.min(32)]);
}

async fn explode(_ctx: Context) -> taxiway::Result<Reply> {
    panic!("rule table corrupted at row 7");
}

async fn slow_listing(_ctx: Context) -> taxiway::Result<Reply> {
    tokio::time::sleep(Duration::from_secs(1)).await;
    Reply::ok(&json!([]))
}

fn hazard_router() -> Router {
    let mut router = Router::new();
    let mut registry = Registry::new();
    Binder::new("/house-rules", &mut router, &mut registry)
        .route("/")
        .get(Schemas::none(), [Middleware::handler(slow_listing)])
        .unwrap()
        .post(Schemas::none(), [Middleware::handler(explode)])
        .unwrap();
    router
}

/// A panicking handler yields the generic 500 and the server keeps serving.
#[tokio::test]
async fn handler_panic_is_contained() {
    let server = start(hazard_router()).await;
    let addr = server.addr();

    let exploded = request(addr, "POST", "/house-rules", None, None).await;
    let after = request(addr, "GET", "/house-rules", None, None).await;

    server.shutdown().await.unwrap();

    assert_eq!(exploded.status, 500);
    assert_eq!(exploded.body, json!({ "error": "Internal server error" }));
    assert_eq!(after.status, 200);
}

/// A request already inside its handler completes after shutdown begins.
#[tokio::test]
async fn in_flight_request_survives_shutdown() {
    let server = start(hazard_router()).await;

    let mut stream = TcpStream::connect(server.addr()).await.expect("failed to connect");
    stream
        .write_all(b"GET /house-rules HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("failed to write");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let shutdown = tokio::spawn(server.shutdown());

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
    let response = String::from_utf8_lossy(&buf);
    assert!(response.starts_with("HTTP/1.1 200"), "got:\n{response}");

    shutdown.await.unwrap().unwrap();
}
