//! Access-control security tests.
//!
//! Drives the `can_access` step through bound routes on a real server:
//! rejected requests must never reach the handler, and the generated document
//! must mark exactly the routes that carry the step as secured.

use serde_json::{Value, json};
use taxiway::{Binder, Context, Middleware, Registry, Reply, Router, Schemas, auth};

use crate::common::{JWT_SECRET, raw_request, request, start, start_house_rules, token};

fn forged_none_token() -> String {
    use base64::Engine;
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = engine.encode(
        json!({ "sub": "host-1", "exp": 9999999999i64, "iat": 1700000000 }).to_string(),
    );
    format!("{header}.{payload}.")
}

fn expired_token() -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({ "sub": "host-1", "exp": 1700000000i64, "iat": 1690000000i64 }),
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn foreign_token() -> String {
    let other = taxiway::config::Auth {
        jwt_secret: "another_secret_that_is_32_bytes!!".to_string(),
        token_expiry_days: 1,
    };
    auth::create_token(&other, "host-1").unwrap()
}

/// Reseed is the only secured house-rules route. Every bad credential is
/// turned away with 401 before the store is touched.
#[tokio::test]
async fn reseed_rejects_bad_credentials_without_running() {
    let (server, _db) = start_house_rules().await;
    let addr = server.addr();

    request(addr, "POST", "/house-rules", Some(&json!({ "rule": "Keep me" })), None).await;

    let mut statuses = Vec::new();
    for bearer in [
        None,
        Some("not-a-token".to_string()),
        Some(forged_none_token()),
        Some(expired_token()),
        Some(foreign_token()),
    ] {
        let reply = request(addr, "POST", "/house-rules/seed", None, bearer.as_deref()).await;
        statuses.push(reply.status);
    }
    let basic = raw_request(
        addr,
        b"POST /house-rules/seed HTTP/1.1\r\nHost: localhost\r\nAuthorization: Basic aG9zdDpwdw==\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    let listed = request(addr, "GET", "/house-rules", None, None).await;

    server.shutdown().await.unwrap();

    assert_eq!(statuses, vec![401; 5]);
    assert!(String::from_utf8_lossy(&basic).starts_with("HTTP/1.1 401"));
    let rules: Vec<&str> = listed.body.as_array().unwrap().iter().map(|r| r["rule"].as_str().unwrap()).collect();
    assert_eq!(rules, vec!["Keep me"], "a rejected reseed must not modify the store");
}

/// The bearer scheme is matched case-insensitively (RFC 7235).
#[tokio::test]
async fn reseed_accepts_lowercase_bearer_scheme() {
    let (server, _db) = start_house_rules().await;
    let request_bytes = format!(
        "POST /house-rules/seed HTTP/1.1\r\nHost: localhost\r\nAuthorization: bearer {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        token("host-1")
    );
    let response = raw_request(server.addr(), request_bytes.as_bytes()).await;
    server.shutdown().await.unwrap();

    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 200"), "got:\n{response}");
}

async fn whoami(ctx: Context) -> taxiway::Result<Reply> {
    let user = ctx.require_user()?;
    Reply::ok(&json!({ "user": user }))
}

/// The step hands the token subject to the handler, and the route is
/// documented with the bearer requirement.
#[tokio::test]
async fn authenticated_subject_reaches_handler() {
    let mut router = Router::new();
    let mut registry = Registry::new();
    Binder::new("/hosts", &mut router, &mut registry)
        .get("/me", Schemas::none(), [auth::can_access(), Middleware::handler(whoami)])
        .unwrap();
    let secured = registry.operation("get", "/hosts/me").unwrap().secured;
    let server = start(router).await;

    let reply = request(server.addr(), "GET", "/hosts/me", None, Some(&token("host-42"))).await;
    server.shutdown().await.unwrap();

    assert!(secured);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, json!({ "user": "host-42" }));
}

/// Only operations carrying the access-control step require a token in the
/// served document; the rest advertise no security requirement.
#[tokio::test]
async fn document_marks_only_access_controlled_routes() {
    let (server, _db) = start_house_rules().await;
    let doc = request(server.addr(), "GET", "/openapi.json", None, None).await.body;
    server.shutdown().await.unwrap();

    let mut secured = Vec::new();
    for (path, item) in doc["paths"].as_object().unwrap() {
        for (method, op) in item.as_object().unwrap() {
            if op["security"] != Value::Array(Vec::new()) {
                secured.push(format!("{method} {path}"));
            }
        }
    }
    assert_eq!(secured, vec!["post /house-rules/seed"]);
}
