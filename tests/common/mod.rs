//! Shared harness: real servers on random ports, spoken to over raw TCP.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use taxiway::config::{Auth, Config, Database, Server as ServerConfig};
use taxiway::house_rule::{HouseRules, Store};
use taxiway::{Info, Module, Registry, Router, server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const JWT_SECRET: &str = "test-secret-that-is-at-least-32b!";

/// Config bound to 127.0.0.1 on a random port with an in-memory database.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: Database {
            url: ":memory:".to_string(),
        },
        auth: Auth {
            jwt_secret: JWT_SECRET.to_string(),
            token_expiry_days: 1,
        },
        ..Default::default()
    }
}

/// Start a server for `router`.
pub async fn start(router: Router) -> server::Server {
    start_with(test_config(), router).await
}

/// Start a server for `router` under `config`.
pub async fn start_with(config: Config, router: Router) -> server::Server {
    server::start(Arc::new(config), router.into_handle())
        .await
        .expect("failed to start test server")
}

/// Start the house-rules API with its OpenAPI document at `/openapi.json`.
///
/// The returned database must outlive the server.
pub async fn start_house_rules() -> (server::Server, libsql::Database) {
    start_house_rules_with(test_config()).await
}

/// [`start_house_rules`] under `config`.
pub async fn start_house_rules_with(config: Config) -> (server::Server, libsql::Database) {
    let database = taxiway::db::connect(":memory:").await.unwrap();
    let store = Store::open(&database).await.unwrap();

    let mut router = Router::new();
    let mut registry = Registry::new();
    HouseRules::new(store)
        .routes(&mut router, &mut registry)
        .unwrap();
    router
        .openapi(
            "/openapi.json",
            &registry,
            Info {
                title: "House Rules API",
                version: "test",
            },
        )
        .unwrap();

    (start_with(config, router).await, database)
}

/// A signed token for `user`.
pub fn token(user: &str) -> String {
    taxiway::auth::create_token(&test_config().auth, user).unwrap()
}

/// Send a raw HTTP/1.1 request with `Connection: close` and read the full response.
pub async fn raw_request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream.write_all(payload).await.expect("failed to write");

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        stream.read_to_end(&mut buf),
    )
    .await;
    buf
}

/// Send a partial request and return the open stream (for slowloris-style tests).
pub async fn raw_partial_request(addr: SocketAddr, payload: &[u8]) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream
        .write_all(payload)
        .await
        .expect("failed to write partial request");
    stream
}

/// A parsed response: status, lowercased header block, JSON body (`Null` when empty).
pub struct Reply {
    pub status: u16,
    pub headers: String,
    pub body: Value,
}

/// Send a JSON request and parse the response.
pub async fn request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: Option<&Value>,
    bearer: Option<&str>,
) -> Reply {
    let payload = body.map(Value::to_string).unwrap_or_default();
    let mut head = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n",
        payload.len()
    );
    if body.is_some() {
        head.push_str("Content-Type: application/json\r\n");
    }
    if let Some(token) = bearer {
        head.push_str(&format!("Authorization: Bearer {token}\r\n"));
    }
    head.push_str("\r\n");
    head.push_str(&payload);

    let raw = raw_request(addr, head.as_bytes()).await;
    parse(&raw)
}

fn parse(raw: &[u8]) -> Reply {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text.as_ref(), ""));
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
    };
    Reply {
        status,
        headers: head.to_ascii_lowercase(),
        body,
    }
}
