//! Shared test harness: start a server on an ephemeral port and talk raw
//! HTTP/1.1 to it.

use std::net::SocketAddr;
use std::sync::Arc;

use subhub::config::{Auth, Config, Database, Server as ServerConfig};
use subhub::router::Router;
use subhub::{app, db, server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const SECRET: &str = "integration-secret-at-least-32-bytes";

pub struct TestServer {
    pub server: server::Server,
    // Held so the database file outlives the server.
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub fn addr(&self) -> SocketAddr {
        self.server.addr()
    }

    pub async fn shutdown(self) {
        self.server.shutdown().await.unwrap();
    }
}

pub fn config(dir: &tempfile::TempDir, server_cfg: ServerConfig) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..server_cfg
        },
        database: Database {
            url: dir.path().join("subhub.db").display().to_string(),
            auth_token: None,
        },
        auth: Auth {
            jwt_secret: SECRET.to_string(),
            token_expiry_hours: 1,
        },
    }
}

/// Start the full application with default server settings.
pub async fn start_app() -> TestServer {
    start_app_with(ServerConfig::default()).await
}

pub async fn start_app_with(server_cfg: ServerConfig) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, server_cfg);
    let db = db::open(&config.database).await.expect("failed to open database");
    let router = app::build(db).expect("failed to build router");
    let server = server::start(Arc::new(config), router.into_handle())
        .await
        .expect("failed to start test server");
    TestServer { server, _dir: dir }
}

/// Start a server around a hand-built router.
pub async fn start_router(router: Router) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, ServerConfig::default());
    let server = server::start(Arc::new(config), router.into_handle())
        .await
        .expect("failed to start test server");
    TestServer { server, _dir: dir }
}

/// A parsed HTTP/1.1 response.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", self.body))
    }
}

/// Send a raw HTTP/1.1 request with `Connection: close` and read the full response.
pub async fn raw_request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream.write_all(payload).await.expect("failed to write");

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        stream.read_to_end(&mut buf),
    )
    .await;
    buf
}

pub fn parse(raw: &[u8]) -> Reply {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text
        .split_once("\r\n\r\n")
        .unwrap_or_else(|| panic!("incomplete response:\n{text}"));
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or_else(|| panic!("bad status line:\n{text}"));
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    Reply {
        status,
        headers,
        body: body.to_string(),
    }
}

/// Send a request with optional extra headers and JSON body.
pub async fn send(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> Reply {
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n");
    for (name, value) in headers {
        req.push_str(&format!("{name}: {value}\r\n"));
    }
    if let Some(body) = body {
        req.push_str("Content-Type: application/json\r\n");
        req.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
    } else {
        req.push_str("\r\n");
    }
    parse(&raw_request(addr, req.as_bytes()).await)
}

pub async fn get(addr: SocketAddr, path: &str, token: Option<&str>) -> Reply {
    let auth = token.map(|t| format!("Bearer {t}"));
    let headers: Vec<(&str, &str)> = auth.iter().map(|a| ("Authorization", a.as_str())).collect();
    send(addr, "GET", path, &headers, None).await
}

pub async fn with_body(
    addr: SocketAddr,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: &serde_json::Value,
) -> Reply {
    let auth = token.map(|t| format!("Bearer {t}"));
    let headers: Vec<(&str, &str)> = auth.iter().map(|a| ("Authorization", a.as_str())).collect();
    send(addr, method, path, &headers, Some(&body.to_string())).await
}

/// Log in and return the bearer token.
pub async fn login(addr: SocketAddr, username: &str, password: &str) -> String {
    let reply = with_body(
        addr,
        "POST",
        "/api/user/login",
        None,
        &serde_json::json!({ "username": username, "password": password }),
    )
    .await;
    assert_eq!(reply.status, 200, "login failed: {}", reply.body);
    reply.json()["data"]["token"]
        .as_str()
        .expect("token missing")
        .to_string()
}
