//! End-to-end tests: real sockets, real SQLite file.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlform::db::SqliteConnector;
use sqlform::query::QueryRunner;
use sqlform::web::{self, App, Server, MAX_REQUEST_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::common::{example_db, ALICE};

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<sqlform::error::Result<()>>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start(cache: bool) -> Self {
        let (path, dir) = example_db(ALICE).await;
        let runner = QueryRunner::from_settings(Arc::new(SqliteConnector::for_path(path)), cache);
        let app = App::new(Arc::new(runner), "Test Form");

        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(web::serve(server, app, async move {
            let _ = stopped.await;
        }));

        Self {
            addr,
            stop,
            handle,
            _dir: dir,
        }
    }

    async fn send(&self, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    /// Sends the head, pauses, then trickles the body in small writes.
    async fn send_in_pieces(&self, head: &[u8], body: &[u8]) -> String {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(head).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        for chunk in body.chunks(4096) {
            stream.write_all(chunk).await.unwrap();
            stream.flush().await.unwrap();
            tokio::task::yield_now().await;
        }

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    async fn post_form(&self, query: &str) -> String {
        let body = format!("query={}", query.replace(' ', "+"));
        let raw = format!(
            "POST /query HTTP/1.1\r\nHost: localhost\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        self.send(raw.as_bytes()).await
    }

    async fn stop(self) {
        let _ = self.stop.send(());
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_form_page_is_served() {
    let server = TestServer::start(true).await;

    let response = server
        .send(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html; charset=utf-8"));
    assert!(response.contains("<h1>Test Form</h1>"));
    assert!(response.contains(">SELECT * FROM users</textarea>"));

    server.stop().await;
}

#[tokio::test]
async fn test_form_submission_renders_rows() {
    let server = TestServer::start(false).await;

    let response = server.post_form("SELECT * FROM users").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("<th title=\"INTEGER\">id</th>"));
    assert!(response.contains("<td>Alice</td>"));
    assert!(response.contains("<td class=\"num\">30</td>"));

    server.stop().await;
}

#[tokio::test]
async fn test_bad_query_does_not_stop_server() {
    let server = TestServer::start(true).await;

    let failed = server.post_form("SELECT * FROM nonexistent").await;
    let ok = server.post_form("SELECT name FROM users").await;

    assert!(failed.contains("Error: no such table: nonexistent"));
    assert!(ok.contains("<td>Alice</td>"));

    server.stop().await;
}

#[tokio::test]
async fn test_repeated_query_is_marked_cached() {
    let server = TestServer::start(true).await;

    let first = server.post_form("SELECT * FROM users").await;
    let second = server.post_form("SELECT * FROM users").await;

    assert!(!first.contains("(cached)"));
    assert!(second.contains("(cached)"));

    server.stop().await;
}

#[tokio::test]
async fn test_json_api() {
    let server = TestServer::start(true).await;
    let body = r#"{"query":"SELECT id, name, age FROM users"}"#;
    let raw = format!(
        "POST /api/query HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    let response = server.send(raw.as_bytes()).await;
    let (_, json) = response.split_once("\r\n\r\n").unwrap();
    let json: serde_json::Value = serde_json::from_str(json).unwrap();

    assert_eq!(json["columns"], serde_json::json!(["id", "name", "age"]));
    assert_eq!(json["rows"], serde_json::json!([[1, "Alice", 30]]));
    assert_eq!(json["row_count"], serde_json::json!(1));

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_request_gets_400() {
    let server = TestServer::start(true).await;

    let response = server.send(b"NOT HTTP AT ALL\r\n\r\n").await;

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_body_gets_413() {
    let server = TestServer::start(true).await;
    let raw = format!(
        "POST /query HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
        MAX_REQUEST_SIZE + 1
    );

    let response = server.send(raw.as_bytes()).await;

    assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));

    server.stop().await;
}

#[tokio::test]
async fn test_large_body_arriving_in_pieces_is_read_in_full() {
    let server = TestServer::start(false).await;
    let padding = "x".repeat(300_000);
    let body = format!("query=SELECT+name+FROM+users+/*+{padding}+*/");
    let head = format!(
        "POST /query HTTP/1.1\r\nHost: localhost\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\r\n",
        body.len()
    );

    let response = server
        .send_in_pieces(head.as_bytes(), body.as_bytes())
        .await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("<td>Alice</td>"));
    assert!(response.contains(&padding));

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_path_gets_404() {
    let server = TestServer::start(true).await;

    let response = server
        .send(b"GET /favicon.ico HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await;

    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

    server.stop().await;
}
