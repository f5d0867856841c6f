use std::collections::HashMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use mio::net::TcpStream as MioTcpStream;
use mio::{Interest, Poll, Token};

use server_proxy::config::{RouteConfig, ServerConfig};
use server_proxy::http::*;

/// Builds a connected, non-blocking `HttpConnection` registered with a fresh
/// `Poll`, backed by a real loopback socket pair (the reactor's own
/// bookkeeping, like `reregister`, expects a registered stream even though
/// these tests drive the parser directly by pushing bytes into the request
/// buffer rather than through `read_data`).
fn connected_conn(servers: Vec<ServerConfig>) -> (Poll, HttpConnection, Token) {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let _client = std::net::TcpStream::connect(addr).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    accepted.set_nonblocking(true).unwrap();

    let mut stream = MioTcpStream::from_std(accepted);
    let poll = Poll::new().unwrap();
    let token = Token(0);
    poll.registry()
        .register(&mut stream, token, Interest::READABLE)
        .unwrap();

    let config_list: Vec<Arc<ServerConfig>> = servers.into_iter().map(Arc::new).collect();
    let conn = HttpConnection::new(stream, config_list);
    (poll, conn, token)
}

fn feed(poll: &Poll, conn: &mut HttpConnection, token: Token, bytes: &[u8]) -> bool {
    conn.request.buffer.extend_from_slice(bytes);
    let mut next_token = 100usize;
    let mut cgi_to_client: HashMap<Token, Token> = HashMap::new();
    HttpRequest::proces_request(poll, token, &mut next_token, &mut cgi_to_client, conn).unwrap()
}

fn static_server(root: &std::path::Path) -> ServerConfig {
    let mut route = RouteConfig {
        root: root.display().to_string(),
        ..Default::default()
    };
    route.path = "/".to_string();
    ServerConfig {
        server_name: "a".to_string(),
        default_server: true,
        root: root.display().to_string(),
        routes: vec![route],
        ..Default::default()
    }
}

#[test]
fn test_simple_get_request() {
    let dir = std::env::temp_dir().join("http_tests_simple_get");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), b"hello world").unwrap();

    let (poll, mut conn, token) = connected_conn(vec![static_server(&dir)]);
    let raw = b"GET /index.html HTTP/1.1\r\nHost: a\r\n\r\n";
    let closed = feed(&poll, &mut conn, token, raw);

    assert!(!closed);
    let response = String::from_utf8_lossy(&conn.write_buffer);
    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
    assert!(matches!(conn.action, ActiveAction::FileDownload(_, _)));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_fragmented_headers_resume_across_feeds() {
    let dir = std::env::temp_dir().join("http_tests_fragmented");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), b"hi").unwrap();

    let (poll, mut conn, token) = connected_conn(vec![static_server(&dir)]);

    feed(&poll, &mut conn, token, b"GET /index.html ");
    assert_eq!(conn.request.state, ParsingState::RequestLine);

    feed(&poll, &mut conn, token, b"HTTP/1.1\r\n");
    assert_eq!(conn.request.state, ParsingState::Headers);

    let closed = feed(&poll, &mut conn, token, b"Host: a\r\n\r\n");
    assert!(!closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 200"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_host_on_http11_is_bad_request() {
    let dir = std::env::temp_dir().join("http_tests_missing_host");
    std::fs::create_dir_all(&dir).unwrap();

    let (poll, mut conn, token) = connected_conn(vec![static_server(&dir)]);
    let closed = feed(&poll, &mut conn, token, b"GET / HTTP/1.1\r\n\r\n");

    assert!(closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 400"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unsupported_version_is_505() {
    let dir = std::env::temp_dir().join("http_tests_bad_version");
    std::fs::create_dir_all(&dir).unwrap();

    let (poll, mut conn, token) = connected_conn(vec![static_server(&dir)]);
    let closed = feed(&poll, &mut conn, token, b"GET / HTTP/2.0\r\nHost: a\r\n\r\n");

    assert!(closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 505"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_invalid_method_is_405() {
    let dir = std::env::temp_dir().join("http_tests_bad_method");
    std::fs::create_dir_all(&dir).unwrap();

    let (poll, mut conn, token) = connected_conn(vec![static_server(&dir)]);
    let closed = feed(&poll, &mut conn, token, b"PATCH /invalid HTTP/1.1\r\nHost: a\r\n\r\n");

    assert!(closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 405"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_smuggling_attempt_content_length_and_chunked_is_400() {
    let dir = std::env::temp_dir().join("http_tests_smuggling");
    std::fs::create_dir_all(&dir).unwrap();

    let (poll, mut conn, token) = connected_conn(vec![static_server(&dir)]);
    let raw = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\nabc";
    let closed = feed(&poll, &mut conn, token, raw);

    assert!(closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 400"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_malformed_content_length_is_400() {
    let dir = std::env::temp_dir().join("http_tests_bad_cl");
    std::fs::create_dir_all(&dir).unwrap();

    let (poll, mut conn, token) = connected_conn(vec![static_server(&dir)]);
    let raw = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 4x2\r\n\r\nabcd";
    let closed = feed(&poll, &mut conn, token, raw);

    assert!(closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 400"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_post_with_body_into_upload_location() {
    let dir = std::env::temp_dir().join("http_tests_upload_body");
    let upload_dir = dir.join("incoming");
    std::fs::create_dir_all(&upload_dir).unwrap();

    let mut route = RouteConfig {
        root: dir.display().to_string(),
        upload_dir: "incoming".to_string(),
        ..Default::default()
    };
    route.path = "/upload".to_string();
    let server = ServerConfig {
        server_name: "a".to_string(),
        default_server: true,
        root: dir.display().to_string(),
        routes: vec![route],
        ..Default::default()
    };

    let (poll, mut conn, token) = connected_conn(vec![server]);
    let raw = b"POST /upload HTTP/1.1\r\nHost: a\r\nContent-Length: 11\r\n\r\nhello=world";
    let closed = feed(&poll, &mut conn, token, raw);

    assert!(!closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 201"));

    let saved: Vec<_> = std::fs::read_dir(&upload_dir).unwrap().collect();
    assert_eq!(saved.len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_chunked_body_final_terminator_in_separate_feed() {
    let dir = std::env::temp_dir().join("http_tests_chunked_upload");
    let upload_dir = dir.join("incoming");
    std::fs::create_dir_all(&upload_dir).unwrap();

    let mut route = RouteConfig {
        root: dir.display().to_string(),
        upload_dir: "incoming".to_string(),
        ..Default::default()
    };
    route.path = "/upload".to_string();
    let server = ServerConfig {
        server_name: "a".to_string(),
        default_server: true,
        root: dir.display().to_string(),
        routes: vec![route],
        ..Default::default()
    };

    let (poll, mut conn, token) = connected_conn(vec![server]);

    feed(
        &poll,
        &mut conn,
        token,
        b"POST /upload HTTP/1.1\r\nHost: a\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nHello\r\n",
    );
    assert!(conn.write_buffer.is_empty(), "response must not be sent before the body completes");

    let closed = feed(&poll, &mut conn, token, b"0\r\n\r\n");
    assert!(!closed);
    assert!(String::from_utf8_lossy(&conn.write_buffer).starts_with("HTTP/1.1 201"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_response_generation() {
    let mut res = HttpResponse::new(200, "OK");
    res.set_header("Content-Type", "text/plain");
    res.set_body(b"Hello Rust".to_vec(), "text/plain");

    let bytes = res.to_bytes();
    let s = String::from_utf8_lossy(&bytes);

    assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(s.contains("Content-Type: text/plain\r\n"));
    assert!(s.contains("Content-Length: 10\r\n"));
    assert!(s.ends_with("\r\n\r\nHello Rust"));
}

#[test]
fn test_canonical_header_casing_is_idempotent() {
    let mut res = HttpResponse::new(200, "OK");
    res.set_header("content-TYPE", "text/plain");
    let bytes = res.to_bytes();
    let s = String::from_utf8_lossy(&bytes);
    assert!(s.contains("Content-Type: text/plain\r\n"));
}
