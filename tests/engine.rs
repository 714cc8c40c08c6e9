use std::time::Duration;

use fusillade::{BenchmarkBuilder, StopReason, summarize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{body_string, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_answering(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_string("hello"))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn count_mode_sends_every_request() {
    let server = server_answering(200).await;

    let outcome = BenchmarkBuilder::new()
        .url(format!("{}/ok", server.uri()))
        .clients(3)
        .requests(4)
        .run()
        .await
        .unwrap();

    let summary = summarize(&outcome);
    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(summary.requests, 12);
    assert_eq!(summary.success, 12);
    assert_eq!(summary.network_failed, 0);
    assert_eq!(summary.bad_status_failed, 0);
    assert_eq!(summary.samples, 12);
    assert!(outcome.bytes_written > 0);
    assert!(outcome.bytes_read >= 12 * "hello".len() as u64);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 12);
}

#[tokio::test]
async fn non_200_is_a_bad_status() {
    let server = server_answering(503).await;

    let outcome = BenchmarkBuilder::new()
        .url(server.uri())
        .clients(2)
        .requests(2)
        .run()
        .await
        .unwrap();

    let summary = summarize(&outcome);
    assert_eq!(summary.requests, 4);
    assert_eq!(summary.bad_status_failed, 4);
    assert_eq!(summary.success, 0);
}

#[tokio::test]
async fn redirects_are_not_followed() {
    let server = MockServer::start().await;
    Mock::given(path("/moved"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
        .mount(&server)
        .await;

    let outcome = BenchmarkBuilder::new()
        .url(format!("{}/moved", server.uri()))
        .clients(1)
        .requests(1)
        .run()
        .await
        .unwrap();

    assert_eq!(summarize(&outcome).bad_status_failed, 1);
}

#[tokio::test]
async fn refused_connections_are_network_failures() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = BenchmarkBuilder::new()
        .url(format!("http://{}/", addr))
        .clients(2)
        .requests(3)
        .run()
        .await
        .unwrap();

    let summary = summarize(&outcome);
    assert_eq!(summary.requests, 6);
    assert_eq!(summary.network_failed, 6);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.samples, 0);
    assert_eq!(summary.mean_latency_ms, 0.0);
}

#[tokio::test]
async fn posts_body_with_configured_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(header("content-type", "application/json"))
        .and(header("authorization", "Bearer secret"))
        .and(header("accept-encoding", "identity"))
        .and(header("user-agent", "fusillade-test"))
        .and(body_string("{\"n\":1}"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let outcome = BenchmarkBuilder::new()
        .url(format!("{}/submit", server.uri()))
        .body("{\"n\":1}")
        .content_type("application/json")
        .auth_header("Bearer secret")
        .accept_encoding("identity")
        .user_agent("fusillade-test")
        .clients(1)
        .requests(2)
        .run()
        .await
        .unwrap();

    assert_eq!(summarize(&outcome).success, 2);
}

#[tokio::test]
async fn substitutes_uuid_and_client_id() {
    let server = MockServer::start().await;
    Mock::given(path_regex(
        r"^/users/0/[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    ))
    .respond_with(ResponseTemplate::new(200))
    .mount(&server)
    .await;

    let outcome = BenchmarkBuilder::new()
        .url(format!("{}/users/<CID>/<UUID>", server.uri()))
        .uri_substitution(true)
        .clients(1)
        .requests(3)
        .run()
        .await
        .unwrap();

    assert_eq!(summarize(&outcome).success, 3);

    let received = server.received_requests().await.unwrap();
    let paths: Vec<String> = received.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(paths.len(), 3);
    assert_ne!(paths[0], paths[1]);
    assert_ne!(paths[1], paths[2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duration_mode_ends_on_deadline() {
    let server = server_answering(200).await;

    let outcome = BenchmarkBuilder::new()
        .url(server.uri())
        .clients(2)
        .duration(Duration::from_millis(300))
        .keepalive(false)
        .run()
        .await
        .unwrap();

    let summary = summarize(&outcome);
    assert_eq!(outcome.stop_reason, StopReason::DeadlineElapsed);
    assert_eq!(summary.elapsed_secs, 1);
    assert!(summary.requests > 0);
    assert_eq!(summary.requests, summary.success);
}

/// Accepts one connection, reads a request head, optionally answers with
/// `reply`, then hangs up. Resolves to the number of bytes it received.
async fn raw_server(reply: Option<&'static [u8]>) -> (String, JoinHandle<u64>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        while !received.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        if let Some(reply) = reply {
            socket.write_all(reply).await.unwrap();
        }
        received.len() as u64
    });

    (format!("http://{}/hello?x=1", addr), handle)
}

#[tokio::test]
async fn unanswered_request_still_counts_written_bytes() {
    let (url, server) = raw_server(None).await;

    let outcome = BenchmarkBuilder::new()
        .url(url)
        .clients(1)
        .requests(1)
        .run()
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(summarize(&outcome).network_failed, 1);
    assert!(received > 0);
    assert_eq!(outcome.bytes_written, received);
    assert_eq!(outcome.bytes_read, 0);
}

#[tokio::test]
async fn written_bytes_include_every_header_sent() {
    let (url, server) = raw_server(None).await;

    let outcome = BenchmarkBuilder::new()
        .url(url)
        .user_agent("a-rather-long-user-agent-string-for-metering")
        .auth_header("Bearer secret")
        .clients(1)
        .requests(1)
        .run()
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(outcome.bytes_written, received);
    assert!(received > "a-rather-long-user-agent-string-for-metering".len() as u64 + "Bearer secret".len() as u64);
}

#[tokio::test]
async fn metered_bytes_match_the_wire_exactly() {
    const REPLY: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\nx-extra: 1\r\n\r\nhello";
    let (url, server) = raw_server(Some(REPLY)).await;

    let outcome = BenchmarkBuilder::new()
        .url(url)
        .clients(1)
        .requests(1)
        .run()
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(summarize(&outcome).success, 1);
    assert_eq!(outcome.bytes_written, received);
    assert_eq!(outcome.bytes_read, REPLY.len() as u64);
}
