// tests/stream_client.rs
// Dual-strategy stream client against a scripted local HTTP listener

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use talkwire::client::{ChatStreamClient, StreamOutcome};

const SSE_HEAD: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
const JSON_HEAD: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n";

/// Serve every connection with the same canned response. When `stall` is
/// set the socket is held open afterwards instead of closing.
async fn scripted_server(head: &'static str, body: &'static str, stall: Option<Duration>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut head_buf = [0u8; 4096];
                let _ = socket.read(&mut head_buf).await;
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body.as_bytes()).await;
                let _ = socket.flush().await;
                if let Some(stall) = stall {
                    tokio::time::sleep(stall).await;
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn test_primary_strategy_streams_to_completion() {
    let body = concat!(
        "data: {\"type\":\"connected\",\"chatId\":\"c1\"}\n\n",
        "data: {\"type\":\"chunk\",\"content\":\"Hel\"}\n\n",
        "data: {\"type\":\"chunk\",\"content\":\"lo\"}\n\n",
        "data: {\"type\":\"done\",\"fullContent\":\"Hello\"}\n\n",
        ":\n\n",
    );
    let addr = scripted_server(SSE_HEAD, body, None).await;
    let client = ChatStreamClient::new(format!("http://{addr}"), "token");

    let mut chunks: Vec<String> = Vec::new();
    let outcome = client
        .stream_message("c1", "hi", |c| chunks.push(c.to_string()))
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Complete("Hello".into()));
    assert_eq!(chunks, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_timeout_rejects_even_after_content() {
    // One chunk arrives, then the connection goes silent past the deadline.
    // The resolution must be an error, not a partial success, no matter
    // which strategy is driving.
    let body = "data: {\"type\":\"chunk\",\"content\":\"par\"}\n\n";
    let addr = scripted_server(SSE_HEAD, body, Some(Duration::from_secs(5))).await;
    let client = ChatStreamClient::new(format!("http://{addr}"), "token")
        .with_timeout(Duration::from_millis(200));

    let mut chunks: Vec<String> = Vec::new();
    let err = client
        .stream_message("c1", "hi", |c| chunks.push(c.to_string()))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("timed out"), "got: {err}");
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c == "par"));
}

#[tokio::test]
async fn test_fallback_engages_when_eventsource_refuses_response() {
    // The wrong content type makes the eventsource transport bail before
    // any frame; the raw fallback reads the same body anyway. The final
    // frame has no trailing separator, so it only arrives through the
    // leftover-buffer flush at end of stream.
    let body = concat!(
        "data: {\"type\":\"connected\",\"chatId\":\"c1\"}\n\n",
        "data: {\"type\":\"chunk\",\"content\":\"ab\"}\n\n",
        "data: {\"type\":\"chunk\",\"content\":\"cd\"}\n\n",
        "data: {\"type\":\"done\",\"fullContent\":\"abcd\"}",
    );
    let addr = scripted_server(JSON_HEAD, body, None).await;
    let client = ChatStreamClient::new(format!("http://{addr}"), "token");

    let mut chunks: Vec<String> = Vec::new();
    let outcome = client
        .stream_message("c1", "hi", |c| chunks.push(c.to_string()))
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Complete("abcd".into()));
    assert_eq!(chunks, vec!["ab", "cd"]);
}
