//! Catalog client: status classification, body decoding, and HTTP behaviour
//! against a local stub server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pkmn_collection::config::parse_timeout_secs;
use pkmn_collection::models::{RemoteCard, RemoteCardBrief};
use pkmn_collection::source::{classify_status, decode_body};
use pkmn_collection::{CancellationToken, CardSource, ErrorKind, TcgdexClient};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ---------------------------------------------------------------------------
// Local HTTP stub
// ---------------------------------------------------------------------------

type Requests = Arc<Mutex<Vec<String>>>;

/// Answer every connection with the same canned response. Returns the base
/// URL and the request lines seen so far.
async fn stub(status: &'static str, body: &'static str) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: Requests = Arc::default();
    let seen = requests.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let head = read_head(&mut socket).await;
            seen.lock().unwrap().push(head.lines().next().unwrap_or_default().to_string());
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{addr}"), requests)
}

/// Accept connections and never answer them.
async fn silent_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client(base: &str) -> TcgdexClient {
    TcgdexClient::new(base, "en", Duration::from_secs(5)).unwrap()
}

#[test]
fn success_statuses_pass() {
    assert!(classify_status(StatusCode::OK).is_ok());
    assert!(classify_status(StatusCode::NO_CONTENT).is_ok());
}

#[test]
fn throttling_and_server_errors_are_transient() {
    for status in [
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::BAD_GATEWAY,
        StatusCode::SERVICE_UNAVAILABLE,
    ] {
        let err = classify_status(status).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient, "{status}");
    }
}

#[test]
fn other_client_errors_are_invalid_upstream_data() {
    for status in [StatusCode::BAD_REQUEST, StatusCode::FORBIDDEN, StatusCode::GONE] {
        let err = classify_status(status).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUpstreamData, "{status}");
    }
}

#[test]
fn decode_body_reads_card_and_brief_lists() {
    let card: RemoteCard =
        decode_body(r#"{"id":"swsh3-136","localId":"136","name":"Furret","hp":110}"#).unwrap();
    assert_eq!(card.id, "swsh3-136");
    assert_eq!(card.hp, Some(110));

    let briefs: Vec<RemoteCardBrief> = decode_body(
        r#"[{"id":"swsh3-136","localId":"136","name":"Furret"},{"id":"swsh9-120","name":"Furret"}]"#,
    )
    .unwrap();
    assert_eq!(briefs.len(), 2);
    assert_eq!(briefs[1].local_id, None);
}

#[test]
fn malformed_body_is_invalid_upstream_data() {
    let err = decode_body::<RemoteCard>("<html>maintenance</html>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUpstreamData);

    let err = decode_body::<Vec<RemoteCardBrief>>(r#"{"id":"x"}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUpstreamData);
}

#[test]
fn client_targets_language_root() {
    let client = TcgdexClient::new("https://api.tcgdex.net/v2/", "ja", Duration::from_secs(90)).unwrap();
    assert_eq!(client.base_url(), "https://api.tcgdex.net/v2/ja");
}

#[test]
fn timeout_must_be_positive_whole_seconds() {
    assert_eq!(parse_timeout_secs("12"), Some(Duration::from_secs(12)));
    assert_eq!(parse_timeout_secs(" 5 "), Some(Duration::from_secs(5)));
    assert_eq!(parse_timeout_secs("0"), None);
    assert_eq!(parse_timeout_secs("-3"), None);
    assert_eq!(parse_timeout_secs("1.5"), None);
}

// ---------------------------------------------------------------------------
// TcgdexClient over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_decodes_card_from_language_root() {
    let (base, requests) = stub("200 OK", r#"{"id":"swsh3-136","localId":"136","name":"Furret","category":"Pokemon"}"#).await;
    let card = client(&base)
        .fetch_by_id(" swsh3-136 ", &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.name, "Furret");
    assert_eq!(requests.lock().unwrap()[0], "GET /en/cards/swsh3-136 HTTP/1.1");
}

#[tokio::test]
async fn missing_card_is_none_and_missing_search_is_empty() {
    let (base, _) = stub("404 Not Found", r#"{"error":"not found"}"#).await;
    let client = client(&base);
    let cancel = CancellationToken::new();

    assert!(client.fetch_by_id("nope-1", &cancel).await.unwrap().is_none());
    assert!(client.search_by_name("Nothing", &cancel).await.unwrap().is_empty());
    assert!(client
        .search_by_number("999", Some("swsh3"), &cancel)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn search_by_number_sends_set_filter() {
    let (base, requests) = stub("200 OK", r#"[{"id":"swsh3-136","localId":"136","name":"Furret"}]"#).await;
    let client = client(&base);
    let cancel = CancellationToken::new();

    let briefs = client.search_by_number("136", Some("swsh3"), &cancel).await.unwrap();
    assert_eq!(briefs.len(), 1);
    client.search_by_number("136", Some("  "), &cancel).await.unwrap();

    let seen = requests.lock().unwrap();
    assert!(seen[0].contains("localId=136"), "{}", seen[0]);
    assert!(seen[0].contains("set.id=swsh3"), "{}", seen[0]);
    assert!(!seen[1].contains("set.id"), "{}", seen[1]);
}

#[tokio::test]
async fn server_error_is_transient() {
    let (base, _) = stub("503 Service Unavailable", "{}").await;
    let err = client(&base)
        .fetch_by_id("swsh3-136", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn garbled_body_is_invalid_upstream_data() {
    let (base, _) = stub("200 OK", "<html>maintenance</html>").await;
    let err = client(&base)
        .search_by_name("Furret", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUpstreamData);
}

#[tokio::test]
async fn refused_connection_is_transient() {
    let err = client("http://127.0.0.1:9")
        .fetch_by_id("swsh3-136", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn cancelling_mid_request_returns_cancelled() {
    let base = silent_stub().await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client(&base)
        .fetch_by_id("swsh3-136", &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn blank_id_is_rejected_before_any_request() {
    let (base, requests) = stub("200 OK", "{}").await;
    let err = client(&base)
        .fetch_by_id("  ", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    assert!(requests.lock().unwrap().is_empty());
}
