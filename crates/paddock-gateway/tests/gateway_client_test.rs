#![allow(clippy::unwrap_used)]
// Integration tests for `GatewayClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use paddock_gateway::{Error, GatewayClient, PtzAction, PtzRequest, StreamTier};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let client = GatewayClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

fn tiny_png() -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&1280u32.to_be_bytes());
    data.extend_from_slice(&720u32.to_be_bytes());
    data.extend_from_slice(&[8, 2, 0, 0, 0]);
    data
}

// ── Status probe ────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_running() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "running", "streams": 2 })),
        )
        .mount(&server)
        .await;

    let status = client.status().await.unwrap();
    assert!(status.is_running());
    assert_eq!(status.extra["streams"], 2);
}

#[tokio::test]
async fn test_status_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nginx</html>"))
        .mount(&server)
        .await;

    let result = client.status().await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("nginx")),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Stream control ──────────────────────────────────────────────────

#[tokio::test]
async fn test_start_stream_sends_quality() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/stream/start"))
        .and(body_json(json!({ "quality": "main" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    client.start_stream(StreamTier::Main).await.unwrap();
}

#[tokio::test]
async fn test_stop_stream_error_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/stream/stop"))
        .respond_with(ResponseTemplate::new(409).set_body_string("stream not running"))
        .mount(&server)
        .await;

    let result = client.stop_stream(StreamTier::Sub).await;
    match result {
        Err(Error::Gateway { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message, "stream not running");
        }
        other => panic!("expected Gateway error, got: {other:?}"),
    }
}

// ── PTZ ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ptz_posts_camel_case_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/ptz"))
        .and(body_json(json!({ "command": "goto_preset", "presetId": "arena" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .ptz(&PtzRequest {
            command: PtzAction::GotoPreset,
            value: None,
            preset_id: Some("arena".into()),
        })
        .await
        .unwrap();
}

// ── Snapshot ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_snapshot_reads_dimensions() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/snapshot"))
        .and(query_param("quality", "sub"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(tiny_png()),
        )
        .mount(&server)
        .await;

    let snap = client.snapshot(StreamTier::Sub).await.unwrap();
    assert_eq!(snap.content_type.as_deref(), Some("image/png"));
    assert_eq!(snap.width, Some(1280));
    assert_eq!(snap.height, Some(720));
    assert!(!snap.is_empty());
}

#[tokio::test]
async fn test_snapshot_empty_error_body_uses_reason() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/snapshot"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.snapshot(StreamTier::Main).await.unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("Service Unavailable"), "got {err}");
}

// ── Unreachable gateway ─────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    // Port 9 (discard) on localhost is reliably closed in CI containers.
    let client =
        GatewayClient::from_reqwest("http://127.0.0.1:9/", reqwest::Client::new()).unwrap();

    let err = client.status().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    assert!(err.is_unreachable());
}
