/// Integration tests for the forensics service HTTP API
mod support;

use axum_test::TestServer;
use common::analysis::{AnalysisConfig, AnalysisPreset, SessionStatus};
use common::history::HistoryListResponse;
use common::queue::{QueueItem, QueueListResponse};
use forensics_service::api;
use serde_json::json;
use std::time::Duration;
use support::{service, text_request, video_request, ScriptedOpener, TestService, TimestampClassifier, VideoScript};

fn setup_test_service() -> (TestServer, TestService) {
    let svc = service(
        TimestampClassifier::new(&[(0, 90.0), (5, 70.0)]),
        ScriptedOpener::default().with_video(
            "/media/clip.mp4",
            VideoScript {
                duration: 10.0,
                ..VideoScript::default()
            },
        ),
    );
    let server = TestServer::new(api::router(svc.state.clone())).unwrap();
    (server, svc)
}

async fn wait_for_status(server: &TestServer, id: &str, status: SessionStatus) -> QueueItem {
    for _ in 0..200 {
        let item: QueueItem = server.get(&format!("/v1/items/{id}")).await.json();
        if item.state.status == status {
            return item;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("item {id} never reached {status:?}");
}

#[tokio::test]
async fn test_health_and_readiness() {
    let (server, _svc) = setup_test_service();

    let response = server.get("/healthz").await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["service"], "forensics-service");
    assert_eq!(body["node_id"], "test-node");

    let response = server.get("/readyz").await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["classifier"], "timestamp");

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_enqueue_list_get_and_remove() {
    let (server, _svc) = setup_test_service();

    let response = server
        .post("/v1/items")
        .json(&video_request("clip", "/media/clip.mp4"))
        .await;
    assert_eq!(response.status_code(), 201);
    let item: QueueItem = response.json();
    assert_eq!(item.id, "clip");
    assert_eq!(item.state.status, SessionStatus::Queued);

    let response = server
        .post("/v1/items")
        .json(&text_request("essay", "Some words."))
        .await;
    assert_eq!(response.status_code(), 201);

    let list: QueueListResponse = server.get("/v1/items").await.json();
    let ids: Vec<_> = list.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["clip", "essay"]);

    let response = server.get("/v1/items/clip").await;
    assert_eq!(response.status_code(), 200);

    let response = server.delete("/v1/items/clip").await;
    assert_eq!(response.status_code(), 200);

    let response = server.get("/v1/items/clip").await;
    assert_eq!(response.status_code(), 404);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("clip"));

    let response = server.delete("/v1/items").await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["removed"], 1);
}

#[tokio::test]
async fn test_enqueue_rejects_invalid_and_duplicate_items() {
    let (server, _svc) = setup_test_service();

    let response = server
        .post("/v1/items")
        .json(&json!({
            "file_name": "clip.mp4",
            "media_kind": "video",
            "mime_type": "video/mp4",
            "source": {"type": "text", "text": "not a file"}
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = server
        .post("/v1/items")
        .json(&json!({
            "file_name": "photo.png",
            "media_kind": "image",
            "mime_type": "video/mp4",
            "source": {"type": "inline", "data": "iVBORw0KGgo="}
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    server
        .post("/v1/items")
        .json(&text_request("essay", "Some words."))
        .await;
    let response = server
        .post("/v1/items")
        .json(&text_request("essay", "Other words."))
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_run_item_in_background() {
    let (server, _svc) = setup_test_service();

    server
        .post("/v1/items")
        .json(&video_request("clip", "/media/clip.mp4"))
        .await;

    let response = server.post("/v1/items/clip/run").await;
    assert_eq!(response.status_code(), 202);

    let item = wait_for_status(&server, "clip", SessionStatus::Done).await;
    assert_eq!(item.state.segments_processed, 2);
    assert_eq!(item.state.total_segments, 2);
    let result = item.result.unwrap();
    assert_eq!(result.probability_ai, 80);
    assert_eq!(result.label.as_str(), "Likely AI");

    // Done items are not eligible again
    let response = server.post("/v1/items/clip/run").await;
    assert_eq!(response.status_code(), 409);

    let response = server.post("/v1/items/missing/run").await;
    assert_eq!(response.status_code(), 404);

    let history: HistoryListResponse = server.get("/v1/history").await.json();
    assert_eq!(history.entries.len(), 1);
    assert_eq!(history.entries[0].result.probability_ai, 80);

    let response = server.delete("/v1/history").await;
    assert_eq!(response.status_code(), 204);
    let history: HistoryListResponse = server.get("/v1/history").await.json();
    assert!(history.entries.is_empty());
}

#[tokio::test]
async fn test_run_conflicts_while_item_is_running() {
    let mut classifier = TimestampClassifier::new(&[(0, 90.0)]);
    classifier.hang_at = vec![0];
    let svc = service(
        classifier,
        ScriptedOpener::default().with_video(
            "/media/clip.mp4",
            VideoScript {
                duration: 10.0,
                ..VideoScript::default()
            },
        ),
    );
    let server = TestServer::new(api::router(svc.state.clone())).unwrap();

    server
        .post("/v1/items")
        .json(&video_request("clip", "/media/clip.mp4"))
        .await;

    let response = server.post("/v1/items/clip/run").await;
    assert_eq!(response.status_code(), 202);

    // Admission is immediate, before the session publishes anything
    let response = server.post("/v1/items/clip/run").await;
    assert_eq!(response.status_code(), 409);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("running"));

    let response = server.post("/v1/batch").await;
    assert_eq!(response.status_code(), 202);
    let body: serde_json::Value = response.json();
    assert!(body["started"].as_array().unwrap().is_empty());

    svc.state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batch_endpoint_starts_eligible_items() {
    let (server, _svc) = setup_test_service();

    server
        .post("/v1/items")
        .json(&video_request("clip", "/media/clip.mp4"))
        .await;
    server
        .post("/v1/items")
        .json(&video_request("missing", "/media/missing.mp4"))
        .await;
    server
        .post("/v1/items")
        .json(&text_request("essay", "Some words."))
        .await;

    let response = server.post("/v1/batch").await;
    assert_eq!(response.status_code(), 202);
    let body: serde_json::Value = response.json();
    assert_eq!(body["started"].as_array().unwrap().len(), 3);

    wait_for_status(&server, "clip", SessionStatus::Done).await;
    wait_for_status(&server, "essay", SessionStatus::Done).await;
    let missing = wait_for_status(&server, "missing", SessionStatus::Error).await;
    assert!(missing.state.last_error.is_some());
}

#[tokio::test]
async fn test_settings_roundtrip_and_validation() {
    let (server, _svc) = setup_test_service();

    let settings: AnalysisConfig = server.get("/v1/settings").await.json();
    assert_eq!(settings, AnalysisConfig::default());

    let updated = AnalysisConfig {
        preset: AnalysisPreset::Forensic,
        focus_areas: vec!["faces".to_string(), "lighting".to_string()],
        frame_interval_secs: 2,
        ..AnalysisConfig::default()
    };
    let response = server.put("/v1/settings").json(&updated).await;
    assert_eq!(response.status_code(), 200);

    let settings: AnalysisConfig = server.get("/v1/settings").await.json();
    assert_eq!(settings, updated);

    let response = server
        .put("/v1/settings")
        .json(&AnalysisConfig {
            frame_interval_secs: 0,
            ..AnalysisConfig::default()
        })
        .await;
    assert_eq!(response.status_code(), 400);
}
