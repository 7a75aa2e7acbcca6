// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /ingest?action=status / ?action=test
// - POST /ingest (happy path, missing credentials, malformed dates)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use aa_wire_ingest::api::{router, AppState};
use aa_wire_ingest::config::IngestDefaults;
use aa_wire_ingest::ingest::store::MemoryStore;
use aa_wire_ingest::ingest::types::{SearchQuery, WireApi, WireItem};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

struct MockWire {
    responses: HashMap<i64, Vec<serde_json::Value>>,
    fail: bool,
}

#[async_trait]
impl WireApi for MockWire {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<WireItem>> {
        if self.fail {
            return Err(anyhow!("kimlik doğrulama reddedildi"));
        }
        Ok(self.responses.get(&query.category).cloned().unwrap_or_default())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

fn test_state(wire: Option<Arc<dyn WireApi>>) -> AppState {
    AppState {
        wire,
        store: Arc::new(MemoryStore::new()),
        defaults: IngestDefaults::default(),
        request_delay: Duration::ZERO,
    }
}

fn app_with_items(items: Vec<(i64, Vec<serde_json::Value>)>) -> Router {
    let wire = MockWire {
        responses: items.into_iter().collect(),
        fail: false,
    };
    router(test_state(Some(Arc::new(wire))))
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = app_with_items(vec![]);

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn api_status_reports_service_metadata() {
    let app = app_with_items(vec![]);

    let req = Request::builder()
        .method("GET")
        .uri("/ingest?action=status")
        .body(Body::empty())
        .expect("build GET /ingest?action=status");

    let resp = app.oneshot(req).await.expect("oneshot status");
    assert!(resp.status().is_success());

    let v = read_json(resp).await;
    assert_eq!(v["success"], json!(true));
    assert_eq!(v["service"], json!("aa-wire-ingest"));
    assert_eq!(v["wireConfigured"], json!(true));
    assert!(v["features"].is_array());
    assert!(v["defaults"]["categories"].is_array());
}

#[tokio::test]
async fn api_test_action_probes_the_wire() {
    let app = app_with_items(vec![(1, vec![json!({"id": "probe"})])]);

    let req = Request::builder()
        .method("GET")
        .uri("/ingest?action=test")
        .body(Body::empty())
        .expect("build GET /ingest?action=test");

    let resp = app.oneshot(req).await.expect("oneshot test");
    let v = read_json(resp).await;
    assert_eq!(v["success"], json!(true));
    assert_eq!(v["items"], json!(1));
}

#[tokio::test]
async fn api_test_action_reports_unreachable_wire() {
    let wire = MockWire {
        responses: HashMap::new(),
        fail: true,
    };
    let app = router(test_state(Some(Arc::new(wire))));

    let req = Request::builder()
        .method("GET")
        .uri("/ingest?action=test")
        .body(Body::empty())
        .expect("build GET /ingest?action=test");

    let v = read_json(app.oneshot(req).await.expect("oneshot test")).await;
    assert_eq!(v["success"], json!(false));
    assert!(v["message"].as_str().unwrap().contains("unreachable"));
}

#[tokio::test]
async fn api_ingest_runs_the_pipeline_and_returns_the_contract_fields() {
    let app = app_with_items(vec![
        (
            1,
            vec![json!({"id": "X1", "type": "text", "date": "2025-01-10T08:00:00Z",
                         "title": "Başlık", "priority": 2})],
        ),
        (
            2,
            vec![json!({"id": "X1", "type": "text", "date": "2025-01-10T09:00:00Z",
                         "title": "Başlık", "priority": 2})],
        ),
    ]);

    let payload = json!({
        "categories": [1, 2],
        "priorities": [1, 2, 3, 4],
        "types": [1, 2, 3],
        "saveToStore": true,
        "saveMode": "overwrite"
    });
    let req = Request::builder()
        .method("POST")
        .uri("/ingest")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /ingest");

    let resp = app.oneshot(req).await.expect("oneshot /ingest");
    assert!(resp.status().is_success());

    let v = read_json(resp).await;
    assert_eq!(v["success"], json!(true));
    assert_eq!(v["stats"]["totalUnique"], json!(1));
    assert_eq!(v["duplicateInfo"]["crossCategory"], json!(1));
    assert_eq!(v["news"].as_array().unwrap().len(), 1);
    assert_eq!(v["news"][0]["naturalKey"], json!("genel:1:20250110:X1"));
    assert_eq!(v["saveResults"]["created"], json!(1));
    assert!(v.get("timestamp").is_some());
    assert!(v["errors"].as_array().unwrap().is_empty());

    // per-category breakdown: desk 2 reports the cross-category duplicate
    let cats = v["categories"].as_array().unwrap();
    assert_eq!(cats.len(), 2);
    assert_eq!(cats[1]["duplicatesSkipped"], json!(1));
}

#[tokio::test]
async fn api_ingest_without_credentials_fails_fast() {
    let app = router(test_state(None));

    let req = Request::builder()
        .method("POST")
        .uri("/ingest")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .expect("build POST /ingest");

    let v = read_json(app.oneshot(req).await.expect("oneshot /ingest")).await;
    assert_eq!(v["success"], json!(false));
    assert!(v["message"].as_str().unwrap().contains("credentials"));
}

#[tokio::test]
async fn api_ingest_rejects_malformed_dates() {
    let app = app_with_items(vec![]);

    let payload = json!({"startDate": "on ocak"});
    let req = Request::builder()
        .method("POST")
        .uri("/ingest")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /ingest");

    let v = read_json(app.oneshot(req).await.expect("oneshot /ingest")).await;
    assert_eq!(v["success"], json!(false));
    assert!(v["message"].as_str().unwrap().contains("startDate"));
}
