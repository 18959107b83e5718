//! Integration tests for the sweep service

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use sweepline_domain::FixedClock;
use sweepline_janitor::{Janitor, JanitorConfig, StoreInstance, Sweeper};
use sweepline_server::handlers::{create_router, AppState};
use sweepline_store::MemoryStore;
use tower::ServiceExt; // for oneshot

/// Local noon in UTC+7
fn noon_local() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 5, 0, 0).unwrap()
}

fn besauntct() -> Value {
    json!({
        "BESAUNTCT": {
            "A": {"updateTime": "2025-01-01T07:00:00"},
            "B": {"updateTime": "2025-01-01T11:00:00"},
            "SetRuContent": {"updateTime": "2025-01-01T02:00:00"}
        }
    })
}

/// Helper to create test application state
fn create_test_state(config: JanitorConfig, stores: Vec<(&str, Arc<MemoryStore>)>) -> AppState<Arc<MemoryStore>> {
    let janitor = Janitor::new(config).unwrap();
    let instances = stores
        .into_iter()
        .map(|(label, store)| StoreInstance::new(label, store))
        .collect();
    let sweeper = Sweeper::new(janitor, instances, Arc::new(FixedClock(noon_local()))).unwrap();

    AppState::new(Arc::new(sweeper), "/cleanup")
}

fn single_store(tree: Value) -> (Arc<MemoryStore>, AppState<Arc<MemoryStore>>) {
    let store = Arc::new(MemoryStore::from_value(tree));
    let state = create_test_state(JanitorConfig::reference_deployment(), vec![("default", store.clone())]);
    (store, state)
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn root_report<'a>(body: &'a Value, root: &str) -> &'a Value {
    body["report"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["root"] == root)
        .unwrap()
}

#[tokio::test]
async fn test_expired_record_deleted_and_exempt_skipped() {
    let (store, state) = single_store(besauntct());

    let (status, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["via"], "GET");
    assert_eq!(body["path"], "/cleanup");
    assert_eq!(
        root_report(&body, "BESAUNTCT"),
        &json!({"root": "BESAUNTCT", "deleted": 1, "kept": 1, "skipped": 1})
    );

    assert_eq!(store.value_at("BESAUNTCT/A"), None);
    assert!(store.value_at("BESAUNTCT/B").is_some());
    assert!(store.value_at("BESAUNTCT/SetRuContent").is_some());
}

#[tokio::test]
async fn test_invalid_json_record_is_kept() {
    let (store, state) = single_store(json!({"SetDevicesNV": {"x": "{not valid json"}}));

    let (status, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(status, StatusCode::OK);
    let report = root_report(&body, "SetDevicesNV");
    assert_eq!(report["deleted"], 0);
    assert_eq!(report["kept"], 1);
    assert!(store.value_at("SetDevicesNV/x").is_some());
}

#[tokio::test]
async fn test_empty_roots_issue_no_delete() {
    let (store, state) = single_store(json!({}));

    let (status, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        root_report(&body, "SetDevicesNV2"),
        &json!({"root": "SetDevicesNV2", "deleted": 0, "kept": 0, "skipped": 0, "note": "empty"})
    );
    assert_eq!(body["total"], json!({"deleted": 0, "kept": 0, "skipped": 0}));
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn test_future_timestamp_is_kept() {
    let (store, state) = single_store(json!({
        "SetDevicesVNGDH": {"late": {"updateTime": "2025-01-02T12:00:00"}}
    }));

    let (_, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(root_report(&body, "SetDevicesVNGDH")["kept"], 1);
    assert!(store.value_at("SetDevicesVNGDH/late").is_some());
}

#[tokio::test]
async fn test_second_sweep_deletes_nothing_new() {
    let (store, state) = single_store(besauntct());

    let (_, first) = call(create_router(state.clone()), "GET", "/cleanup").await;
    let (status, second) = call(create_router(state), "POST", "/cleanup").await;

    assert_eq!(first["total"]["deleted"], 1);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["via"], "POST");
    assert_eq!(second["total"], json!({"deleted": 0, "kept": 1, "skipped": 1}));
    assert_eq!(store.update_count(), 1);
}

#[tokio::test]
async fn test_nested_root_swept_in_its_own_batch() {
    let (store, state) = single_store(json!({
        "BESAUNTCT": {"A": {"updateTime": "2025-01-01T07:00:00"}},
        "VNGDH1": {
            "dev": {"Devices": {"updateTime": "2025-01-01T07:00:00"}},
            "flat": {"updateTime": "2025-01-01T07:00:00"},
            "SetRuContents": {"Devices": {"updateTime": "2025-01-01T00:00:00"}}
        }
    }));

    let (_, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(
        root_report(&body, "VNGDH1"),
        &json!({"root": "VNGDH1", "deleted": 1, "kept": 1, "skipped": 1})
    );
    assert_eq!(store.update_count(), 2);
    assert!(store.value_at("VNGDH1/flat").is_some());
}

#[tokio::test]
async fn test_dry_run_reports_without_deleting() {
    let store = Arc::new(MemoryStore::from_value(besauntct()));
    let config = JanitorConfig {
        dry_run: true,
        ..JanitorConfig::reference_deployment()
    };
    let state = create_test_state(config, vec![("default", store.clone())]);

    let (status, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["total"]["deleted"], 1);
    assert!(store.value_at("BESAUNTCT/A").is_some());
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn test_multiple_instances_reported_separately() {
    let first = Arc::new(MemoryStore::from_value(besauntct()));
    let second = Arc::new(MemoryStore::new());
    let state = create_test_state(
        JanitorConfig::reference_deployment(),
        vec![("firebase1", first.clone()), ("firebase2", second)],
    );

    let (status, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("total").is_none());
    assert_eq!(body["instances"]["firebase1"]["instance"], "firebase1");
    assert_eq!(body["instances"]["firebase1"]["total"]["deleted"], 1);
    assert_eq!(body["instances"]["firebase2"]["total"]["deleted"], 0);
    assert_eq!(first.value_at("BESAUNTCT/A"), None);
}

#[tokio::test]
async fn test_store_failure_returns_error_payload() {
    let (store, state) = single_store(besauntct());
    store.set_available(false);

    let (status, body) = call(create_router(state), "GET", "/cleanup").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("default"));
}

#[tokio::test]
async fn test_trigger_requires_token_when_configured() {
    let (store, state) = single_store(besauntct());
    let app = create_router(state.with_auth_token(Some("s3cret".to_string())));

    let (status, body) = call(app.clone(), "GET", "/cleanup").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(store.update_count(), 0);

    let request = Request::builder()
        .uri("/cleanup")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cron_path_route() {
    let store = Arc::new(MemoryStore::from_value(besauntct()));
    let janitor = Janitor::new(JanitorConfig::reference_deployment()).unwrap();
    let sweeper = Sweeper::new(
        janitor,
        vec![StoreInstance::new("default", store)],
        Arc::new(FixedClock(noon_local())),
    )
    .unwrap();
    let app = create_router(AppState::new(Arc::new(sweeper), "/cron/nightly"));

    let (status, _) = call(app.clone(), "GET", "/cleanup").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(app, "GET", "/cron/nightly").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "/cron/nightly");
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let (_, state) = single_store(besauntct());
    let app = create_router(state);

    call(app.clone(), "GET", "/cleanup").await;
    let (status, body) = call(app, "GET", "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["stores"], json!({"default": true}));
    assert_eq!(body["stats"]["sweep_count"], 1);
    assert_eq!(body["stats"]["deleted"], 1);
}

#[tokio::test]
async fn test_health_check_reports_unavailable_store() {
    let up = Arc::new(MemoryStore::new());
    let down = Arc::new(MemoryStore::new());
    down.set_available(false);
    let state = create_test_state(
        JanitorConfig::reference_deployment(),
        vec![("firebase1", up), ("firebase2", down)],
    );

    let (status, body) = call(create_router(state), "GET", "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ok"], false);
    assert_eq!(body["stores"], json!({"firebase1": true, "firebase2": false}));
}

#[tokio::test]
async fn test_index() {
    let (_, state) = single_store(json!({}));
    let app = create_router(state);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Service is up");
}
