//! Integration tests for the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tg_post_reporter::browser::{BrowserError, PageDriver, PageFactory};
use tg_post_reporter::capture::CaptureSettings;
use tg_post_reporter::channel::ScrapeSettings;
use tg_post_reporter::config::Config;
use tg_post_reporter::pipeline::ReportPipeline;
use tg_post_reporter::report::{CreateReportRequest, ReportId, ReportStatus, ScrapedChannel};
use tg_post_reporter::store::ReportStore;
use tg_post_reporter::web::{create_app, AppState};
use tower::ServiceExt;

/// Browser that is never available, so background runs fail fast.
struct NoBrowser;

#[async_trait]
impl PageFactory for NoBrowser {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        Err(BrowserError::Launch("no browser in tests".to_string()))
    }
}

async fn setup() -> (Router, ReportStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::for_testing(temp_dir.path());
    std::fs::create_dir_all(&config.static_dir).unwrap();
    std::fs::write(config.static_dir.join("app.js"), "console.log('app');").unwrap();

    let store = ReportStore::new(&config.upload_dir);
    store.init().await.unwrap();

    let pipeline = Arc::new(ReportPipeline::new(
        store.clone(),
        Arc::new(NoBrowser),
        ScrapeSettings::default().without_delays(),
        CaptureSettings::default().without_delays(),
    ));
    let state = AppState {
        pipeline,
        config: Arc::new(config),
    };

    (create_app(state), store, temp_dir)
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _store, _temp_dir) = setup().await;

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn test_create_report_requires_all_fields() {
    let bodies = [
        r#"{}"#,
        r#"{"channelUrl":"https://t.me/example","startDate":"2024-01-01"}"#,
        r#"{"channelUrl":"https://t.me/example","endDate":"2024-01-02"}"#,
        r#"{"startDate":"2024-01-01","endDate":"2024-01-02"}"#,
        r#"{"channelUrl":"  ","startDate":"2024-01-01","endDate":"2024-01-02"}"#,
    ];

    for body in bodies {
        let (app, _store, _temp_dir) = setup().await;
        let response = app.oneshot(post_json("/api/reports", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");

        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }
}

#[tokio::test]
async fn test_create_report_rejects_malformed_input() {
    let (app, _store, _temp_dir) = setup().await;
    let response = app
        .oneshot(post_json("/api/reports", "not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);

    let (app, _store, _temp_dir) = setup().await;
    let response = app
        .oneshot(post_json(
            "/api/reports",
            r#"{"channelUrl":"https://t.me/example","startDate":"yesterday","endDate":"2024-01-02"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("startDate"));

    let (app, _store, _temp_dir) = setup().await;
    let response = app
        .oneshot(post_json(
            "/api/reports",
            r#"{"channelUrl":"https://t.me/example","startDate":"2020-01-01","endDate":"2024-01-02"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (app, store, _temp_dir) = setup().await;
    let response = app
        .oneshot(post_json(
            "/api/reports",
            r#"{"channelUrl":"https://example.com/durov","startDate":"2024-01-01","endDate":"2024-01-02"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("example.com"));
    let reports = std::fs::read_dir(store.root())
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().is_file())
        .count();
    assert_eq!(reports, 0);
}

#[tokio::test]
async fn test_create_report_is_accepted_and_resolvable() {
    let (app, store, _temp_dir) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/reports",
            r#"{"channelUrl":"https://t.me/example","startDate":"2024-01-01","endDate":"2024-01-02"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "pending");
    assert!(json["message"].is_string());
    let id = json["id"].as_u64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/reports/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["channel_username"], "example");
    assert_eq!(json["data"]["start_date"], "2024-01-01");

    // The background run fails without a browser and records why.
    let mut status = ReportStatus::Pending;
    for _ in 0..100 {
        let report = store.load(ReportId::new(id)).await.unwrap().unwrap();
        status = report.status;
        if status.is_terminal() {
            assert!(report.error.unwrap().contains("no browser in tests"));
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, ReportStatus::Failed);
}

#[tokio::test]
async fn test_get_report_round_trip() {
    let (app, store, _temp_dir) = setup().await;

    let request = CreateReportRequest {
        channel_url: Some("@example".to_string()),
        start_date: Some("2024-01-01".to_string()),
        end_date: Some("2024-01-02".to_string()),
    }
    .validate(366)
    .unwrap();
    let report = store
        .create_pending(&request, Utc::now())
        .await
        .unwrap()
        .complete(ScrapedChannel::default(), Vec::new(), Utc::now());
    store.save(&report).await.unwrap();

    let response = app
        .oneshot(get(&format!("/api/reports/{}", report.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"], serde_json::to_value(&report).unwrap());
    assert_eq!(json["data"]["posts_in_period"], 0);
    assert_eq!(json["data"]["status"], "done");
}

#[tokio::test]
async fn test_get_unknown_report() {
    let (app, _store, _temp_dir) = setup().await;

    for uri in ["/api/reports/1700000000000", "/api/reports/not-a-number", "/api/reports/-5"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json_body(response).await["success"], false);
    }
}

#[tokio::test]
async fn test_get_corrupt_report() {
    let (app, store, _temp_dir) = setup().await;
    let id = ReportId::new(42);
    std::fs::write(store.report_path(id), b"{ truncated").unwrap();

    let response = app.oneshot(get("/api/reports/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn test_unknown_api_path_is_json_404() {
    let (app, _store, _temp_dir) = setup().await;

    let response = app.oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn test_frontend_routes() {
    let (app, _store, _temp_dir) = setup().await;

    for uri in ["/", "/reports/123"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(r#"id="report-form""#));
    }

    let response = app.oneshot(get("/static/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_uploads_are_served() {
    let (app, store, _temp_dir) = setup().await;
    std::fs::write(store.screenshots_dir().join("post_example_1_1.png"), b"png").unwrap();

    let response = app
        .oneshot(get("/uploads/screenshots/post_example_1_1.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"png");
}
