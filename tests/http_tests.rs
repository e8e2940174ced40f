//! HTTP contract tests for the axum router.

#![cfg(feature = "axum-integration")]

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use report2pdf_api::integrations::axum::router;
use report2pdf_api::prelude::*;
use report2pdf_api::session::mock::{MOCK_PDF, MockSessionFactory};

const BODY_LIMIT: usize = 1024 * 1024;

fn app(factory: MockSessionFactory, frontend: Option<&str>) -> axum::Router {
    let config = ExportConfigBuilder::new()
        .frontend_url_opt(frontend.map(str::to_string))
        .settle_delay(Duration::from_millis(1))
        .build()
        .unwrap();
    router(Arc::new(ReportExporter::new(config, Arc::new(factory))))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Identifier `abc123`, no language: 200 with an English attachment.
#[tokio::test]
async fn test_success_returns_pdf_attachment() {
    let app = app(MockSessionFactory::new(), Some("http://localhost:3000"));

    let response = app
        .oneshot(get("/api/generate-pdf?attemptId=abc123"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("abc123"));
    assert!(disposition.contains("-en.pdf"));
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate"
    );
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");
    assert_eq!(headers[header::CONTENT_LENGTH], MOCK_PDF.len().to_string().as_str());

    let body = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&body[..], MOCK_PDF);
}

/// Identifier `xyz`, Arabic, marker never set: generic 500, classified in debug.
#[tokio::test]
async fn test_readiness_timeout_generic_and_debug() {
    let app = app(MockSessionFactory::never_ready(), Some("http://localhost:3000"));

    let response = app
        .clone()
        .oneshot(get("/api/generate-pdf?attemptId=xyz&lang=ar"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": "PDF generation failed" })
    );

    let response = app
        .oneshot(get("/api/generate-pdf?attemptId=xyz&lang=ar&debug=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "ReadinessTimeoutError");
    assert_eq!(body["code"], "READINESS_TIMEOUT");
    assert_eq!(
        body["reportUrl"],
        "http://localhost:3000/print-report?attemptId=xyz&lang=ar&puppeteer=1"
    );
}

/// Empty identifier: 400 and no browser launched.
#[tokio::test]
async fn test_missing_identifier_launches_nothing() {
    let factory = MockSessionFactory::new();
    let launches = factory.launch_counter();
    let app = app(factory, Some("http://localhost:3000"));

    for uri in [
        "/api/generate-pdf",
        "/api/generate-pdf?attemptId=",
        "/api/generate-pdf?attemptId=%20%20&lang=ar",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "error": "Missing attemptId", "code": "VALIDATION_ERROR" })
        );
    }

    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

/// A query that cannot be decoded is a 400 that says what was wrong.
#[tokio::test]
async fn test_undecodable_query_reports_details() {
    let factory = MockSessionFactory::new();
    let launches = factory.launch_counter();
    let app = app(factory, Some("http://localhost:3000"));

    let response = app
        .oneshot(get("/api/generate-pdf?attemptId=abc&attemptId=def"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Invalid query");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(
        body["details"].as_str().unwrap().contains("attemptId"),
        "got: {}",
        body
    );
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

/// Capture returns an HTML page: 500 and no binary body.
#[tokio::test]
async fn test_invalid_output_never_sent() {
    let app = app(
        MockSessionFactory::returning_bytes(b"<html><body>Error</body></html>".to_vec()),
        Some("http://localhost:3000"),
    );

    let response = app
        .oneshot(get("/api/generate-pdf?attemptId=abc123&debug=true"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    assert!(!bytes.starts_with(b"%PDF-"));
    assert!(!bytes.starts_with(b"<html>"));

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "InvalidOutputError");
}

/// No front-end configured: 500 configuration error, no launch.
#[tokio::test]
async fn test_missing_frontend_is_server_error() {
    let factory = MockSessionFactory::new();
    let launches = factory.launch_counter();
    let app = app(factory, None);

    let response = app
        .oneshot(get("/api/generate-pdf?attemptId=abc123&debug=yes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "ConfigurationError");
    assert!(body.get("reportUrl").is_none());
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

/// Only GET is accepted on the export route.
#[tokio::test]
async fn test_post_is_method_not_allowed() {
    let factory = MockSessionFactory::new();
    let launches = factory.launch_counter();
    let app = app(factory, Some("http://localhost:3000"));

    let request = Request::builder()
        .method("POST")
        .uri("/api/generate-pdf?attemptId=abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET");
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

/// The legacy `attempt_id` spelling is accepted.
#[tokio::test]
async fn test_snake_case_identifier_alias() {
    let app = app(MockSessionFactory::new(), Some("http://localhost:3000"));

    let response = app
        .oneshot(get("/api/generate-pdf?attempt_id=abc123&lang=AR"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("report-abc123-ar.pdf"));
}

#[tokio::test]
async fn test_health() {
    let app = app(MockSessionFactory::new(), Some("http://localhost:3000"));

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["service"], "report2pdf-api");
    assert_eq!(body["frontend"], "http://localhost:3000");
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn test_cors_allows_frontend_origin() {
    let app = app(MockSessionFactory::new(), Some("https://reports.example.com"));

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://reports.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://reports.example.com"
    );
}
