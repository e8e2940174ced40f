//! Axum framework integration.
//!
//! This module exposes the export pipeline as HTTP routes.
//!
//! # Setup
//!
//! ```toml
//! [dependencies]
//! report2pdf-api = { version = "0.1", features = ["axum-integration"] }
//! ```
//!
//! # Routes
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `GET` | `/api/generate-pdf?attemptId=…&lang=…&debug=…` | PDF attachment, or JSON error |
//! | other | `/api/generate-pdf` | 405 with `Allow: GET` |
//! | `GET` | `/health` | JSON liveness report |
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use report2pdf_api::integrations::axum::router;
//! use report2pdf_api::prelude::*;
//!
//! let factory = Arc::new(ChromeSessionFactory::from_config(&config));
//! let exporter = Arc::new(ReportExporter::new(config, factory));
//!
//! let app = router(exporter);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Response Contract
//!
//! A request either gets a complete, signature-checked PDF or a JSON error
//! body. Bytes are never streamed before the pipeline finishes, so a failure
//! cannot leave a partial document on the wire.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ExportError;
use crate::service::{
    ErrorResponse, ExportQuery, ExportRequest, ExportResponse, HealthResponse, ReportExporter,
    parse_debug_flag,
};

/// Path of the export endpoint.
pub const EXPORT_PATH: &str = "/api/generate-pdf";

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Development front-end origin that is always allowed by CORS.
pub const DEV_ORIGIN: &str = "http://localhost:3000";

/// Shared exporter used as router state.
pub type SharedExporter = Arc<ReportExporter>;

/// Build the application router.
pub fn router(exporter: SharedExporter) -> Router {
    let cors = cors_layer(exporter.config().frontend_url.as_deref());

    Router::new()
        .route(EXPORT_PATH, get(generate_pdf).fallback(method_not_allowed))
        .route(HEALTH_PATH, get(health))
        .layer(cors)
        .with_state(exporter)
}

/// CORS policy allowing `GET` from the report front-end and [`DEV_ORIGIN`].
pub fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let mut origins = vec![HeaderValue::from_static(DEV_ORIGIN)];

    if let Some(url) = frontend_url {
        match HeaderValue::from_str(url.trim().trim_end_matches('/')) {
            Ok(origin) if !origins.contains(&origin) => origins.push(origin),
            Ok(_) => {}
            Err(e) => log::warn!("⚠️ FRONTEND_URL is not a valid CORS origin: {}", e),
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .expose_headers([header::CONTENT_DISPOSITION])
}

/// `GET /api/generate-pdf`
///
/// Validation happens before the exporter is touched, so a missing
/// identifier never launches a browser.
pub async fn generate_pdf(
    State(exporter): State<SharedExporter>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            let details = rejection.body_text();
            log::warn!("⚠️ Unparsable export query: {}", details);
            return (
                StatusCode::BAD_REQUEST,
                [(header::CACHE_CONTROL, "no-store")],
                Json(ErrorResponse::invalid_query(details)),
            )
                .into_response();
        }
    };

    let debug = parse_debug_flag(query.debug.as_deref());
    let request = match ExportRequest::from_query(&query) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("⚠️ Rejected export request: {}", e);
            return error_response(&e, debug, None);
        }
    };

    log::info!(
        "📄 Export requested: attemptId={} lang={} debug={}",
        request.attempt_id(),
        request.lang(),
        request.debug()
    );

    let attempt_id = request.attempt_id().to_string();
    let report_url = if request.debug() {
        exporter.target_url(&request).ok()
    } else {
        None
    };

    match exporter.export_async(request).await {
        Ok(pdf) => pdf_response(pdf),
        Err(e) => {
            log::error!("❌ Export of {} failed ({}): {}", attempt_id, e.kind(), e);
            error_response(&e, debug, report_url)
        }
    }
}

/// `GET /health`
pub async fn health(State(exporter): State<SharedExporter>) -> Json<HealthResponse> {
    Json(HealthResponse::new(
        exporter.config().frontend_url.clone(),
        exporter.session_stats().active,
    ))
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET")],
        Json(ErrorResponse {
            error: "Method not allowed".to_string(),
            code: Some("METHOD_NOT_ALLOWED".to_string()),
            ..ErrorResponse::generic()
        }),
    )
        .into_response()
}

fn pdf_response(pdf: ExportResponse) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, pdf.content_disposition()),
        (header::CONTENT_LENGTH, pdf.size().to_string()),
        (
            header::CACHE_CONTROL,
            "no-store, no-cache, must-revalidate".to_string(),
        ),
        (header::PRAGMA, "no-cache".to_string()),
        (header::EXPIRES, "0".to_string()),
    ];

    (StatusCode::OK, headers, pdf.data).into_response()
}

fn error_response(err: &ExportError, debug: bool, report_url: Option<String>) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        [(header::CACHE_CONTROL, "no-store")],
        Json(ErrorResponse::for_error(err, debug, report_url)),
    )
        .into_response()
}

// ============================================================================
// Unit Tests
// ============================================================================
