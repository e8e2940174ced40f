//! # report2pdf-api
//!
//! On-demand PDF export of dynamically rendered, internationalized web
//! reports through headless Chrome.
//!
//! Given a report identifier and a language, the pipeline launches a
//! dedicated browser, loads the report's print view, waits until the page
//! proves it is render-complete, prints it to PDF, validates the output, and
//! tears the browser down on every exit path.
//!
//! ## Features
//!
//! - **One Browser per Request**: No pooling; sessions are never shared or reused
//! - **Guaranteed Teardown**: RAII release covers errors and panics alike
//! - **Staged Readiness**: Navigation, app marker, fonts, layout settle, in order
//! - **Validated Output**: Non-PDF capture output is discarded, never returned
//! - **Hard Timeouts**: Every stage is bounded by its own timeout and the request deadline
//! - **RTL-Safe**: Waits for font loading so Arabic text is shaped before capture
//! - **Axum Integration**: Optional router with CORS and a liveness endpoint
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   GET /api/generate-pdf (integrations::axum) │
//! └─────────────────┬───────────────────────────┘
//!                   │ ExportRequest (validated)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │              ReportExporter                 │
//! │  build_target_url ─▶ SessionManager         │
//! │                        ├─ ReadinessSynchronizer
//! │                        ├─ capture_pdf       │
//! │                        └─ release (always)  │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │   SessionFactory (Chrome, or mock in tests) │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use report2pdf_api::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ExportConfigBuilder::new()
//!         .frontend_url("https://reports.example.com")
//!         .build()
//!         .map_err(ExportError::Configuration)?;
//!
//!     let factory = Arc::new(ChromeSessionFactory::from_config(&config));
//!     let exporter = Arc::new(ReportExporter::new(config, factory));
//!
//!     let request = ExportRequest::new("3f2a9c1e", Some("ar"), false)?;
//!     let pdf = exporter.export_async(request).await?;
//!     println!("{}: {} bytes", pdf.filename, pdf.data.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Load configuration from environment / `app.env` (default) |
//! | `axum-integration` | Axum router, handlers and CORS |
//! | `server` | The `report2pdf-server` binary (default) |
//! | `test-utils` | Scripted [`MockSessionFactory`](session::mock::MockSessionFactory) |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod capture;
pub mod config;
pub mod error;
pub mod prelude;
pub mod readiness;
pub mod service;
pub mod session;
pub mod stats;
pub mod target;

// ============================================================================
// Feature-gated modules
// ============================================================================

#[cfg(feature = "axum-integration")]
pub mod integrations;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use capture::{PDF_MAGIC, PdfArtifact, build_print_options, capture_pdf};
pub use config::{ExportConfig, ExportConfigBuilder, ReportRoute};
pub use error::{BrowserError, ExportError, Result};
pub use readiness::{ReadinessStage, ReadinessState, ReadinessSynchronizer};
pub use service::{ErrorResponse, ExportQuery, ExportRequest, ExportResponse, ReportExporter};
pub use session::{
    BrowserSession, ChromeSessionFactory, ReportPage, SessionFactory, SessionGuard,
    SessionManager,
};
pub use stats::SessionStats;
pub use target::{ReportLang, build_target_url};

#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use service::init_exporter;
