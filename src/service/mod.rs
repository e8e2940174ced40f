//! Report export service.
//!
//! This module is the **framework-agnostic core** of the export endpoint. It
//! owns request validation, the pipeline orchestration, and the response and
//! error body types reused by the HTTP integration.
//!
//! # Module Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     service module (this module)                  │
//! │                                                                   │
//! │  ┌─────────────────────────┐   ┌───────────────────────────────┐  │
//! │  │        types.rs         │   │           export.rs           │  │
//! │  │  ExportQuery            │   │  ReportExporter               │  │
//! │  │  ExportRequest          │   │    ├── export()               │  │
//! │  │  ExportResponse         │   │    ├── export_until()         │  │
//! │  │  ErrorResponse          │   │    └── export_async()         │  │
//! │  │  HealthResponse         │   │                               │  │
//! │  └─────────────────────────┘   └───────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │ used by
//!                                 ▼
//!                  integrations::axum (GET /api/generate-pdf)
//! ```
//!
//! The service follows the **"thin handler, thick service"** split: the
//! handler only maps query parameters in and results out.

pub mod export;
pub mod types;

pub use export::{ReportExporter, TIMEOUT_GRACE};

#[cfg(feature = "env-config")]
pub use export::init_exporter;
pub use types::{
    ErrorResponse, ExportQuery, ExportRequest, ExportResponse, GENERIC_FAILURE, HealthResponse,
    INVALID_QUERY, MISSING_ATTEMPT_ID, parse_debug_flag, report_filename, sanitize_filename,
};
