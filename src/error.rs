//! Error types for the report export pipeline.
//!
//! This module provides [`ExportError`], the single error taxonomy surfaced by
//! every pipeline stage, [`BrowserError`], the raw failure reported by the
//! browser capability, and a convenient [`Result`] type alias.
//!
//! Stage code never returns [`BrowserError`] to callers. Each stage translates
//! it into the [`ExportError`] variant that names the stage, so a caller can
//! tell a slow front-end ([`ExportError::ReadinessTimeout`]) apart from an
//! unreachable one ([`ExportError::Navigation`]).
//!
//! # Example
//!
//! ```rust
//! use report2pdf_api::{ExportError, Result};
//!
//! fn export() -> Result<Vec<u8>> {
//!     Err(ExportError::Validation("Missing attemptId".to_string()))
//! }
//!
//! match export() {
//!     Ok(pdf) => println!("Generated {} bytes", pdf.len()),
//!     Err(e) if e.is_client_error() => println!("Bad request: {}", e),
//!     Err(e) => eprintln!("Export failed ({}): {}", e.kind(), e),
//! }
//! ```

use std::time::Duration;

/// Errors that can occur while exporting a report to PDF.
///
/// # HTTP Status Code Mapping
///
/// | Variant | Kind | HTTP Status | Error Code |
/// |---------|------|-------------|------------|
/// | [`Validation`](Self::Validation) | `ValidationError` | 400 | `VALIDATION_ERROR` |
/// | [`Configuration`](Self::Configuration) | `ConfigurationError` | 500 | `CONFIGURATION_ERROR` |
/// | [`Launch`](Self::Launch) | `LaunchError` | 500 | `LAUNCH_ERROR` |
/// | [`Navigation`](Self::Navigation) | `NavigationError` | 500 | `NAVIGATION_ERROR` |
/// | [`ReadinessTimeout`](Self::ReadinessTimeout) | `ReadinessTimeoutError` | 500 | `READINESS_TIMEOUT` |
/// | [`Capture`](Self::Capture) | `CaptureError` | 500 | `CAPTURE_ERROR` |
/// | [`InvalidOutput`](Self::InvalidOutput) | `InvalidOutputError` | 500 | `INVALID_OUTPUT` |
/// | [`Release`](Self::Release) | `ReleaseError` | 500 | `RELEASE_ERROR` |
/// | [`Timeout`](Self::Timeout) | `TimeoutError` | 500 | `TIMEOUT` |
/// | [`Internal`](Self::Internal) | `InternalError` | 500 | `INTERNAL_ERROR` |
///
/// Only [`Validation`](Self::Validation) is a client error. Every pipeline
/// failure is reported as 500 regardless of which stage produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    /// The request was rejected before any browser resource was touched.
    ///
    /// Raised for a missing or blank `attemptId`.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A required collaborator address or setting is missing or invalid.
    ///
    /// # Common Causes
    ///
    /// - `FRONTEND_URL` not set
    /// - `FRONTEND_URL` is not an absolute http(s) URL
    /// - Invalid timeout values passed to the config builder
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The browser process could not be started or attached to.
    ///
    /// # Common Causes
    ///
    /// - Chrome/Chromium binary not found
    /// - Launch did not complete within the launch timeout
    /// - Process limits exhausted
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// The target page could not be loaded.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The front-end never set its readiness marker within the deadline.
    ///
    /// This is the most common real-world failure: a slow data fetch, a
    /// front-end bug, or a wrong target route.
    #[error("Report did not signal readiness: {0}")]
    ReadinessTimeout(String),

    /// The print-to-PDF call itself failed.
    #[error("PDF capture failed: {0}")]
    Capture(String),

    /// The captured bytes are not a PDF document.
    ///
    /// Typically the browser printed an HTML error page. The bytes are
    /// discarded and never returned to the caller.
    #[error("Captured output is not a PDF: {0}")]
    InvalidOutput(String),

    /// Tearing down the browser session failed.
    ///
    /// Logged by the session manager. Never surfaces as the primary failure
    /// of a request.
    #[error("Failed to release browser session: {0}")]
    Release(String),

    /// The overall request deadline elapsed.
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Unexpected failure, e.g. the blocking export task panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// Returns the classification name exposed in debug-mode responses.
    ///
    /// # Example
    ///
    /// ```rust
    /// use report2pdf_api::ExportError;
    ///
    /// let error = ExportError::ReadinessTimeout("60s".to_string());
    /// assert_eq!(error.kind(), "ReadinessTimeoutError");
    /// ```
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Launch(_) => "LaunchError",
            Self::Navigation(_) => "NavigationError",
            Self::ReadinessTimeout(_) => "ReadinessTimeoutError",
            Self::Capture(_) => "CaptureError",
            Self::InvalidOutput(_) => "InvalidOutputError",
            Self::Release(_) => "ReleaseError",
            Self::Timeout(_) => "TimeoutError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Returns a stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Launch(_) => "LAUNCH_ERROR",
            Self::Navigation(_) => "NAVIGATION_ERROR",
            Self::ReadinessTimeout(_) => "READINESS_TIMEOUT",
            Self::Capture(_) => "CAPTURE_ERROR",
            Self::InvalidOutput(_) => "INVALID_OUTPUT",
            Self::Release(_) => "RELEASE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use report2pdf_api::ExportError;
    ///
    /// assert_eq!(ExportError::Validation("empty".into()).status_code(), 400);
    /// assert_eq!(ExportError::Launch("no chrome".into()).status_code(), 500);
    /// ```
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Returns `true` if the caller can fix this error by changing the request.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Raw failure reported by a browser capability call.
///
/// Implementations of [`ReportPage`](crate::session::ReportPage) return this
/// type; the pipeline stages map it to an [`ExportError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    /// The DevTools protocol call failed.
    #[error("{0}")]
    Protocol(String),

    /// The awaited condition did not hold within the given duration.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type alias using [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;

// ============================================================================
// Unit Tests
// ============================================================================
