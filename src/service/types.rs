//! Request and response types for report export.
//!
//! These types are framework-agnostic: the axum integration deserializes
//! [`ExportQuery`] from the query string and serializes [`ErrorResponse`] /
//! [`HealthResponse`] as JSON, but nothing here depends on a web framework.
//!
//! # Query Parameters
//!
//! | Parameter | Required | Values |
//! |-----------|----------|--------|
//! | `attemptId` (alias `attempt_id`) | yes | opaque identifier, trimmed |
//! | `lang` | no | `ar`, anything else means `en` |
//! | `debug` | no | `1`, `true`, `yes`, `on` enable diagnostics |

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::target::ReportLang;

/// Generic message returned for every pipeline failure.
pub const GENERIC_FAILURE: &str = "PDF generation failed";

/// Message returned when `attemptId` is missing or blank.
pub const MISSING_ATTEMPT_ID: &str = "Missing attemptId";

/// Error message for a query string that cannot be decoded.
pub const INVALID_QUERY: &str = "Invalid query";

/// Number of identifier characters embedded in the download filename.
pub const FILENAME_ID_CHARS: usize = 8;

/// Raw query parameters of `GET /api/generate-pdf`.
///
/// Every field is optional at this level so that a missing identifier
/// becomes a structured 400 rather than a framework rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportQuery {
    /// Report identifier.
    #[serde(default, rename = "attemptId", alias = "attempt_id")]
    pub attempt_id: Option<String>,

    /// Requested language.
    #[serde(default)]
    pub lang: Option<String>,

    /// Diagnostic mode toggle.
    #[serde(default)]
    pub debug: Option<String>,
}

/// A validated export request.
///
/// Immutable once built; an empty identifier never gets this far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    attempt_id: String,
    lang: ReportLang,
    debug: bool,
}

impl ExportRequest {
    /// Validate and normalize an incoming request.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] if `attempt_id` is empty after
    /// trimming.
    ///
    /// # Example
    ///
    /// ```rust
    /// use report2pdf_api::{ExportRequest, ReportLang};
    ///
    /// let request = ExportRequest::new(" abc123 ", Some("AR"), false).unwrap();
    /// assert_eq!(request.attempt_id(), "abc123");
    /// assert_eq!(request.lang(), ReportLang::Ar);
    ///
    /// assert!(ExportRequest::new("   ", None, false).is_err());
    /// ```
    pub fn new(attempt_id: &str, lang: Option<&str>, debug: bool) -> Result<Self> {
        let attempt_id = attempt_id.trim();
        if attempt_id.is_empty() {
            return Err(ExportError::Validation(MISSING_ATTEMPT_ID.to_string()));
        }

        Ok(Self {
            attempt_id: attempt_id.to_string(),
            lang: ReportLang::from_query(lang),
            debug,
        })
    }

    /// Build a request from raw query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] if `attemptId` is absent or blank.
    pub fn from_query(query: &ExportQuery) -> Result<Self> {
        Self::new(
            query.attempt_id.as_deref().unwrap_or_default(),
            query.lang.as_deref(),
            parse_debug_flag(query.debug.as_deref()),
        )
    }

    /// The trimmed report identifier.
    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    /// The normalized language.
    pub fn lang(&self) -> ReportLang {
        self.lang
    }

    /// Whether diagnostic error bodies were requested.
    pub fn debug(&self) -> bool {
        self.debug
    }
}

/// Interpret the `debug` query flag.
///
/// `1`, `true`, `yes` and `on` (case-insensitive) enable it; anything else,
/// including absence, disables it.
pub fn parse_debug_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_filename(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Download filename for a report.
///
/// # Example
///
/// ```rust
/// use report2pdf_api::ReportLang;
/// use report2pdf_api::service::report_filename;
///
/// assert_eq!(
///     report_filename("report", "3f2a9c1e-77aa-4c1e", ReportLang::Ar),
///     "report-3f2a9c1e-ar.pdf"
/// );
/// ```
pub fn report_filename(prefix: &str, attempt_id: &str, lang: ReportLang) -> String {
    let short: String = attempt_id.chars().take(FILENAME_ID_CHARS).collect();
    format!(
        "{}-{}-{}.pdf",
        sanitize_filename(prefix),
        sanitize_filename(&short),
        lang.as_str()
    )
}

/// A successfully exported report.
#[derive(Debug, Clone)]
pub struct ExportResponse {
    /// Validated PDF bytes.
    pub data: Vec<u8>,

    /// Sanitized download filename.
    pub filename: String,
}

impl ExportResponse {
    /// `Content-Disposition` header value. Always an attachment.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    /// Size of the PDF in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// JSON error body.
///
/// # Shapes
///
/// | Case | Body |
/// |------|------|
/// | Missing identifier | `{"error":"Missing attemptId","code":"VALIDATION_ERROR"}` |
/// | Undecodable query | `{"error":"Invalid query","code":"VALIDATION_ERROR","details":...}` |
/// | Pipeline failure | `{"error":"PDF generation failed"}` |
/// | Pipeline failure, debug | adds `kind`, `code`, `details`, `reportUrl` |
///
/// Failure bodies are always JSON; no PDF bytes are ever mixed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Human-readable summary.
    pub error: String,

    /// Error classification, debug mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Full error message, debug mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// URL the browser was pointed at, debug mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}

impl ErrorResponse {
    /// Body for a pipeline failure in normal mode.
    pub fn generic() -> Self {
        Self {
            error: GENERIC_FAILURE.to_string(),
            kind: None,
            code: None,
            details: None,
            report_url: None,
        }
    }

    /// Body for a pipeline failure in debug mode.
    pub fn debug(err: &ExportError, report_url: Option<String>) -> Self {
        Self {
            error: GENERIC_FAILURE.to_string(),
            kind: Some(err.kind().to_string()),
            code: Some(err.error_code().to_string()),
            details: Some(err.to_string()),
            report_url,
        }
    }

    /// Body for a rejected request.
    pub fn validation() -> Self {
        Self {
            error: MISSING_ATTEMPT_ID.to_string(),
            code: Some(ExportError::Validation(String::new()).error_code().to_string()),
            ..Self::generic()
        }
    }

    /// Body for a query string that could not be decoded at all.
    ///
    /// `details` names the offending parameter, so it is returned even
    /// without the debug flag.
    pub fn invalid_query<S: Into<String>>(details: S) -> Self {
        Self {
            error: INVALID_QUERY.to_string(),
            details: Some(details.into()),
            ..Self::validation()
        }
    }

    /// Pick the body for `err` honoring the debug flag.
    pub fn for_error(err: &ExportError, debug: bool, report_url: Option<String>) -> Self {
        if err.is_client_error() {
            Self::validation()
        } else if debug {
            Self::debug(err, report_url)
        } else {
            Self::generic()
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"OK"` when the endpoint responds.
    pub status: String,

    /// Service name.
    pub service: String,

    /// Configured report front-end origin.
    pub frontend: Option<String>,

    /// Browser sessions currently alive.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Build a health body.
    pub fn new(frontend: Option<String>, active_sessions: usize) -> Self {
        Self {
            status: "OK".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            frontend,
            active_sessions,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
