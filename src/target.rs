//! Target URL construction.
//!
//! Builds the address the headless browser loads for a given report. The
//! front-end origin comes from configuration; the report identifier is
//! percent-encoded before it is placed in the URL, so identifiers containing
//! `&`, `#`, `/`, or spaces cannot alter the target.
//!
//! Every URL carries `puppeteer=1`, which tells the front-end it is being
//! rendered for capture (hide interactive chrome, set the readiness marker).
//!
//! | Route | Shape |
//! |-------|-------|
//! | [`ReportRoute::Query`] | `{origin}/print-report?attemptId={id}&lang={lang}&puppeteer=1` |
//! | [`ReportRoute::Path`] | `{origin}/reports/pdf/{id}?lang={lang}&puppeteer=1` |

use crate::config::ReportRoute;
use crate::error::{ExportError, Result};

/// Language of the rendered report.
///
/// Parsing is lenient: any value other than `ar` (case-insensitive) selects
/// English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportLang {
    /// English, left-to-right.
    #[default]
    En,
    /// Arabic, right-to-left.
    Ar,
}

impl ReportLang {
    /// Parse the optional `lang` query value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use report2pdf_api::ReportLang;
    ///
    /// assert_eq!(ReportLang::from_query(Some("AR")), ReportLang::Ar);
    /// assert_eq!(ReportLang::from_query(Some("fr")), ReportLang::En);
    /// assert_eq!(ReportLang::from_query(None), ReportLang::En);
    /// ```
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("ar") => Self::Ar,
            _ => Self::En,
        }
    }

    /// Wire value used in URLs and filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}

impl std::fmt::Display for ReportLang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the URL of the print view for one report.
///
/// # Errors
///
/// Returns [`ExportError::Configuration`] if `origin` is missing or blank, or
/// if the assembled URL is not a valid absolute http(s) URL.
///
/// # Example
///
/// ```rust
/// use report2pdf_api::{build_target_url, ReportLang, ReportRoute};
///
/// let url = build_target_url(
///     Some("https://reports.example.com/"),
///     "a1b2 c3",
///     ReportLang::Ar,
///     ReportRoute::Query,
/// ).unwrap();
///
/// assert_eq!(
///     url,
///     "https://reports.example.com/print-report?attemptId=a1b2%20c3&lang=ar&puppeteer=1"
/// );
/// ```
pub fn build_target_url(
    origin: Option<&str>,
    attempt_id: &str,
    lang: ReportLang,
    route: ReportRoute,
) -> Result<String> {
    let origin = origin
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .ok_or_else(|| ExportError::Configuration("FRONTEND_URL is not configured".to_string()))?;

    let encoded = urlencoding::encode(attempt_id);
    let target = match route {
        ReportRoute::Query => format!(
            "{}/print-report?attemptId={}&lang={}&puppeteer=1",
            origin,
            encoded,
            lang.as_str()
        ),
        ReportRoute::Path => format!(
            "{}/reports/pdf/{}?lang={}&puppeteer=1",
            origin,
            encoded,
            lang.as_str()
        ),
    };

    let parsed = url::Url::parse(&target).map_err(|e| {
        ExportError::Configuration(format!("invalid report URL '{}': {}", target, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ExportError::Configuration(format!(
            "report URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }

    Ok(target)
}

/// Shorten a URL for log lines.
pub(crate) fn truncate_url(url: &str, max_len: usize) -> String {
    if url.chars().count() <= max_len {
        url.to_string()
    } else {
        let head: String = url.chars().take(max_len).collect();
        format!("{}...", head)
    }
}
