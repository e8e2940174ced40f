//! Configuration for the report export pipeline.
//!
//! This module provides [`ExportConfig`] and [`ExportConfigBuilder`] for
//! configuring the collaborator origin, the readiness protocol, per-stage
//! timeouts, and the browser viewport. The configuration is built once at
//! startup and injected into [`ReportExporter`](crate::ReportExporter); the
//! pipeline never consults the environment itself.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use report2pdf_api::ExportConfigBuilder;
//!
//! let config = ExportConfigBuilder::new()
//!     .frontend_url("https://reports.example.com")
//!     .ready_timeout(Duration::from_secs(45))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.frontend_url.as_deref(), Some("https://reports.example.com"));
//! assert_eq!(config.ready_timeout, Duration::from_secs(45));
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded from
//! environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use report2pdf_api::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::time::Duration;

/// Route shape used to address the report on the front-end.
///
/// Deployed front-ends disagree on this, so it is configurable. Both shapes
/// carry the same identifier, language, and automation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportRoute {
    /// `{origin}/print-report?attemptId={id}&lang={lang}&puppeteer=1`
    #[default]
    Query,

    /// `{origin}/reports/pdf/{id}?lang={lang}&puppeteer=1`
    Path,
}

impl std::str::FromStr for ReportRoute {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "path" => Ok(Self::Path),
            other => Err(format!(
                "unknown report route '{}' (expected 'query' or 'path')",
                other
            )),
        }
    }
}

/// Configuration for the export pipeline.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `frontend_url` | none | Origin of the report front-end |
/// | `report_route` | `Query` | Route shape on the front-end |
/// | `ready_selector` | `body[data-pdf-ready="1"]` | Readiness marker |
/// | `viewport_width` × `viewport_height` | 1240 × 1754 | A4-proportioned viewport |
/// | `launch_timeout` | 30s | Browser start + attach |
/// | `navigation_timeout` | 60s | Page load |
/// | `ready_timeout` | 60s | Readiness marker |
/// | `fonts_timeout` | 10s | Font loading (best effort) |
/// | `settle_frames` | 2 | Animation frames to yield |
/// | `settle_delay` | 250ms | Grace delay after the frames |
/// | `poll_interval` | 200ms | Readiness polling interval |
/// | `request_timeout` | 90s | Overall deadline per request |
/// | `max_concurrent_exports` | 4 | Live browser processes at once |
/// | `filename_prefix` | `report` | Download filename prefix |
/// | `chrome_path` | auto | Custom Chrome binary |
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Origin of the report front-end, e.g. `https://reports.example.com`.
    ///
    /// When absent, every export request fails with
    /// [`ExportError::Configuration`](crate::ExportError::Configuration).
    pub frontend_url: Option<String>,

    /// Route shape used to build the target URL.
    pub report_route: ReportRoute,

    /// CSS selector that matches only once the front-end has finished rendering.
    pub ready_selector: String,

    /// Browser viewport width in CSS pixels.
    pub viewport_width: u32,

    /// Browser viewport height in CSS pixels.
    pub viewport_height: u32,

    /// Maximum time for the browser process to start and accept a connection.
    pub launch_timeout: Duration,

    /// Maximum time for the page load event.
    pub navigation_timeout: Duration,

    /// Maximum time to wait for the readiness marker.
    pub ready_timeout: Duration,

    /// Maximum time to wait for `document.fonts.ready`.
    pub fonts_timeout: Duration,

    /// Number of animation frames to yield after fonts settle.
    pub settle_frames: u32,

    /// Fixed grace delay after the animation frames.
    pub settle_delay: Duration,

    /// Interval between readiness polls.
    pub poll_interval: Duration,

    /// Overall deadline for one export request, launch to capture.
    pub request_timeout: Duration,

    /// Maximum number of exports (and therefore browser processes) in flight.
    pub max_concurrent_exports: usize,

    /// Prefix of the download filename.
    pub filename_prefix: String,

    /// Custom Chrome/Chromium binary. `None` lets headless_chrome detect one.
    pub chrome_path: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            frontend_url: None,
            report_route: ReportRoute::Query,
            ready_selector: r#"body[data-pdf-ready="1"]"#.to_string(),
            viewport_width: 1240,
            viewport_height: 1754,
            launch_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(60),
            ready_timeout: Duration::from_secs(60),
            fonts_timeout: Duration::from_secs(10),
            settle_frames: 2,
            settle_delay: Duration::from_millis(250),
            poll_interval: Duration::from_millis(200),
            request_timeout: Duration::from_secs(90),
            max_concurrent_exports: 4,
            filename_prefix: "report".to_string(),
            chrome_path: None,
        }
    }
}

/// Builder for [`ExportConfig`] with validation.
///
/// # Validation
///
/// The [`build()`](Self::build) method validates:
/// - all timeouts and the poll interval are non-zero
/// - no stage timeout exceeds `request_timeout`
/// - the viewport is non-empty
/// - `ready_selector` and `filename_prefix` are not blank
/// - `max_concurrent_exports` is greater than 0
/// - `frontend_url`, when set, is an absolute http(s) URL
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: ExportConfig::default(),
        }
    }

    /// Set the report front-end origin.
    pub fn frontend_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.frontend_url = Some(url.into());
        self
    }

    /// Set or clear the report front-end origin.
    pub fn frontend_url_opt(mut self, url: Option<String>) -> Self {
        self.config.frontend_url = url;
        self
    }

    /// Set the route shape on the front-end.
    pub fn report_route(mut self, route: ReportRoute) -> Self {
        self.config.report_route = route;
        self
    }

    /// Set the readiness marker selector.
    ///
    /// # Example
    ///
    /// ```rust
    /// use report2pdf_api::ExportConfigBuilder;
    ///
    /// let config = ExportConfigBuilder::new()
    ///     .ready_selector("#report[data-ready]")
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.ready_selector, "#report[data-ready]");
    /// ```
    pub fn ready_selector<S: Into<String>>(mut self, selector: S) -> Self {
        self.config.ready_selector = selector.into();
        self
    }

    /// Set the browser viewport in CSS pixels.
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    /// Set the browser launch timeout.
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.config.launch_timeout = timeout;
        self
    }

    /// Set the navigation timeout.
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    /// Set the readiness marker timeout.
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.ready_timeout = timeout;
        self
    }

    /// Set the font loading timeout.
    pub fn fonts_timeout(mut self, timeout: Duration) -> Self {
        self.config.fonts_timeout = timeout;
        self
    }

    /// Set the number of animation frames yielded during layout settle.
    pub fn settle_frames(mut self, frames: u32) -> Self {
        self.config.settle_frames = frames;
        self
    }

    /// Set the grace delay after the settle frames.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set the readiness polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the overall per-request deadline.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the maximum number of concurrent exports.
    pub fn max_concurrent_exports(mut self, max: usize) -> Self {
        self.config.max_concurrent_exports = max;
        self
    }

    /// Set the download filename prefix.
    pub fn filename_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.filename_prefix = prefix.into();
        self
    }

    /// Set a custom Chrome binary path.
    pub fn chrome_path_opt(mut self, path: Option<String>) -> Self {
        self.config.chrome_path = path;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use report2pdf_api::ExportConfigBuilder;
    ///
    /// // Stage timeout longer than the request deadline
    /// let config = ExportConfigBuilder::new()
    ///     .request_timeout(Duration::from_secs(30))
    ///     .ready_timeout(Duration::from_secs(60))
    ///     .build();
    /// assert!(config.is_err());
    /// ```
    pub fn build(self) -> std::result::Result<ExportConfig, String> {
        let config = self.config;

        let durations = [
            ("launch_timeout", config.launch_timeout),
            ("navigation_timeout", config.navigation_timeout),
            ("ready_timeout", config.ready_timeout),
            ("fonts_timeout", config.fonts_timeout),
            ("poll_interval", config.poll_interval),
            ("request_timeout", config.request_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(format!("{} must be greater than 0", name));
            }
        }

        let stages = [
            ("launch_timeout", config.launch_timeout),
            ("navigation_timeout", config.navigation_timeout),
            ("ready_timeout", config.ready_timeout),
            ("fonts_timeout", config.fonts_timeout),
        ];
        for (name, value) in stages {
            if value > config.request_timeout {
                return Err(format!("{} cannot exceed request_timeout", name));
            }
        }

        if config.viewport_width == 0 || config.viewport_height == 0 {
            return Err("viewport must be non-empty".to_string());
        }

        if config.ready_selector.trim().is_empty() {
            return Err("ready_selector must not be empty".to_string());
        }

        if config.filename_prefix.trim().is_empty() {
            return Err("filename_prefix must not be empty".to_string());
        }

        if config.max_concurrent_exports == 0 {
            return Err("max_concurrent_exports must be greater than 0".to_string());
        }

        if let Some(frontend) = &config.frontend_url {
            let parsed = url::Url::parse(frontend.trim())
                .map_err(|e| format!("FRONTEND_URL '{}' is invalid: {}", frontend, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("FRONTEND_URL '{}' must use http or https", frontend));
            }
        }

        Ok(config)
    }
}

impl Default for ExportConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `FRONTEND_URL` | String | none | Report front-end origin |
/// | `REPORT_ROUTE` | `query`/`path` | `query` | Route shape |
/// | `PDF_READY_SELECTOR` | String | `body[data-pdf-ready="1"]` | Readiness marker |
/// | `CHROME_PATH` | String | auto | Custom Chrome binary path |
/// | `BROWSER_LAUNCH_TIMEOUT_SECONDS` | u64 | 30 | Launch timeout |
/// | `NAVIGATION_TIMEOUT_SECONDS` | u64 | 60 | Navigation timeout |
/// | `READY_TIMEOUT_SECONDS` | u64 | 60 | Readiness timeout |
/// | `FONTS_TIMEOUT_SECONDS` | u64 | 10 | Font loading timeout |
/// | `SETTLE_DELAY_MS` | u64 | 250 | Layout grace delay |
/// | `EXPORT_TIMEOUT_SECONDS` | u64 | 90 | Overall request deadline |
/// | `MAX_CONCURRENT_EXPORTS` | usize | 4 | Concurrent exports |
/// | `PDF_FILENAME_PREFIX` | String | `report` | Download filename prefix |
///
/// # Example `app.env` File
///
/// ```text
/// FRONTEND_URL=https://reports.example.com
/// READY_TIMEOUT_SECONDS=60
/// # CHROME_PATH=/usr/bin/chromium
/// ```
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::ExportError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from the `app.env` file.
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
        let raw = std::env::var(name).ok()?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring unparsable {}={:?}, using default", name, raw);
                None
            }
        }
    }

    fn non_empty_var(name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Load configuration from environment variables.
    ///
    /// Loads `app.env` if present, then reads the variables listed in the
    /// [module documentation](self). Unset or unparsable numeric variables
    /// fall back to defaults. A missing `FRONTEND_URL` is not an error here:
    /// the service starts and reports a configuration error per request.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Configuration`] if the resulting configuration
    /// fails validation.
    pub fn from_env() -> Result<ExportConfig, ExportError> {
        match load_env_file() {
            Ok(path) => {
                log::info!("Loaded configuration from: {:?}", path);
            }
            Err(e) => {
                log::debug!(
                    "No {} file found or failed to load: {} (using environment variables and defaults)",
                    ENV_FILE_NAME,
                    e
                );
            }
        }

        let defaults = ExportConfig::default();
        let frontend_url = non_empty_var("FRONTEND_URL");

        let report_route = match non_empty_var("REPORT_ROUTE") {
            Some(raw) => raw.parse().map_err(ExportError::Configuration)?,
            None => defaults.report_route,
        };

        let secs = |name: &str, default: Duration| {
            parse_var::<u64>(name)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let launch_timeout = secs("BROWSER_LAUNCH_TIMEOUT_SECONDS", defaults.launch_timeout);
        let navigation_timeout = secs("NAVIGATION_TIMEOUT_SECONDS", defaults.navigation_timeout);
        let ready_timeout = secs("READY_TIMEOUT_SECONDS", defaults.ready_timeout);
        let fonts_timeout = secs("FONTS_TIMEOUT_SECONDS", defaults.fonts_timeout);
        let request_timeout = secs("EXPORT_TIMEOUT_SECONDS", defaults.request_timeout);
        let settle_delay = parse_var::<u64>("SETTLE_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.settle_delay);
        let max_concurrent =
            parse_var::<usize>("MAX_CONCURRENT_EXPORTS").unwrap_or(defaults.max_concurrent_exports);

        log::info!("Loading export configuration from environment:");
        match &frontend_url {
            Some(url) => log::info!("   - Frontend URL: {}", url),
            None => log::warn!("   - Frontend URL: NOT SET (exports will fail)"),
        }
        log::info!("   - Report route: {:?}", report_route);
        log::info!("   - Launch timeout: {}s", launch_timeout.as_secs());
        log::info!("   - Navigation timeout: {}s", navigation_timeout.as_secs());
        log::info!("   - Ready timeout: {}s", ready_timeout.as_secs());
        log::info!("   - Fonts timeout: {}s", fonts_timeout.as_secs());
        log::info!("   - Request timeout: {}s", request_timeout.as_secs());
        log::info!("   - Max concurrent exports: {}", max_concurrent);

        ExportConfigBuilder::new()
            .frontend_url_opt(frontend_url)
            .report_route(report_route)
            .ready_selector(
                non_empty_var("PDF_READY_SELECTOR").unwrap_or(defaults.ready_selector),
            )
            .launch_timeout(launch_timeout)
            .navigation_timeout(navigation_timeout)
            .ready_timeout(ready_timeout)
            .fonts_timeout(fonts_timeout)
            .settle_delay(settle_delay)
            .request_timeout(request_timeout)
            .max_concurrent_exports(max_concurrent)
            .filename_prefix(
                non_empty_var("PDF_FILENAME_PREFIX").unwrap_or(defaults.filename_prefix),
            )
            .chrome_path_opt(chrome_path_from_env())
            .build()
            .map_err(ExportError::Configuration)
    }

    /// Get Chrome path from the `CHROME_PATH` environment variable.
    pub fn chrome_path_from_env() -> Option<String> {
        non_empty_var("CHROME_PATH")
    }

    /// Default server host.
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Default server port.
    pub const DEFAULT_PORT: u16 = 3001;

    /// Server bind address from `HOST` and `PORT`.
    ///
    /// Falls back to `0.0.0.0:3001`.
    pub fn bind_address_from_env() -> String {
        let host = non_empty_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_var::<u16>("PORT").unwrap_or(DEFAULT_PORT);
        format!("{}:{}", host, port)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================


#[cfg(all(test, feature = "env-config"))]
mod env_tests {
    use super::env::{DEFAULT_PORT, bind_address_from_env, from_env};
    use super::*;
    use crate::error::ExportError;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const MANAGED: &[&str] = &[
        "FRONTEND_URL",
        "REPORT_ROUTE",
        "PDF_READY_SELECTOR",
        "CHROME_PATH",
        "BROWSER_LAUNCH_TIMEOUT_SECONDS",
        "NAVIGATION_TIMEOUT_SECONDS",
        "READY_TIMEOUT_SECONDS",
        "FONTS_TIMEOUT_SECONDS",
        "SETTLE_DELAY_MS",
        "EXPORT_TIMEOUT_SECONDS",
        "MAX_CONCURRENT_EXPORTS",
        "PDF_FILENAME_PREFIX",
        "HOST",
        "PORT",
    ];

    /// Restores the managed variables on drop, even if the test panics.
    struct RestoreEnv(Vec<(&'static str, Option<String>)>);

    impl Drop for RestoreEnv {
        fn drop(&mut self) {
            for (name, value) in self.0.drain(..) {
                // SAFETY: ENV_LOCK is held by the test that owns this guard.
                unsafe {
                    match value {
                        Some(v) => std::env::set_var(name, v),
                        None => std::env::remove_var(name),
                    }
                }
            }
        }
    }

    /// Run `f` with only `vars` set among the managed variables.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _restore = RestoreEnv(
            MANAGED
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        );

        // SAFETY: ENV_LOCK serializes every test that touches these variables.
        unsafe {
            for name in MANAGED {
                std::env::remove_var(name);
            }
            for (name, value) in vars {
                std::env::set_var(name, value);
            }
        }

        f()
    }

    #[test]
    fn test_from_env_defaults() {
        let config = with_env(&[], from_env).unwrap();

        assert!(config.frontend_url.is_none());
        assert_eq!(config.report_route, ReportRoute::Query);
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.max_concurrent_exports, 4);
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn test_from_env_reads_every_variable() {
        let config = with_env(
            &[
                ("FRONTEND_URL", "https://reports.example.com"),
                ("REPORT_ROUTE", "path"),
                ("PDF_READY_SELECTOR", "#report[data-ready]"),
                ("CHROME_PATH", "/usr/bin/chromium"),
                ("BROWSER_LAUNCH_TIMEOUT_SECONDS", "20"),
                ("NAVIGATION_TIMEOUT_SECONDS", "45"),
                ("READY_TIMEOUT_SECONDS", "50"),
                ("FONTS_TIMEOUT_SECONDS", "5"),
                ("SETTLE_DELAY_MS", "400"),
                ("EXPORT_TIMEOUT_SECONDS", "120"),
                ("MAX_CONCURRENT_EXPORTS", "2"),
                ("PDF_FILENAME_PREFIX", "attempt"),
            ],
            from_env,
        )
        .unwrap();

        assert_eq!(config.frontend_url.as_deref(), Some("https://reports.example.com"));
        assert_eq!(config.report_route, ReportRoute::Path);
        assert_eq!(config.ready_selector, "#report[data-ready]");
        assert_eq!(config.chrome_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(config.launch_timeout, Duration::from_secs(20));
        assert_eq!(config.navigation_timeout, Duration::from_secs(45));
        assert_eq!(config.ready_timeout, Duration::from_secs(50));
        assert_eq!(config.fonts_timeout, Duration::from_secs(5));
        assert_eq!(config.settle_delay, Duration::from_millis(400));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.max_concurrent_exports, 2);
        assert_eq!(config.filename_prefix, "attempt");
    }

    #[test]
    fn test_from_env_rejects_unknown_route() {
        let result = with_env(&[("REPORT_ROUTE", "bogus")], from_env);

        assert!(matches!(result, Err(ExportError::Configuration(_))), "{:?}", result);
    }

    #[test]
    fn test_from_env_unparsable_numbers_use_defaults() {
        let config = with_env(
            &[
                ("NAVIGATION_TIMEOUT_SECONDS", "soon"),
                ("MAX_CONCURRENT_EXPORTS", "-1"),
                ("SETTLE_DELAY_MS", "1.5"),
            ],
            from_env,
        )
        .unwrap();

        let defaults = ExportConfig::default();
        assert_eq!(config.navigation_timeout, defaults.navigation_timeout);
        assert_eq!(config.max_concurrent_exports, defaults.max_concurrent_exports);
        assert_eq!(config.settle_delay, defaults.settle_delay);
    }

    #[test]
    fn test_from_env_rejects_deadline_below_stage_timeouts() {
        let result = with_env(&[("EXPORT_TIMEOUT_SECONDS", "30")], from_env);

        match result {
            Err(ExportError::Configuration(message)) => {
                assert!(message.contains("cannot exceed request_timeout"), "got: {}", message)
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_env_rejects_invalid_frontend() {
        let result = with_env(&[("FRONTEND_URL", "ftp://reports.example.com")], from_env);

        assert!(matches!(result, Err(ExportError::Configuration(_))));
    }

    #[test]
    fn test_bind_address_from_env() {
        assert_eq!(
            with_env(&[], bind_address_from_env),
            format!("0.0.0.0:{}", DEFAULT_PORT)
        );
        assert_eq!(
            with_env(&[("HOST", "127.0.0.1"), ("PORT", "8080")], bind_address_from_env),
            "127.0.0.1:8080"
        );
        assert_eq!(
            with_env(&[("PORT", "http")], bind_address_from_env),
            "0.0.0.0:3001"
        );
    }
}
