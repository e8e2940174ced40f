//! Export pipeline orchestration.
//!
//! [`ReportExporter`] drives one request through the pipeline in strict
//! sequence:
//!
//! ```text
//! ExportRequest (validated)
//!   │
//!   ├── build_target_url ───────────── ConfigurationError (no session touched)
//!   │
//!   └── SessionManager::with_session ─ LaunchError
//!         ├── ReadinessSynchronizer::run ── NavigationError / ReadinessTimeoutError
//!         ├── capture_pdf ──────────────── CaptureError / InvalidOutputError / TimeoutError
//!         └── release (always) ─────────── ReleaseError, logged only
//! ```
//!
//! The browser API is blocking, so [`ReportExporter::export_async`] runs the
//! pipeline on tokio's blocking pool behind a semaphore and an overall
//! timeout. Every browser call inside the pipeline is bounded by the request
//! deadline. The overall timeout is a backstop: when it fires, the caller
//! still waits for the session to be released before the error is returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::capture::capture_pdf;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::readiness::ReadinessSynchronizer;
use crate::service::types::{ExportRequest, ExportResponse, report_filename};
use crate::session::{SessionFactory, SessionManager};
use crate::stats::SessionStats;
use crate::target::{build_target_url, truncate_url};

/// Extra time granted to the blocking task past the request deadline, so
/// that a stage timing out at the deadline can still report its own error.
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// The report export pipeline.
///
/// Holds only process-wide, read-only state: the configuration, the session
/// manager, and the concurrency limit. Requests share nothing else.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use report2pdf_api::{ExportRequest, ReportExporter};
/// use report2pdf_api::session::ChromeSessionFactory;
///
/// let factory = Arc::new(ChromeSessionFactory::from_config(&config));
/// let exporter = Arc::new(ReportExporter::new(config, factory));
///
/// let request = ExportRequest::new("abc123", Some("ar"), false)?;
/// let pdf = exporter.export_async(request).await?;
/// std::fs::write(&pdf.filename, &pdf.data)?;
/// ```
pub struct ReportExporter {
    config: Arc<ExportConfig>,
    sessions: SessionManager,
    synchronizer: ReadinessSynchronizer,
    permits: Arc<Semaphore>,
}

impl ReportExporter {
    /// Create an exporter.
    pub fn new(config: ExportConfig, factory: Arc<dyn SessionFactory>) -> Self {
        log::info!(
            "Creating report exporter (frontend: {}, max concurrent: {})",
            config.frontend_url.as_deref().unwrap_or("<not configured>"),
            config.max_concurrent_exports
        );

        Self {
            synchronizer: ReadinessSynchronizer::new(&config),
            permits: Arc::new(Semaphore::new(config.max_concurrent_exports)),
            sessions: SessionManager::new(factory),
            config: Arc::new(config),
        }
    }

    /// The configuration this exporter was built with.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Snapshot of the session counters.
    pub fn session_stats(&self) -> SessionStats {
        self.sessions.stats()
    }

    /// The URL the browser is pointed at for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Configuration`] if no front-end is configured.
    pub fn target_url(&self, request: &ExportRequest) -> Result<String> {
        build_target_url(
            self.config.frontend_url.as_deref(),
            request.attempt_id(),
            request.lang(),
            self.config.report_route,
        )
    }

    /// Run the pipeline synchronously with a fresh request deadline.
    ///
    /// Blocks the calling thread; use [`export_async`](Self::export_async)
    /// from async code.
    pub fn export(&self, request: &ExportRequest) -> Result<ExportResponse> {
        self.export_until(request, Instant::now() + self.config.request_timeout)
    }

    /// Run the pipeline synchronously against an explicit deadline.
    ///
    /// # Errors
    ///
    /// Any [`ExportError`] except `Validation` and `Release`: validation
    /// happened when `request` was built, and release failures are only logged.
    pub fn export_until(&self, request: &ExportRequest, deadline: Instant) -> Result<ExportResponse> {
        let start = Instant::now();
        let url = self.target_url(request)?;

        log::info!(
            "Exporting report {} ({}) from {}",
            request.attempt_id(),
            request.lang(),
            truncate_url(&url, 100)
        );

        let artifact = self.sessions.with_session(|session| {
            log::debug!("Session {} rendering {}", session.id(), request.attempt_id());
            self.synchronizer.run(session.page(), &url, deadline)?;
            capture_pdf(session.page(), deadline)
        })?;

        let filename = report_filename(
            &self.config.filename_prefix,
            request.attempt_id(),
            request.lang(),
        );

        log::info!(
            "✅ Report {} exported as {} ({} bytes) in {:?}",
            request.attempt_id(),
            filename,
            artifact.len(),
            start.elapsed()
        );

        Ok(ExportResponse {
            data: artifact.into_bytes(),
            filename,
        })
    }

    /// Run the pipeline on the blocking thread pool.
    ///
    /// Waits for a concurrency permit, then runs [`export_until`](Self::export_until)
    /// in `spawn_blocking`. The permit moves into the blocking task, so the
    /// number of live browser processes never exceeds `max_concurrent_exports`.
    ///
    /// If the overall limit elapses while the pipeline is still running, this
    /// keeps awaiting the blocking task so that its session has been torn
    /// down before [`ExportError::Timeout`] is returned.
    ///
    /// # Errors
    ///
    /// - [`ExportError::Timeout`] if the overall deadline (plus
    ///   [`TIMEOUT_GRACE`]) elapses, including time spent queued
    /// - [`ExportError::Internal`] if the blocking task panicked
    /// - any pipeline error from [`export_until`](Self::export_until)
    pub async fn export_async(self: Arc<Self>, request: ExportRequest) -> Result<ExportResponse> {
        let started = tokio::time::Instant::now();
        let deadline = Instant::now() + self.config.request_timeout;
        let limit = self.config.request_timeout + TIMEOUT_GRACE;
        let attempt_id = request.attempt_id().to_string();

        let permit = match tokio::time::timeout(limit, Arc::clone(&self.permits).acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => {
                return Err(ExportError::Internal(format!("export limiter closed: {}", e)));
            }
            Err(_) => {
                log::error!("❌ Export of {} never got a slot within {:?}", attempt_id, limit);
                return Err(ExportError::Timeout(format!(
                    "no export slot freed within {:?}",
                    limit
                )));
            }
        };

        let exporter = Arc::clone(&self);
        let mut task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            exporter.export_until(&request, deadline)
        });

        let remaining = limit.saturating_sub(started.elapsed());
        let joined = match tokio::time::timeout(remaining, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                log::error!(
                    "❌ Export of {} timed out after {:?}, waiting for session teardown",
                    attempt_id,
                    limit
                );
                if let Err(e) = task.await {
                    log::error!("❌ Timed-out export task failed: {}", e);
                }
                return Err(ExportError::Timeout(format!(
                    "export did not finish within {:?}",
                    limit
                )));
            }
        };

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                log::error!("❌ Export task panicked");
                Err(ExportError::Internal("export task panicked".to_string()))
            }
            Err(e) => Err(ExportError::Internal(format!("export task failed: {}", e))),
        }
    }
}

/// Build a Chrome-backed exporter from environment configuration.
///
/// # Errors
///
/// Returns [`ExportError::Configuration`] if the environment holds invalid
/// values. A missing `FRONTEND_URL` is reported per request instead.
#[cfg(feature = "env-config")]
pub fn init_exporter() -> Result<Arc<ReportExporter>> {
    let config = crate::config::env::from_env()?;
    let factory = Arc::new(crate::session::ChromeSessionFactory::from_config(&config));
    Ok(Arc::new(ReportExporter::new(config, factory)))
}

impl std::fmt::Debug for ReportExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportExporter")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportConfigBuilder;
    use crate::session::mock::{MOCK_PDF, MockSessionFactory};

    fn exporter(factory: MockSessionFactory) -> ReportExporter {
        let config = ExportConfigBuilder::new()
            .frontend_url("http://localhost:3000")
            .settle_delay(Duration::from_millis(1))
            .build()
            .unwrap();
        ReportExporter::new(config, Arc::new(factory))
    }

    #[test]
    fn test_export_success() {
        let exporter = exporter(MockSessionFactory::new());
        let request = ExportRequest::new("abc123", None, false).unwrap();

        let response = exporter.export(&request).unwrap();

        assert_eq!(response.data, MOCK_PDF);
        assert_eq!(response.filename, "report-abc123-en.pdf");
        assert!(exporter.session_stats().is_idle());
    }

    #[test]
    fn test_missing_frontend_fails_before_launch() {
        let factory = MockSessionFactory::new();
        let launches = factory.launch_counter();
        let exporter = ReportExporter::new(ExportConfig::default(), Arc::new(factory));
        let request = ExportRequest::new("abc123", None, false).unwrap();

        let result = exporter.export(&request);

        assert!(matches!(result, Err(ExportError::Configuration(_))));
        assert_eq!(launches.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_target_url_uses_config_route() {
        let exporter = exporter(MockSessionFactory::new());
        let request = ExportRequest::new("xyz", Some("ar"), false).unwrap();

        assert_eq!(
            exporter.target_url(&request).unwrap(),
            "http://localhost:3000/print-report?attemptId=xyz&lang=ar&puppeteer=1"
        );
    }

    #[tokio::test]
    async fn test_export_async_maps_panic_to_internal() {
        let exporter = Arc::new(exporter(MockSessionFactory::panicking_capture()));
        let request = ExportRequest::new("abc123", None, false).unwrap();

        let result = Arc::clone(&exporter).export_async(request).await;

        assert_eq!(
            result.unwrap_err(),
            ExportError::Internal("export task panicked".to_string())
        );
        let stats = exporter.session_stats();
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.released, 1);
    }
}
