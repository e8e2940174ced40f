//! Mock session factory for testing.
//!
//! This module provides a scripted implementation of [`SessionFactory`] that
//! never launches a browser. It records every capability call so tests can
//! assert stage ordering, and it shares its counters through `Arc`s so they
//! stay observable after the factory is moved into an exporter.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use report2pdf_api::session::mock::MockSessionFactory;
//!
//! // Front-end never sets its readiness marker
//! let factory = MockSessionFactory::never_ready();
//! let launches = factory.launch_counter();
//!
//! // Browser prints an HTML error page instead of a PDF
//! let factory = MockSessionFactory::returning_bytes(b"<html>oops</html>".to_vec());
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use headless_chrome::types::PrintToPdfOptions;
use serde_json::Value;

use super::{BrowserSession, ReportPage, SessionFactory};
use crate::error::{BrowserError, ExportError, Result};

/// Bytes returned by a successful mock capture.
pub const MOCK_PDF: &[u8] = b"%PDF-1.7\n%mock report\n%%EOF\n";

/// Scripted behavior shared by every session a [`MockSessionFactory`] creates.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Fail `acquire()` with this message.
    pub launch_error: Option<String>,
    /// Fail navigation with this message.
    pub navigation_error: Option<String>,
    /// Never report the readiness marker.
    pub never_ready: bool,
    /// Fail the font-loading evaluation with this message.
    pub fonts_error: Option<String>,
    /// Bytes returned from print-to-PDF.
    pub pdf_bytes: Vec<u8>,
    /// Fail print-to-PDF with this message.
    pub capture_error: Option<String>,
    /// Panic inside print-to-PDF.
    pub panic_on_capture: bool,
    /// Sleep inside print-to-PDF before returning, up to the call's timeout.
    pub capture_delay: Duration,
    /// Sleep the full `capture_delay` even past the call's timeout, like a
    /// backend that cannot enforce its budget.
    pub capture_ignores_timeout: bool,
    /// Fail `close()` with this message.
    pub release_error: Option<String>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            launch_error: None,
            navigation_error: None,
            never_ready: false,
            fonts_error: None,
            pdf_bytes: MOCK_PDF.to_vec(),
            capture_error: None,
            panic_on_capture: false,
            capture_delay: Duration::ZERO,
            capture_ignores_timeout: false,
            release_error: None,
        }
    }
}

/// Scripted session factory for tests.
///
/// # Counters
///
/// | Counter | Incremented when |
/// |---------|------------------|
/// | [`launch_counter`](Self::launch_counter) | `acquire()` is called (success or failure) |
/// | [`close_counter`](Self::close_counter) | a session's `close()` is called |
/// | [`peak_live`](Self::peak_live) | high-water mark of simultaneously open sessions |
///
/// # Call Log
///
/// Each session appends entries to a shared log:
/// `launch`, `navigate <url>`, `wait_ready <predicate>`, `fonts`, `frame`,
/// `print`, `close`.
pub struct MockSessionFactory {
    behavior: MockBehavior,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<String>>>,
    next_id: AtomicU64,
}

impl MockSessionFactory {
    /// Factory whose sessions succeed at every stage.
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::default())
    }

    /// Factory driven by an explicit behavior script.
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Factory whose launches always fail.
    pub fn failing_launch<S: Into<String>>(message: S) -> Self {
        Self::with_behavior(MockBehavior {
            launch_error: Some(message.into()),
            ..Default::default()
        })
    }

    /// Factory whose sessions fail to navigate.
    pub fn failing_navigation<S: Into<String>>(message: S) -> Self {
        Self::with_behavior(MockBehavior {
            navigation_error: Some(message.into()),
            ..Default::default()
        })
    }

    /// Factory whose pages never set the readiness marker.
    pub fn never_ready() -> Self {
        Self::with_behavior(MockBehavior {
            never_ready: true,
            ..Default::default()
        })
    }

    /// Factory whose capture returns `bytes` verbatim.
    pub fn returning_bytes(bytes: Vec<u8>) -> Self {
        Self::with_behavior(MockBehavior {
            pdf_bytes: bytes,
            ..Default::default()
        })
    }

    /// Factory whose capture call fails.
    pub fn failing_capture<S: Into<String>>(message: S) -> Self {
        Self::with_behavior(MockBehavior {
            capture_error: Some(message.into()),
            ..Default::default()
        })
    }

    /// Factory whose capture call panics.
    pub fn panicking_capture() -> Self {
        Self::with_behavior(MockBehavior {
            panic_on_capture: true,
            ..Default::default()
        })
    }

    /// Make the font-loading evaluation fail.
    pub fn with_fonts_error<S: Into<String>>(mut self, message: S) -> Self {
        self.behavior.fonts_error = Some(message.into());
        self
    }

    /// Make session teardown fail.
    pub fn with_release_error<S: Into<String>>(mut self, message: S) -> Self {
        self.behavior.release_error = Some(message.into());
        self
    }

    /// Hold each capture for `delay`. A capture whose timeout is shorter
    /// fails with [`BrowserError::Timeout`] once the timeout elapses.
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.behavior.capture_delay = delay;
        self
    }

    /// Hold each capture for `delay` regardless of its timeout.
    pub fn with_capture_stall(mut self, delay: Duration) -> Self {
        self.behavior.capture_delay = delay;
        self.behavior.capture_ignores_timeout = true;
        self
    }

    /// Number of `acquire()` calls so far.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Number of `close()` calls so far.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Shared launch counter, observable after the factory is moved.
    pub fn launch_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.launches)
    }

    /// Shared close counter, observable after the factory is moved.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    /// Shared high-water mark of simultaneously open sessions.
    pub fn peak_live(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.peak)
    }

    /// Shared call log.
    pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<String> {
        snapshot(&self.calls)
    }
}

impl Default for MockSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSessionFactory")
            .field("behavior", &self.behavior)
            .field("launches", &self.launch_count())
            .field("closes", &self.close_count())
            .finish()
    }
}

/// Read a shared call log, tolerating poisoning from a panicking session.
pub fn snapshot(calls: &Mutex<Vec<String>>) -> Vec<String> {
    calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn record(calls: &Mutex<Vec<String>>, entry: String) {
    calls.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
}

impl SessionFactory for MockSessionFactory {
    fn acquire(&self) -> Result<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        record(&self.calls, "launch".to_string());

        if let Some(message) = &self.behavior.launch_error {
            log::debug!("MockSessionFactory: Returning configured launch failure");
            return Err(ExportError::Launch(message.clone()));
        }

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockSession {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            behavior: self.behavior.clone(),
            closes: Arc::clone(&self.closes),
            live: Arc::clone(&self.live),
            calls: Arc::clone(&self.calls),
        }))
    }
}

/// A fake session produced by [`MockSessionFactory`].
pub struct MockSession {
    id: u64,
    behavior: MockBehavior,
    closes: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ReportPage for MockSession {
    fn navigate(&self, url: &str, _timeout: Duration) -> std::result::Result<(), BrowserError> {
        record(&self.calls, format!("navigate {}", url));
        match &self.behavior.navigation_error {
            Some(message) => Err(BrowserError::Protocol(message.clone())),
            None => Ok(()),
        }
    }

    fn evaluate(
        &self,
        expression: &str,
        _await_promise: bool,
        _timeout: Duration,
    ) -> std::result::Result<Option<Value>, BrowserError> {
        if expression.contains("document.fonts") {
            record(&self.calls, "fonts".to_string());
            return match &self.behavior.fonts_error {
                Some(message) => Err(BrowserError::Protocol(message.clone())),
                None => Ok(Some(Value::Bool(true))),
            };
        }

        if expression.contains("requestAnimationFrame") {
            record(&self.calls, "frame".to_string());
            return Ok(Some(Value::Bool(true)));
        }

        record(&self.calls, format!("evaluate {}", expression));
        Ok(Some(Value::Bool(!self.behavior.never_ready)))
    }

    fn wait_for_condition(
        &self,
        predicate: &str,
        timeout: Duration,
        _poll_interval: Duration,
    ) -> std::result::Result<(), BrowserError> {
        record(&self.calls, format!("wait_ready {}", predicate));
        if self.behavior.never_ready {
            Err(BrowserError::Timeout(timeout))
        } else {
            Ok(())
        }
    }

    fn print_to_pdf(
        &self,
        _options: PrintToPdfOptions,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, BrowserError> {
        record(&self.calls, "print".to_string());

        let delay = self.behavior.capture_delay;
        if !self.behavior.capture_ignores_timeout && delay > timeout {
            std::thread::sleep(timeout);
            return Err(BrowserError::Timeout(timeout));
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if self.behavior.panic_on_capture {
            panic!("mock capture panicked");
        }

        match &self.behavior.capture_error {
            Some(message) => Err(BrowserError::Protocol(message.clone())),
            None => Ok(self.behavior.pdf_bytes.clone()),
        }
    }
}

impl BrowserSession for MockSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn page(&self) -> &dyn ReportPage {
        self
    }

    fn close(&mut self) -> std::result::Result<(), BrowserError> {
        record(&self.calls, "close".to_string());
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);

        match &self.behavior.release_error {
            Some(message) => Err(BrowserError::Protocol(message.clone())),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_factory_counts_launches() {
        let factory = MockSessionFactory::failing_launch("no chrome");
        let counter = factory.launch_counter();

        assert!(factory.acquire().is_err());
        assert!(factory.acquire().is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(factory.close_count(), 0);
    }

    #[test]
    fn test_mock_session_records_calls() {
        let factory = MockSessionFactory::new();
        let mut session = factory.acquire().unwrap();

        session
            .page()
            .navigate("http://localhost/print-report", Duration::from_secs(1))
            .unwrap();
        let bytes = session
            .page()
            .print_to_pdf(Default::default(), Duration::from_secs(1))
            .unwrap();
        session.close().unwrap();

        assert_eq!(bytes, MOCK_PDF);
        assert_eq!(
            factory.calls(),
            vec!["launch", "navigate http://localhost/print-report", "print", "close"]
        );
        assert_eq!(factory.close_count(), 1);
    }

    #[test]
    fn test_mock_tracks_peak_live_sessions() {
        let factory = MockSessionFactory::new();
        let peak = factory.peak_live();

        let mut a = factory.acquire().unwrap();
        let mut b = factory.acquire().unwrap();
        a.close().unwrap();
        b.close().unwrap();
        let mut c = factory.acquire().unwrap();
        c.close().unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_mock_capture_honors_timeout() {
        let factory = MockSessionFactory::new().with_capture_delay(Duration::from_secs(5));
        let session = factory.acquire().unwrap();

        let timeout = Duration::from_millis(20);
        let result = session.page().print_to_pdf(Default::default(), timeout);

        assert_eq!(result, Err(BrowserError::Timeout(timeout)));
    }

    #[test]
    fn test_mock_never_ready_times_out() {
        let factory = MockSessionFactory::never_ready();
        let session = factory.acquire().unwrap();

        let timeout = Duration::from_secs(60);
        let result = session
            .page()
            .wait_for_condition("ready", timeout, Duration::from_millis(200));

        assert_eq!(result, Err(BrowserError::Timeout(timeout)));
    }
}
