//! Headless Chrome session backend.
//!
//! This module provides [`ChromeSessionFactory`], which launches one headless
//! Chrome process per session with launch options tuned for deterministic
//! report rendering.
//!
//! # Overview
//!
//! The factory handles:
//! - Chrome binary path detection (or custom path)
//! - Launch options configuration (viewport, font and color stability)
//! - Bounding launch + attach by the configured launch timeout
//!
//! # Example
//!
//! ```rust,ignore
//! use report2pdf_api::session::ChromeSessionFactory;
//!
//! let factory = ChromeSessionFactory::from_config(&config);
//! let session = factory.acquire()?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;

use super::{BrowserSession, ReportPage, SessionFactory};
use crate::config::ExportConfig;
use crate::error::{BrowserError, ExportError, Result};

/// Factory for headless Chrome sessions.
///
/// # Thread Safety
///
/// This factory is `Send + Sync`. Each [`acquire`](SessionFactory::acquire)
/// launches an independent process; nothing is shared between sessions.
#[derive(Debug)]
pub struct ChromeSessionFactory {
    chrome_path: Option<String>,
    viewport: (u32, u32),
    launch_timeout: Duration,
    idle_timeout: Duration,
    next_id: AtomicU64,
}

impl ChromeSessionFactory {
    /// Create a factory from the export configuration.
    ///
    /// The browser's idle timeout is set to the request deadline so that
    /// long readiness waits never trip the DevTools connection watchdog.
    pub fn from_config(config: &ExportConfig) -> Self {
        match &config.chrome_path {
            Some(path) => log::debug!("Creating ChromeSessionFactory with custom path: {}", path),
            None => log::debug!("Creating ChromeSessionFactory with auto-detect"),
        }

        Self {
            chrome_path: config.chrome_path.clone(),
            viewport: (config.viewport_width, config.viewport_height),
            launch_timeout: config.launch_timeout,
            idle_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
        }
    }
}

impl SessionFactory for ChromeSessionFactory {
    /// Launch Chrome and open one tab.
    ///
    /// Launch runs on a dedicated thread so the wait can be bounded. If the
    /// browser attaches after the deadline, the launch thread drops it, which
    /// kills the process.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Launch`] if the options are invalid, Chrome fails
    /// to start, the first tab cannot be opened, or the launch timeout elapses.
    fn acquire(&self) -> Result<Box<dyn BrowserSession>> {
        let options = create_chrome_options(
            self.chrome_path.as_deref(),
            self.viewport,
            self.idle_timeout,
        )?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        log::debug!("Launching Chrome for session {}...", id);

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name(format!("chrome-launch-{}", id))
            .spawn(move || {
                let launched = Browser::new(options)
                    .map_err(|e| e.to_string())
                    .and_then(|browser| {
                        let tab = browser.new_tab().map_err(|e| e.to_string())?;
                        Ok((browser, tab))
                    });

                if tx.send(launched).is_err() {
                    log::warn!("⚠️ Chrome for session {} attached after launch timeout, discarding", id);
                }
            })
            .map_err(|e| ExportError::Launch(format!("failed to spawn launch thread: {}", e)))?;

        match rx.recv_timeout(self.launch_timeout) {
            Ok(Ok((browser, tab))) => Ok(Box::new(ChromeSession {
                id,
                tab,
                browser: Some(browser),
            })),
            Ok(Err(e)) => {
                log::error!("❌ Chrome launch failed: {}", e);
                Err(ExportError::Launch(e))
            }
            Err(RecvTimeoutError::Timeout) => Err(ExportError::Launch(format!(
                "browser did not start within {:?}",
                self.launch_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(ExportError::Launch(
                "launch thread exited without a result".to_string(),
            )),
        }
    }
}

/// One headless Chrome process plus the tab opened in it.
pub struct ChromeSession {
    id: u64,
    tab: Arc<Tab>,
    /// Dropping the browser terminates the process.
    browser: Option<Browser>,
}

fn protocol(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

/// Resolved value marking an awaited expression that outlived its budget.
const EVALUATE_TIMEOUT_SENTINEL: &str = "__report2pdf_evaluate_timeout__";

/// Race `expression` against a page-side timer so an awaited promise that
/// never settles still returns within `timeout`.
fn race_expression(expression: &str, timeout: Duration) -> String {
    let sentinel = Value::String(EVALUATE_TIMEOUT_SENTINEL.to_string());
    format!(
        "Promise.race([Promise.resolve(({})), new Promise(resolve => setTimeout(() => resolve({}), {}))])",
        expression,
        sentinel,
        timeout.as_millis()
    )
}

impl ChromeSession {
    /// Run one DevTools call against the tab, waiting at most `timeout`.
    ///
    /// `headless_chrome` bounds protocol calls only by the browser idle
    /// timeout, so each call runs on a helper thread. A call still pending
    /// when `timeout` elapses is abandoned; it fails on its own once the
    /// session closes and the process is killed.
    fn bounded<T, F>(
        &self,
        operation: &str,
        timeout: Duration,
        call: F,
    ) -> std::result::Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> std::result::Result<T, BrowserError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name(format!("chrome-{}-{}", operation, self.id))
            .spawn(move || {
                // Receiver is gone when the caller already timed out.
                let _ = tx.send(call(&tab));
            })
            .map_err(|e| {
                BrowserError::Protocol(format!("failed to spawn {} thread: {}", operation, e))
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "⚠️ Session {}: {} did not finish within {:?}",
                    self.id,
                    operation,
                    timeout
                );
                Err(BrowserError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(BrowserError::Protocol(format!(
                "{} thread exited without a result",
                operation
            ))),
        }
    }
}

impl ReportPage for ChromeSession {
    fn navigate(&self, url: &str, timeout: Duration) -> std::result::Result<(), BrowserError> {
        let url = url.to_string();
        self.bounded("navigate", timeout, move |tab| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)
                .map_err(protocol)?
                .wait_until_navigated()
                .map_err(protocol)?;
            Ok(())
        })
    }

    fn evaluate(
        &self,
        expression: &str,
        await_promise: bool,
        timeout: Duration,
    ) -> std::result::Result<Option<Value>, BrowserError> {
        let expression = if await_promise {
            race_expression(expression, timeout)
        } else {
            expression.to_string()
        };

        let value = self.bounded("evaluate", timeout, move |tab| {
            let remote = tab.evaluate(&expression, await_promise).map_err(protocol)?;
            Ok(remote.value)
        })?;

        match value {
            Some(Value::String(s)) if s == EVALUATE_TIMEOUT_SENTINEL => {
                Err(BrowserError::Timeout(timeout))
            }
            other => Ok(other),
        }
    }

    fn print_to_pdf(
        &self,
        options: PrintToPdfOptions,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, BrowserError> {
        self.bounded("print", timeout, move |tab| {
            tab.print_to_pdf(Some(options)).map_err(protocol)
        })
    }
}

impl BrowserSession for ChromeSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn page(&self) -> &dyn ReportPage {
        self
    }

    fn close(&mut self) -> std::result::Result<(), BrowserError> {
        let tab_result = self.tab.close(true).map(|_| ()).map_err(protocol);
        if let Err(e) = &tab_result {
            log::warn!("Failed to close tab for session {}: {}", self.id, e);
        }

        // Process is killed on drop even if the tab refused to close.
        self.browser.take();
        tab_result
    }
}

/// Create Chrome launch options for report rendering.
///
/// # Chrome Flags Applied
///
/// ## Sandbox and Containers
/// - `--no-sandbox`, `--disable-setuid-sandbox`
/// - `--disable-dev-shm-usage` - Use /tmp instead of /dev/shm
///
/// ## Deterministic Rendering
/// - `--disable-gpu`
/// - `--font-render-hinting=none` - Stable glyph metrics across hosts
/// - `--force-color-profile=srgb`
/// - `--hide-scrollbars`
///
/// ## Disabled Features
/// - `--disable-extensions`
/// - `--disable-sync`
/// - `--disable-default-apps`
/// - `--disable-crash-reporter`
///
/// ## Stability
/// - `--disable-background-timer-throttling`
/// - `--disable-backgrounding-occluded-windows`
/// - `--disable-renderer-backgrounding`
/// - `--disable-hang-monitor`
/// - `--disable-ipc-flooding-protection`
///
/// # Errors
///
/// Returns [`ExportError::Launch`] if the options builder rejects the values.
pub fn create_chrome_options(
    chrome_path: Option<&str>,
    viewport: (u32, u32),
    idle_timeout: Duration,
) -> Result<LaunchOptions<'static>> {
    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = chrome_path {
        builder.path(Some(path.into()));
        log::trace!("Chrome path set to: {}", path);
    } else {
        log::trace!("Chrome path: auto-detect");
    }

    builder
        .headless(true)
        .sandbox(false)
        .window_size(Some(viewport))
        .idle_browser_timeout(idle_timeout)
        .args(vec![
            // ===== Sandbox and Containers =====
            "--no-sandbox".as_ref(),
            "--disable-setuid-sandbox".as_ref(),
            "--disable-dev-shm-usage".as_ref(),
            // ===== Deterministic Rendering =====
            "--disable-gpu".as_ref(),
            "--font-render-hinting=none".as_ref(),
            "--force-color-profile=srgb".as_ref(),
            "--hide-scrollbars".as_ref(),
            // ===== Disable Unnecessary Features =====
            "--disable-extensions".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-default-apps".as_ref(),
            "--disable-crash-reporter".as_ref(),
            // ===== Stability =====
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            "--disable-hang-monitor".as_ref(),
            "--disable-ipc-flooding-protection".as_ref(),
        ])
        .build()
        .map_err(|e| {
            let path_msg = chrome_path.unwrap_or("auto-detect");
            log::error!(
                "❌ Failed to build Chrome launch options (path: {}): {}",
                path_msg,
                e
            );
            ExportError::Launch(format!("invalid launch options: {}", e))
        })
}

// ============================================================================
// Unit Tests
// ============================================================================
