//! Browser session management.
//!
//! A session is one exclusively-owned browser process plus one page, scoped
//! to a single export request. This module defines the capability traits the
//! pipeline drives, and [`SessionManager`], which guarantees that every
//! session it hands out is released exactly once.
//!
//! # Architecture
//!
//! ```text
//! SessionManager::with_session(f)
//!   │
//!   ├── factory.acquire()  ──▶ Box<dyn BrowserSession>   (LaunchError on failure)
//!   │
//!   ├── SessionGuard ─────────┐
//!   │     f(&session)         │ Drop releases if f panics
//!   │                         │
//!   └── guard.release() ◀─────┘ explicit on normal return
//!         └── close() error → logged + counted, never propagated
//! ```
//!
//! There is no pooling. Each call launches a fresh process and tears it down
//! before returning, so no two requests ever observe the same page.
//!
//! # Implementations
//!
//! | Factory | Backend | Availability |
//! |---------|---------|--------------|
//! | [`ChromeSessionFactory`](chrome::ChromeSessionFactory) | headless Chrome | always |
//! | [`MockSessionFactory`](mock::MockSessionFactory) | scripted fake | `test-utils` feature or tests |

pub mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use headless_chrome::types::PrintToPdfOptions;
use serde_json::Value;

use crate::error::{BrowserError, ExportError, Result};
use crate::stats::SessionStats;

pub use chrome::{ChromeSessionFactory, create_chrome_options};

/// The page-level capability the pipeline needs from a browser engine.
///
/// Every method is bounded by an explicit timeout. Implementations report raw
/// [`BrowserError`]s; the pipeline stages decide which [`ExportError`] each
/// one becomes.
pub trait ReportPage {
    /// Navigate to `url` and wait for the load event.
    fn navigate(&self, url: &str, timeout: Duration) -> std::result::Result<(), BrowserError>;

    /// Evaluate a JavaScript expression in the page.
    ///
    /// With `await_promise`, a returned promise is awaited and its resolved
    /// value is returned.
    fn evaluate(
        &self,
        expression: &str,
        await_promise: bool,
        timeout: Duration,
    ) -> std::result::Result<Option<Value>, BrowserError>;

    /// Render the current page to PDF bytes.
    fn print_to_pdf(
        &self,
        options: PrintToPdfOptions,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, BrowserError>;

    /// Poll `predicate` until it evaluates to `true`.
    ///
    /// The default implementation evaluates the predicate every
    /// `poll_interval`. Evaluation errors count as "not yet" since the page
    /// may be mid-navigation or still booting its scripts.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Timeout`] if the predicate never held.
    fn wait_for_condition(
        &self,
        predicate: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> std::result::Result<(), BrowserError> {
        let start = Instant::now();

        loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            let satisfied = match self.evaluate(predicate, false, remaining.max(poll_interval)) {
                Ok(value) => value.and_then(|v| v.as_bool()).unwrap_or(false),
                Err(e) => {
                    log::trace!("Condition check failed (retrying): {}", e);
                    false
                }
            };

            if satisfied {
                log::trace!("Condition satisfied after {:?}", start.elapsed());
                return Ok(());
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(BrowserError::Timeout(timeout));
            }
            std::thread::sleep(poll_interval.min(remaining));
        }
    }
}

/// One browser process plus one page.
pub trait BrowserSession: Send {
    /// Identifier used in log lines.
    fn id(&self) -> u64;

    /// The page this session owns.
    fn page(&self) -> &dyn ReportPage;

    /// Close the page and terminate the process.
    ///
    /// Called exactly once by [`SessionManager`].
    fn close(&mut self) -> std::result::Result<(), BrowserError>;
}

/// Creates browser sessions.
///
/// # Thread Safety
///
/// Factories are shared across request tasks behind an `Arc`, so they must
/// be `Send + Sync`.
pub trait SessionFactory: Send + Sync {
    /// Launch a fresh browser process and open one page in it.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Launch`] if the process cannot start or the
    /// automation protocol cannot attach in time.
    fn acquire(&self) -> Result<Box<dyn BrowserSession>>;
}

#[derive(Debug, Default)]
struct SessionCounters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    launch_failures: AtomicUsize,
    release_failures: AtomicUsize,
    active: AtomicUsize,
}

/// Scoped acquisition of browser sessions.
///
/// Cheap to clone; clones share the factory and the counters.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use report2pdf_api::session::{ChromeSessionFactory, SessionManager};
///
/// let manager = SessionManager::new(Arc::new(ChromeSessionFactory::from_config(&config)));
///
/// let bytes = manager.with_session(|session| {
///     session.page().navigate("https://example.com", timeout)?;
///     // ...
/// })?;
///
/// assert!(manager.stats().is_idle());
/// ```
#[derive(Clone)]
pub struct SessionManager {
    factory: Arc<dyn SessionFactory>,
    counters: Arc<SessionCounters>,
}

impl SessionManager {
    /// Create a manager backed by `factory`.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            counters: Arc::new(SessionCounters::default()),
        }
    }

    /// Acquire a session wrapped in a guard that releases it on drop.
    ///
    /// Prefer [`with_session`](Self::with_session), which also logs release
    /// failures on the normal path.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Launch`] if the factory cannot launch a browser.
    pub fn acquire(&self) -> Result<SessionGuard> {
        let start = Instant::now();

        match self.factory.acquire() {
            Ok(session) => {
                self.counters.acquired.fetch_add(1, Ordering::SeqCst);
                self.counters.active.fetch_add(1, Ordering::SeqCst);
                log::debug!(
                    "✅ Session {} acquired in {:?}",
                    session.id(),
                    start.elapsed()
                );
                Ok(SessionGuard {
                    session,
                    counters: Arc::clone(&self.counters),
                    released: false,
                })
            }
            Err(e) => {
                self.counters.launch_failures.fetch_add(1, Ordering::SeqCst);
                log::error!("❌ Failed to acquire browser session: {}", e);
                Err(e)
            }
        }
    }

    /// Run `f` with a freshly launched session, then release it.
    ///
    /// The session is released on every exit path: success, an error
    /// returned by `f`, or a panic unwinding out of `f`. A release failure is
    /// logged and counted but never replaces `f`'s result.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Launch`] if no session could be acquired,
    /// otherwise whatever `f` returns.
    pub fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn BrowserSession) -> Result<T>,
    {
        let guard = self.acquire()?;
        let result = f(guard.session());

        if let Err(e) = guard.release() {
            log::warn!("⚠️ {} (continuing with primary result)", e);
        }

        result
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
            launch_failures: self.counters.launch_failures.load(Ordering::SeqCst),
            release_failures: self.counters.release_failures.load(Ordering::SeqCst),
            active: self.counters.active.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("stats", &self.stats())
            .finish()
    }
}

/// RAII guard around an acquired session.
///
/// Releases the session when dropped unless [`release`](Self::release) was
/// already called. `Send` but not `Sync`: one request owns it exclusively.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
    counters: Arc<SessionCounters>,
    released: bool,
}

impl SessionGuard {
    /// The guarded session.
    pub fn session(&self) -> &dyn BrowserSession {
        self.session.as_ref()
    }

    /// Session identifier.
    pub fn id(&self) -> u64 {
        self.session.id()
    }

    /// Release the session now.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Release`] if teardown reported a failure. The
    /// session is considered released either way.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let id = self.session.id();
        let outcome = self.session.close();

        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.counters.active.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(()) => {
                log::debug!("Session {} released", id);
                Ok(())
            }
            Err(e) => {
                self.counters.release_failures.fetch_add(1, Ordering::SeqCst);
                Err(ExportError::Release(format!("session {}: {}", id, e)))
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if std::thread::panicking() {
            log::warn!(
                "⚠️ Releasing session {} during panic unwinding",
                self.session.id()
            );
        }

        if let Err(e) = self.release_inner() {
            log::warn!("⚠️ {}", e);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
