//! Staged readiness barrier.
//!
//! Export must not start until the rendered report is provably complete.
//! [`ReadinessSynchronizer`] drives a page through four strictly ordered
//! stages, each with its own timeout clamped to the request deadline:
//!
//! ```text
//! NotStarted ──navigate──▶ Navigated ──marker──▶ AppReady ──fonts──▶ FontsReady ──frames+delay──▶ Settled ──▶ Done
//!      │                       │                     │                    │
//!      ▼                       ▼                     ▼                    ▼
//!  NavigationError      ReadinessTimeoutError   warn + continue      warn + continue
//! ```
//!
//! | Stage | Required | Failure |
//! |-------|----------|---------|
//! | Navigation | yes | [`ExportError::Navigation`] |
//! | Application ready | yes | [`ExportError::ReadinessTimeout`] |
//! | Font shaping | best effort | logged |
//! | Layout settle | best effort | logged |
//!
//! Navigation waits for the load event only. Reports that keep polling
//! analytics endpoints never reach network idle, so that heuristic is not
//! used; the application marker is the single source of truth.

use std::time::{Duration, Instant};

use crate::config::ExportConfig;
use crate::error::{BrowserError, ExportError, Result};
use crate::session::ReportPage;
use crate::target::truncate_url;

/// Resolves once the page's font faces have loaded. Evaluates to `true`
/// immediately where the Font Loading API is unavailable.
pub const FONTS_READY_SCRIPT: &str =
    "document.fonts && document.fonts.ready ? document.fonts.ready.then(() => true) : true";

/// Resolves on the next animation frame.
pub const ANIMATION_FRAME_SCRIPT: &str =
    "new Promise(resolve => requestAnimationFrame(() => resolve(true)))";

/// Position in the readiness state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadinessStage {
    /// Nothing has happened yet.
    NotStarted,
    /// The load event fired.
    Navigated,
    /// The front-end set its readiness marker.
    AppReady,
    /// Font loading settled, or was skipped.
    FontsReady,
    /// Animation frames and the grace delay elapsed.
    Settled,
    /// The page may be captured.
    Done,
}

impl ReadinessStage {
    /// The stage that follows this one. `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::Navigated,
            Self::Navigated => Self::AppReady,
            Self::AppReady => Self::FontsReady,
            Self::FontsReady => Self::Settled,
            Self::Settled | Self::Done => Self::Done,
        }
    }
}

/// Flags recording which stages have passed.
///
/// Transitions only move forward: a flag is set once and never re-checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessState {
    /// Navigation stage passed.
    pub navigated: bool,
    /// Application-ready stage passed.
    pub app_ready: bool,
    /// Font-shaping stage passed.
    pub fonts_ready: bool,
    /// Layout-settle stage passed.
    pub layout_settled: bool,
}

impl ReadinessState {
    /// The furthest stage reached.
    ///
    /// Nothing follows the settle stage, so a settled page reports `Done`.
    pub fn stage(&self) -> ReadinessStage {
        match (
            self.navigated,
            self.app_ready,
            self.fonts_ready,
            self.layout_settled,
        ) {
            (true, true, true, true) => ReadinessStage::Done,
            (true, true, true, false) => ReadinessStage::FontsReady,
            (true, true, false, _) => ReadinessStage::AppReady,
            (true, false, _, _) => ReadinessStage::Navigated,
            _ => ReadinessStage::NotStarted,
        }
    }

    /// Returns `true` once every stage has passed.
    pub fn is_complete(&self) -> bool {
        self.stage() == ReadinessStage::Done
    }

    /// Mark `stage` as passed.
    ///
    /// Only the immediate successor of the current stage is accepted, which
    /// keeps the stages strictly ordered. Nothing is accepted once `Done`.
    fn advance(&mut self, stage: ReadinessStage) -> Result<()> {
        let current = self.stage();
        if current == ReadinessStage::Done || stage != current.next() {
            return Err(ExportError::Internal(format!(
                "readiness stage {:?} attempted from {:?}",
                stage, current
            )));
        }

        match stage {
            ReadinessStage::Navigated => self.navigated = true,
            ReadinessStage::AppReady => self.app_ready = true,
            ReadinessStage::FontsReady => self.fonts_ready = true,
            ReadinessStage::Settled => self.layout_settled = true,
            ReadinessStage::NotStarted | ReadinessStage::Done => {}
        }
        Ok(())
    }
}

/// Drives a page through the readiness stages.
#[derive(Debug, Clone)]
pub struct ReadinessSynchronizer {
    ready_predicate: String,
    navigation_timeout: Duration,
    ready_timeout: Duration,
    fonts_timeout: Duration,
    settle_frames: u32,
    settle_delay: Duration,
    poll_interval: Duration,
}

impl ReadinessSynchronizer {
    /// Build a synchronizer from the export configuration.
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            ready_predicate: ready_predicate(&config.ready_selector),
            navigation_timeout: config.navigation_timeout,
            ready_timeout: config.ready_timeout,
            fonts_timeout: config.fonts_timeout,
            settle_frames: config.settle_frames,
            settle_delay: config.settle_delay,
            poll_interval: config.poll_interval,
        }
    }

    /// The JavaScript predicate polled during the application-ready stage.
    pub fn ready_predicate(&self) -> &str {
        &self.ready_predicate
    }

    /// Run every stage in order against `page`.
    ///
    /// Each stage's timeout is the smaller of its configured timeout and the
    /// time left until `deadline`.
    ///
    /// # Errors
    ///
    /// - [`ExportError::Navigation`] if the page does not load
    /// - [`ExportError::ReadinessTimeout`] if the marker never appears, or
    ///   the deadline is exhausted before a required stage can start
    pub fn run(&self, page: &dyn ReportPage, url: &str, deadline: Instant) -> Result<ReadinessState> {
        let mut state = ReadinessState::default();
        let start = Instant::now();

        // Stage 1: navigation
        let timeout = stage_budget(self.navigation_timeout, deadline).ok_or_else(|| {
            ExportError::Navigation("request deadline exhausted before navigation".to_string())
        })?;
        log::debug!("Navigating to {} (timeout {:?})", truncate_url(url, 100), timeout);
        page.navigate(url, timeout).map_err(|e| {
            log::error!("❌ Navigation failed: {}", e);
            ExportError::Navigation(format!("{}: {}", truncate_url(url, 100), e))
        })?;
        state.advance(ReadinessStage::Navigated)?;
        log::debug!("Stage Navigated after {:?}", start.elapsed());

        // Stage 2: application readiness marker
        let timeout = stage_budget(self.ready_timeout, deadline).ok_or_else(|| {
            ExportError::ReadinessTimeout(
                "request deadline exhausted before readiness check".to_string(),
            )
        })?;
        page.wait_for_condition(&self.ready_predicate, timeout, self.poll_interval)
            .map_err(|e| {
                log::error!("❌ Readiness marker not observed: {}", e);
                match e {
                    BrowserError::Timeout(waited) => ExportError::ReadinessTimeout(format!(
                        "{} not set within {:?}",
                        self.ready_predicate, waited
                    )),
                    BrowserError::Protocol(message) => ExportError::ReadinessTimeout(message),
                }
            })?;
        state.advance(ReadinessStage::AppReady)?;
        log::debug!("Stage AppReady after {:?}", start.elapsed());

        // Stage 3: font shaping (best effort)
        match stage_budget(self.fonts_timeout, deadline) {
            Some(timeout) => match page.evaluate(FONTS_READY_SCRIPT, true, timeout) {
                Ok(_) => log::trace!("Fonts settled"),
                Err(e) => log::warn!("⚠️ Font readiness unavailable, continuing: {}", e),
            },
            None => log::warn!("⚠️ No time left for font readiness, continuing"),
        }
        state.advance(ReadinessStage::FontsReady)?;
        log::debug!("Stage FontsReady after {:?}", start.elapsed());

        // Stage 4: layout settle (best effort)
        self.settle(page, deadline);
        state.advance(ReadinessStage::Settled)?;
        log::debug!("✅ Page ready for capture after {:?}", start.elapsed());

        Ok(state)
    }

    fn settle(&self, page: &dyn ReportPage, deadline: Instant) {
        for frame in 0..self.settle_frames {
            let Some(timeout) = stage_budget(self.poll_interval.max(Duration::from_secs(1)), deadline)
            else {
                log::warn!("⚠️ Deadline reached while waiting for animation frames");
                return;
            };
            if let Err(e) = page.evaluate(ANIMATION_FRAME_SCRIPT, true, timeout) {
                log::warn!("⚠️ Animation frame {} not observed, continuing: {}", frame + 1, e);
                break;
            }
        }

        let delay = self
            .settle_delay
            .min(deadline.saturating_duration_since(Instant::now()));
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Build the readiness predicate for a CSS selector.
///
/// The selector is JSON-quoted so quotes inside it cannot break the script.
pub fn ready_predicate(selector: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    format!("document.querySelector({}) !== null", quoted)
}

fn stage_budget(stage_timeout: Duration, deadline: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        None
    } else {
        Some(stage_timeout.min(remaining))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
