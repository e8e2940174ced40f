//! Session statistics for monitoring and health checks.
//!
//! This module provides [`SessionStats`], a snapshot of the session manager's
//! lifetime counters. The health endpoint reports [`SessionStats::active`] so
//! an operator can spot leaked browser processes.
//!
//! # Example
//!
//! ```rust,ignore
//! let stats = exporter.session_stats();
//! println!("Active: {}, released: {}", stats.active, stats.released);
//! ```

/// Snapshot of session counters at a point in time.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `acquired` | Sessions successfully launched |
/// | `released` | Sessions torn down (cleanly or not) |
/// | `launch_failures` | Launch attempts that failed |
/// | `release_failures` | Teardowns that reported an error |
/// | `active` | Sessions currently alive |
///
/// # Example
///
/// ```rust
/// use report2pdf_api::SessionStats;
///
/// let stats = SessionStats {
///     acquired: 10,
///     released: 9,
///     launch_failures: 1,
///     release_failures: 0,
///     active: 1,
/// };
///
/// assert!(!stats.is_idle());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of sessions successfully launched since startup.
    pub acquired: usize,

    /// Number of sessions released since startup.
    ///
    /// A release that reported an error still counts here: the session is
    /// gone either way.
    pub released: usize,

    /// Number of launch attempts that failed.
    pub launch_failures: usize,

    /// Number of releases that reported an error.
    pub release_failures: usize,

    /// Number of sessions currently alive.
    ///
    /// Equals `acquired - released` once every in-flight export finishes.
    pub active: usize,
}

impl SessionStats {
    /// Returns `true` when no browser session is alive.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.active == 0
    }

    /// Returns `true` when every acquired session has been released.
    ///
    /// # Example
    ///
    /// ```rust
    /// use report2pdf_api::SessionStats;
    ///
    /// let stats = SessionStats { acquired: 3, released: 3, ..Default::default() };
    /// assert!(stats.is_balanced());
    /// ```
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.acquired == self.released
    }
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SessionStats {{ acquired: {}, released: {}, active: {}, launch_failures: {}, release_failures: {} }}",
            self.acquired, self.released, self.active, self.launch_failures, self.release_failures
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
