//! Convenient imports for common usage.
//!
//! ```rust,ignore
//! use report2pdf_api::prelude::*;
//! ```

pub use crate::config::{ExportConfig, ExportConfigBuilder, ReportRoute};
pub use crate::error::{ExportError, Result};
pub use crate::service::{ExportRequest, ExportResponse, ReportExporter};
pub use crate::session::{ChromeSessionFactory, SessionFactory, SessionManager};
pub use crate::stats::SessionStats;
pub use crate::target::ReportLang;

#[cfg(feature = "env-config")]
pub use crate::config::env::from_env;

#[cfg(feature = "env-config")]
pub use crate::service::init_exporter;

pub use std::sync::Arc;
