//! PDF capture and output validation.
//!
//! Prints the ready page with a fixed configuration and checks the result
//! before anything reaches the caller. Pagination and spacing belong to the
//! report's own print stylesheet, so every margin is zero and the page's CSS
//! `@page` size wins over the A4 default.
//!
//! A buffer that does not start with `%PDF-` (usually an HTML error page the
//! browser printed instead) is discarded and reported as
//! [`ExportError::InvalidOutput`]. There is no retry here.

use std::time::Instant;

use headless_chrome::types::PrintToPdfOptions;

use crate::error::{BrowserError, ExportError, Result};
use crate::session::ReportPage;

/// PDF file signature.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// A4 width in inches.
pub const A4_WIDTH_IN: f64 = 8.27;

/// A4 height in inches.
pub const A4_HEIGHT_IN: f64 = 11.69;

/// Print options used for every capture.
///
/// - **Paper**: A4 portrait, overridden by CSS `@page` when present
/// - **Margins**: All set to 0
/// - **Header/Footer**: Disabled
/// - **Background**: Printed
pub fn build_print_options() -> PrintToPdfOptions {
    PrintToPdfOptions {
        landscape: Some(false),
        display_header_footer: Some(false),
        print_background: Some(true),
        scale: Some(1.0),
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }
}

/// A signature-checked PDF document.
///
/// Can only be constructed through [`PdfArtifact::validate`], so holding one
/// proves the bytes carry the PDF signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfArtifact {
    bytes: Vec<u8>,
}

impl PdfArtifact {
    /// Check `bytes` for the PDF signature.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidOutput`] with a short printable preview
    /// of the leading bytes. The bytes themselves are dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use report2pdf_api::PdfArtifact;
    ///
    /// assert!(PdfArtifact::validate(b"%PDF-1.7\n...".to_vec()).is_ok());
    /// assert!(PdfArtifact::validate(b"<html>error</html>".to_vec()).is_err());
    /// ```
    pub fn validate(bytes: Vec<u8>) -> Result<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            Ok(Self { bytes })
        } else {
            Err(ExportError::InvalidOutput(format!(
                "{} bytes starting with {:?}",
                bytes.len(),
                preview(&bytes)
            )))
        }
    }

    /// The document bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the artifact and return the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`: a valid artifact holds at least the signature.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[..bytes.len().min(16)]).into_owned()
}

/// Print `page` to PDF and validate the result.
///
/// The print call may use whatever time is left until `deadline`.
///
/// # Errors
///
/// - [`ExportError::Timeout`] if the deadline is exhausted before or during
///   the print call
/// - [`ExportError::Capture`] if the print call fails
/// - [`ExportError::InvalidOutput`] if the bytes are not a PDF
pub fn capture_pdf(page: &dyn ReportPage, deadline: Instant) -> Result<PdfArtifact> {
    let start = Instant::now();

    let budget = deadline.saturating_duration_since(start);
    if budget.is_zero() {
        return Err(ExportError::Timeout(
            "request deadline exhausted before capture".to_string(),
        ));
    }

    let bytes = page
        .print_to_pdf(build_print_options(), budget)
        .map_err(|e| {
            log::error!("❌ Failed to generate PDF: {}", e);
            match e {
                BrowserError::Timeout(waited) => ExportError::Timeout(format!(
                    "print to PDF did not finish within {:?}",
                    waited
                )),
                BrowserError::Protocol(message) => ExportError::Capture(message),
            }
        })?;

    let artifact = PdfArtifact::validate(bytes).inspect_err(|e| {
        log::error!("❌ Discarding capture output: {}", e);
    })?;

    log::debug!(
        "PDF generated in {:?} ({} bytes)",
        start.elapsed(),
        artifact.len()
    );
    Ok(artifact)
}

// ============================================================================
// Unit Tests
// ============================================================================
