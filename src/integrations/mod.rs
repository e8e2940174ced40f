//! Web framework integrations.
//!
//! The service layer is framework-agnostic; this module maps it onto HTTP.
//!
//! # Available Integrations
//!
//! | Framework | Feature Flag | Module |
//! |-----------|--------------|--------|
//! | Axum | `axum-integration` | [`axum`] |

#[cfg(feature = "axum-integration")]
pub mod axum;
