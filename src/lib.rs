//! PDF Form Server Library
//!
//! This crate provides an HTTP service for AcroForm processing:
//! - `POST /api/pdf/extract-fields`: List form fields with type, value, options and position
//! - `POST /api/pdf/fill-form`: Fill form fields and return the filled PDF
//!
//! The [`pdf`] module can also be used directly without the HTTP layer.

pub mod auth;
pub mod config;
pub mod error;
pub mod openapi;
pub mod pdf;
pub mod server;

pub use config::{Environment, ServerConfig};
pub use error::{ApiError, Error, Result};
pub use pdf::{
    extract_form_fields, fill_form_fields, FieldKind, FillInstruction, FillReport, FormField,
};
pub use server::{build_router, run_server, AppState};
