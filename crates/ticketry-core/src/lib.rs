//! # Ticketry Core
//!
//! Shared building blocks for the Ticketry audit trail and trace context
//! crates.
//!
//! This crate provides:
//!
//! - [`ValidationError`] / [`ValidationErrors`] and the [`Validate`] trait,
//!   used when constructing audit events and loading configuration
//! - [`Error`] - crate-level error type for parsing and validating records
//! - [`redact`] - the redaction engine shared by audit events and log entries
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use ticketry_core::redact::{Redactor, REDACTION_MARKER};
//!
//! let state = json!({ "password": "hunter2", "title": "Fix login" });
//! let mut redactor = Redactor::new();
//! let clean = redactor.redact_value(&state);
//!
//! assert_eq!(clean["password"], REDACTION_MARKER);
//! assert_eq!(clean["title"], "Fix login");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod redact;
pub mod validation;


pub use error::{Error, Result};
pub use redact::{RedactionStats, Redactor, REDACTION_MARKER};
pub use validation::{Validate, ValidationError, ValidationErrorKind, ValidationErrors};
