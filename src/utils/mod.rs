//! Utility Functions
//!
//! User-friendly error formatting for the command line.
//!
//! ## Error Formatting
//!
//! ```rust
//! use xrdp_configurator::utils::format_user_error;
//!
//! let error = anyhow::anyhow!("example failure");
//! let message = format_user_error(&error);
//! assert!(message.contains("Technical Details"));
//! ```
//!
//! Error categories with context-aware help:
//! - Unrecognised file → which sections are missing
//! - Syntax errors → the offending line and common causes
//! - Read/write failures → permission and path hints
//! - Rejected values → accepted formats

pub mod errors;

pub use errors::format_user_error;
