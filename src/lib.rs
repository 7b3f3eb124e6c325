//! # xrdp-configurator
//!
//! Editor core for the two configuration files of an xrdp installation:
//! `xrdp.ini` (listener, login window, channels and the session list) and
//! `sesman.ini` (session manager policy).
//!
//! # Architecture
//!
//! ```text
//! xrdp-configurator
//!   ├─> Section Store (ordered INI model, parse + serialize)
//!   ├─> Documents (file kind detection, dirty tracking, header, save)
//!   ├─> xrdp.ini
//!   │     ├─> Session Sequencer (xrdp1..xrdpN ordering, debug binding)
//!   │     ├─> Override Tracker (per-session channel.* keys)
//!   │     └─> Form bindings (globals, logging, login window)
//!   ├─> sesman.ini (form bindings, X server parameters)
//!   └─> Validation (errors and warnings before saving)
//! ```
//!
//! # Data Flow
//!
//! **Load:** file → parse → verify kind → inject defaults → sequence sessions
//!
//! **Edit:** typed operation → Section Store → document marked dirty
//!
//! **Save:** header + serialized store → file → document marked clean

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Open documents and saving
pub mod document;

/// Error types
pub mod error;

/// Boolean key spellings
///
/// xrdp accepts several spellings for booleans but each key has one
/// canonical form the editor writes back.
pub mod flags;

/// Ordered INI model
pub mod ini;

/// Log level names shared by both files
pub mod log_level;

/// sesman.ini editing
pub mod sesman;

/// Utility functions
pub mod utils;

/// Pre-save checks
pub mod validation;

/// xrdp.ini editing
///
/// Session ordering, channel overrides, the debug binding, globals and the
/// login window layout.
pub mod xrdp;

pub use error::{ConfigError, Result};
