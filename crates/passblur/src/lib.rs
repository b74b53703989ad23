//! `passblur` - Detect and mask sensitive values in live page content
//!
//! This library provides the masking engine: a pattern classifier for API
//! keys, tokens and personal data, an in-memory document model, and an engine
//! that masks matches in place, reveals them on request, watches the page for
//! changes and throttles itself under load.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod detection;
pub mod dom;
pub mod engine;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{Config, Settings};
pub use engine::{Engine, EngineEvent, Status};
pub use error::{Error, Result};
pub use logging::init_logging;
