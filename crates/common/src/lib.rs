//! Lyriclip Common Utilities
//!
//! Shared infrastructure for all Lyriclip crates:
//! - Error types and result aliases
//! - Clock and pacing utilities for clip capture
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
