//! Lyriclip Lyric Model
//!
//! Core data contracts shared by the renderer and the capture engine:
//! - **Timeline:** timed-lyric parsing, active-entry lookup, timestamp formatting
//! - **Style:** colors and the per-frame style configuration
//!
//! Times are plain `f64` seconds on the audio playback timeline.

pub mod style;
pub mod timeline;

pub use style::*;
pub use timeline::*;
