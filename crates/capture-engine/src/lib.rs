//! Lyriclip Capture Engine
//!
//! Records the lyric canvas together with the audio it is synchronized to.
//! Streams are acquired from a [`MediaRuntime`], an output format is
//! negotiated, and a [`RecordingController`] drives one recording session at
//! a time to a single encoded blob.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │               LyricCaptureEngine                  │
//! │  ┌────────────┐        ┌────────────────────────┐ │
//! │  │ FrameLoop  │──────▶ │ Surface (canvas)       │ │
//! │  └────────────┘        └──────────┬─────────────┘ │
//! │                                   │ video track   │
//! │  ┌────────────┐  audio track ┌────▼─────────────┐ │
//! │  │ AudioElem. │─────────────▶│ Encoder          │ │
//! │  └────────────┘              └────┬─────────────┘ │
//! │        ▲ seek/play/pause          │ chunks        │
//! │  ┌─────┴──────────────────────────▼─────────────┐ │
//! │  │          RecordingController                 │ │
//! │  └──────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod acquisition;
pub mod codec;
pub mod engine;
pub mod media;
pub mod pipeline;
pub mod runtime;
pub mod session;

pub use acquisition::*;
pub use codec::*;
pub use engine::*;
pub use media::*;
pub use runtime::*;
pub use session::*;
