//! Lyriclip Transcript Collaborator
//!
//! Word and segment timings come from outside the engine:
//! - **Transcription:** the transcript contract and a placeholder source
//! - **Subtitle Export:** SubRip, Enhanced LRC and timed-lyric output

pub mod subtitles;
pub mod transcription;

pub use subtitles::*;
pub use transcription::*;
