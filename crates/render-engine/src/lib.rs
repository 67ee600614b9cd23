//! Lyriclip Render Engine
//!
//! Draws the lyric timeline onto a 2D surface in lockstep with audio
//! playback.
//!
//! # Pipeline Architecture
//!
//! ```text
//! SharedTimeline ──┐
//!                  ├── Compositor::compose ── FrameComposition ── Surface::present
//! SharedStyle ─────┤          ▲
//!                  │          │
//! PlaybackPosition ┘   FrameLoop (one activation per display refresh)
//! ```

pub mod compositor;
pub mod frame_loop;
pub mod layout;
pub mod playback;
pub mod shared;
pub mod surface;

pub use compositor::*;
pub use frame_loop::*;
pub use layout::*;
pub use playback::*;
pub use shared::*;
pub use surface::*;
