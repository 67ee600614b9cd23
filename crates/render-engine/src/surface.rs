//! Rendering surfaces.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use lyriclip_common::error::{LyriclipError, LyriclipResult};
use serde::{Deserialize, Serialize};

use crate::compositor::FrameComposition;

/// Surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(1080, 700)
    }
}

/// A 2D drawing target that executes frame compositions.
///
/// Presenting takes `&self`: the frame loop draws while a capture reads
/// frames from the same surface.
pub trait Surface: Send + Sync {
    fn size(&self) -> SurfaceSize;

    /// Draw one composed frame. Fails once the surface has been disposed.
    fn present(&self, frame: &FrameComposition) -> LyriclipResult<()>;
}

/// In-memory surface that keeps the most recent frame.
///
/// Used for previews and tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    size: SurfaceSize,
    frames: AtomicU64,
    last: Mutex<Option<FrameComposition>>,
    closed: AtomicBool,
}

impl RecordingSurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Number of frames presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    /// The most recently presented frame.
    pub fn last_frame(&self) -> Option<FrameComposition> {
        self.last
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Dispose the surface; later presents fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn present(&self, frame: &FrameComposition) -> LyriclipResult<()> {
        if self.is_closed() {
            return Err(LyriclipError::render("surface has been disposed"));
        }
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame.clone());
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
