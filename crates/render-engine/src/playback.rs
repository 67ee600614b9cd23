//! Playback position sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Anything that reports the current audio playback position in seconds.
///
/// The frame loop only reads the position; it never seeks or plays.
pub trait PlaybackPosition: Send + Sync {
    fn current_time(&self) -> f64;
}

/// A position set by hand. Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct ManualPosition {
    bits: Arc<AtomicU64>,
}

impl ManualPosition {
    pub fn new(secs: f64) -> Self {
        let position = Self::default();
        position.set(secs);
        position
    }

    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.current_time() + secs);
    }
}

impl PlaybackPosition for ManualPosition {
    fn current_time(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
