//! State cells shared between the caller and the frame loop.
//!
//! The caller writes; the frame loop reads the latest value at the start of
//! every frame. Writers never wait on a frame in progress for longer than one
//! clone.

use std::sync::{Arc, RwLock};

use lyriclip_lyric_model::{StyleConfig, Timeline};

/// Latest style configuration.
#[derive(Debug, Clone, Default)]
pub struct SharedStyle {
    inner: Arc<RwLock<StyleConfig>>,
}

impl SharedStyle {
    pub fn new(style: StyleConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(style)),
        }
    }

    pub fn get(&self) -> StyleConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, style: StyleConfig) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = style;
    }

    /// Modify the style in place.
    pub fn update(&self, f: impl FnOnce(&mut StyleConfig)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut *guard);
    }
}

/// Latest parsed timeline.
///
/// Readers get a cheap `Arc` snapshot; a new raw text replaces the whole
/// timeline.
#[derive(Debug, Clone, Default)]
pub struct SharedTimeline {
    inner: Arc<RwLock<Arc<Timeline>>>,
}

impl SharedTimeline {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(timeline))),
        }
    }

    pub fn snapshot(&self) -> Arc<Timeline> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn replace(&self, timeline: Timeline) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(timeline);
    }

    /// Parse `raw` and swap it in. Returns the number of entries accepted.
    pub fn set_raw(&self, raw: &str) -> usize {
        let timeline = Timeline::parse(raw);
        let count = timeline.len();
        self.replace(timeline);
        count
    }
}
