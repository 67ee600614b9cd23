//! Media tracks and streams.
//!
//! A track is a live source of one kind of media (video frames or audio
//! samples). Clones of a track share its liveness, so stopping any clone
//! stops the source for every holder. A stream is a bundle of tracks.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Media kind carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

type StopHook = Arc<dyn Fn() + Send + Sync>;

/// A handle to a live media source.
#[derive(Clone)]
pub struct MediaTrack {
    id: u64,
    kind: TrackKind,
    label: String,
    active: Arc<AtomicBool>,
    on_stop: Option<StopHook>,
    source: Option<Arc<dyn Any + Send + Sync>>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            label: label.into(),
            active: Arc::new(AtomicBool::new(true)),
            on_stop: None,
            source: None,
        }
    }

    pub fn video(label: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, label)
    }

    pub fn audio(label: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, label)
    }

    /// Run `hook` the first time the track is stopped.
    pub fn with_stop_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(hook));
        self
    }

    /// Attach a runtime-specific source object (e.g. a frame feed).
    pub fn with_source<T: Any + Send + Sync>(mut self, source: Arc<T>) -> Self {
        self.source = Some(source);
        self
    }

    /// The attached source, if it has type `T`.
    pub fn source<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.source.clone()?.downcast::<T>().ok()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop the source. Idempotent; the stop hook runs at most once.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::debug!(id = self.id, kind = ?self.kind, label = %self.label, "Track stopped");
            if let Some(hook) = &self.on_stop {
                hook();
            }
        }
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// An ordered set of tracks.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    /// Combine the video tracks of `video` with the audio tracks of `audio`.
    pub fn mux(video: &MediaStream, audio: &MediaStream) -> Self {
        let tracks = video
            .video_tracks()
            .chain(audio.audio_tracks())
            .cloned()
            .collect();
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn has_active_tracks(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_active)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
