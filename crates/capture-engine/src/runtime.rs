//! Platform contracts the capture engine drives.
//!
//! A [`MediaRuntime`] supplies surface capture, audio graph routing and a
//! streaming encoder. The GStreamer implementation lives in
//! [`crate::pipeline`]; tests use in-memory stubs.

use lyriclip_common::error::LyriclipResult;
use lyriclip_render_engine::{PlaybackPosition, Surface};
use tokio::sync::mpsc::UnboundedSender;

use crate::codec::{FormatProbe, FormatSpec};
use crate::media::MediaStream;

/// A playable audio source.
///
/// During a recording only the lifecycle controller seeks, plays or pauses
/// it; everything else just reads the position.
#[async_trait::async_trait]
pub trait AudioElement: PlaybackPosition + Send + Sync {
    /// Whether duration and seekability are known yet.
    fn is_metadata_loaded(&self) -> bool;

    /// Resolve once metadata is loaded.
    async fn wait_for_metadata(&self) -> LyriclipResult<()>;

    fn seek(&self, secs: f64) -> LyriclipResult<()>;

    /// Start playback; resolves once playback has actually begun.
    async fn play(&self) -> LyriclipResult<()>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    /// Total length, once known.
    fn duration(&self) -> Option<f64> {
        None
    }

    /// The element's own capture method. `None` when not exposed.
    fn capture_stream(&self) -> Option<LyriclipResult<MediaStream>> {
        None
    }

    /// Vendor-prefixed capture method. `None` when not exposed.
    fn legacy_capture_stream(&self) -> Option<LyriclipResult<MediaStream>> {
        None
    }
}

/// Events emitted by a running encoder, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// Encoded bytes. May be empty.
    Chunk(Vec<u8>),
    /// The encoder hit an error; it will stop producing data.
    Error(String),
    /// All buffered data has been emitted.
    Stopped,
}

/// A streaming encoder over a combined media stream.
#[async_trait::async_trait]
pub trait Encoder: Send {
    /// Begin encoding; resolves once the encoder is accepting media. Events
    /// are delivered on `events` until `Stopped`.
    async fn start(&mut self, events: UnboundedSender<EncoderEvent>) -> LyriclipResult<()>;

    /// Ask the encoder to flush and finish. Idempotent.
    fn request_stop(&mut self);

    /// The MIME type the encoder is producing, if it reports one.
    fn mime_type(&self) -> Option<String>;
}

/// Surface capture, audio routing and encoding for one platform.
#[async_trait::async_trait]
pub trait MediaRuntime: FormatProbe + Send + Sync + 'static {
    type Audio: AudioElement + 'static;
    type Surface: Surface + 'static;

    /// Resolve once fonts used by the compositor are ready. Never fails;
    /// a font problem only degrades rendering.
    async fn fonts_ready(&self) {}

    /// Capture the surface as a video stream at `fps`.
    fn capture_surface(&self, surface: &Self::Surface, fps: u32) -> LyriclipResult<MediaStream>;

    /// Route `audio` through a signal graph that keeps it audible while also
    /// feeding a capturable stream. `None` when the runtime has no graph.
    fn tap_audio_graph(&self, audio: &Self::Audio) -> Option<LyriclipResult<MediaStream>>;

    /// Open an encoder for `stream`. `format = None` selects the runtime default.
    fn open_encoder(
        &self,
        stream: &MediaStream,
        format: Option<&FormatSpec>,
    ) -> LyriclipResult<Box<dyn Encoder>>;
}
