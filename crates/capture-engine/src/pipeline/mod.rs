//! GStreamer media runtime.
//!
//! ```text
//! GstCanvas ──present──▶ VideoFeed ──appsrc──┐
//!                                            ├─▶ textoverlay×N ─▶ encoders ─▶ mux ─▶ appsink ─▶ EncoderEvent
//! GstAudioPlayer ──tee──▶ AudioTap ──appsrc──┘
//!                  └──▶ autoaudiosink
//! ```

mod canvas;
mod encoder;
mod player;

use std::sync::{Arc, OnceLock};

use gst::prelude::*;
use gstreamer as gst;
use lyriclip_common::error::{LyriclipError, LyriclipResult};

pub use canvas::{
    overlay_slot_count, overlay_slots, rasterize, GstCanvas, OverlayQueue, OverlayText, VideoFeed,
};
pub use encoder::{encoder_launch, GstEncoder};
pub use player::{AudioTap, GstAudioPlayer};

use crate::codec::{EncoderProfile, FormatProbe, FormatSpec};
use crate::media::MediaStream;
use crate::runtime::{Encoder, MediaRuntime};

/// Raw audio format flowing from the player tap into the encoder.
pub(crate) const AUDIO_CAPS: &str =
    "audio/x-raw,format=F32LE,rate=48000,channels=2,layout=interleaved";

/// Elements every recording pipeline needs regardless of format.
pub const BASE_ELEMENTS: [&str; 9] = [
    "appsrc",
    "appsink",
    "queue",
    "identity",
    "videoconvert",
    "textoverlay",
    "audioconvert",
    "audioresample",
    "uridecodebin",
];

pub fn init_gstreamer() -> LyriclipResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(LyriclipError::capture(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Version of the loaded GStreamer library.
pub fn gstreamer_version() -> LyriclipResult<String> {
    init_gstreamer()?;
    Ok(gst::version_string().to_string())
}

pub(crate) fn launch_pipeline(name: &str, launch: &str) -> LyriclipResult<gst::Pipeline> {
    init_gstreamer()?;

    let element = gst::parse::launch(launch).map_err(|e| {
        LyriclipError::capture(format!("Failed to build {name} pipeline: {e}"))
    })?;

    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| LyriclipError::capture("Launch string did not produce a pipeline"))
}

/// Block until `pipeline` reaches Playing, up to 10 s.
pub(crate) fn wait_for_playing(pipeline: &gst::Pipeline, name: &str) -> LyriclipResult<()> {
    match pipeline.state(gst::ClockTime::from_seconds(10)) {
        (Ok(_), gst::State::Playing, _) => Ok(()),
        (Ok(_), state, _) => {
            tracing::warn!(
                pipeline = name,
                ?state,
                "Pipeline did not reach Playing state within timeout"
            );
            Ok(())
        }
        (Err(e), _, _) => Err(LyriclipError::capture(format!(
            "{name} pipeline failed to reach Playing state: {e:?}"
        ))),
    }
}

/// Quote-safe value for a launch string.
pub(crate) fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Whether the named element factory is registered.
pub fn has_element(name: &str) -> bool {
    init_gstreamer().is_ok() && gst::ElementFactory::find(name).is_some()
}

/// Elements of `profile` (plus the base elements) that are not installed.
pub fn missing_elements(profile: &EncoderProfile) -> Vec<&'static str> {
    BASE_ELEMENTS
        .iter()
        .copied()
        .chain(profile.elements())
        .filter(|name| !has_element(name))
        .collect()
}

/// The GStreamer-backed [`MediaRuntime`].
#[derive(Debug)]
pub struct GstRuntime {
    _private: (),
}

impl GstRuntime {
    pub fn new() -> LyriclipResult<Self> {
        init_gstreamer()?;
        tracing::debug!(version = %gst::version_string(), "GStreamer initialized");
        Ok(Self { _private: () })
    }
}

impl FormatProbe for GstRuntime {
    fn is_format_supported(&self, format: &FormatSpec) -> bool {
        let Some(profile) = format.encoder_profile() else {
            tracing::debug!(format = %format, "No encoder profile for format");
            return false;
        };
        let missing = missing_elements(&profile);
        if !missing.is_empty() {
            tracing::debug!(format = %format, ?missing, "Format unsupported; elements missing");
        }
        missing.is_empty()
    }
}

#[async_trait::async_trait]
impl MediaRuntime for GstRuntime {
    type Audio = GstAudioPlayer;
    type Surface = GstCanvas;

    fn capture_surface(&self, surface: &GstCanvas, fps: u32) -> LyriclipResult<MediaStream> {
        surface.capture_stream(fps)
    }

    fn tap_audio_graph(&self, audio: &GstAudioPlayer) -> Option<LyriclipResult<MediaStream>> {
        Some(audio.tap_stream())
    }

    fn open_encoder(
        &self,
        stream: &MediaStream,
        format: Option<&FormatSpec>,
    ) -> LyriclipResult<Box<dyn Encoder>> {
        let profile = match format {
            Some(format) => format.encoder_profile().ok_or_else(|| {
                LyriclipError::unsupported(format!("no encoder profile for {format}"))
            })?,
            None => EncoderProfile::runtime_default(),
        };

        let feed: Arc<VideoFeed> = stream
            .video_tracks()
            .find_map(|track| track.source::<VideoFeed>())
            .ok_or_else(|| LyriclipError::encoder("stream has no canvas video track"))?;
        let audio: Option<Arc<AudioTap>> = stream
            .audio_tracks()
            .find_map(|track| track.source::<AudioTap>());
        if audio.is_none() {
            tracing::warn!("Stream has no tapped audio track; recording video only");
        }

        Ok(Box::new(GstEncoder::open(profile, feed, audio)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_value_quotes() {
        assert_eq!(
            escape_value(r#"file:///tmp/a "b"\c.mp3"#),
            r#"file:///tmp/a \"b\"\\c.mp3"#
        );
    }
}
