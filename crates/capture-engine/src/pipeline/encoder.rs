//! Streaming encoder pipeline.

use std::sync::Arc;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use lyriclip_common::error::{LyriclipError, LyriclipResult};
use lyriclip_render_engine::SurfaceSize;
use tokio::sync::mpsc::UnboundedSender;

use super::canvas::{apply_overlays, FeedSink, OverlayQueue, VideoFeed};
use super::player::AudioTap;
use super::{launch_pipeline, wait_for_playing, AUDIO_CAPS};
use crate::codec::EncoderProfile;
use crate::runtime::{Encoder, EncoderEvent};

/// Build the launch string for an encoder pipeline with `overlay_slots`
/// chained `textoverlay` elements.
///
/// Nothing between the `frame_sync` identity and the overlays may queue or
/// drop buffers: overlay settings are applied when a frame passes
/// `frame_sync` and must still be current when it reaches the last overlay.
pub fn encoder_launch(
    profile: &EncoderProfile,
    size: SurfaceSize,
    fps: u32,
    overlay_slots: usize,
    with_audio: bool,
) -> String {
    let fps = fps.max(1);
    // One keyframe every 2 seconds.
    let keyint = fps.saturating_mul(2).max(2);

    let overlays: String = (0..overlay_slots.max(1))
        .map(|i| {
            format!(
                "textoverlay name=line{i} silent=true halignment=center valignment=position ypos=0.5 ! "
            )
        })
        .collect();
    let parser = profile
        .video_parser
        .map(|p| format!("{p} ! "))
        .unwrap_or_default();

    let mut launch = format!(
        "appsrc name=video is-live=true do-timestamp=true format=time \
         caps=\"video/x-raw,format=RGBA,width={width},height={height},framerate={fps}/1\" \
         ! videoconvert ! identity name=frame_sync signal-handoffs=true silent=true \
         ! {overlays}videoconvert ! queue max-size-buffers=8 ! {encoder} ! {parser}queue max-size-buffers=8 ! mux. ",
        width = size.width,
        height = size.height,
        encoder = video_encoder_element(profile.video_encoder, keyint),
    );

    if with_audio {
        launch.push_str(&format!(
            "appsrc name=audio is-live=true do-timestamp=true format=time caps=\"{AUDIO_CAPS}\" \
             ! queue ! audioconvert ! audioresample ! {audio} ! queue ! mux. ",
            audio = profile.audio_encoder,
        ));
    }

    launch.push_str(&format!(
        "{muxer} ! appsink name=out sync=false",
        muxer = muxer_element(profile.muxer)
    ));
    launch
}

fn video_encoder_element(name: &str, keyint: u32) -> String {
    match name {
        "x264enc" | "x265enc" => {
            format!("{name} tune=zerolatency speed-preset=veryfast key-int-max={keyint}")
        }
        "vp8enc" | "vp9enc" => format!("{name} deadline=1 keyframe-max-dist={keyint}"),
        other => other.to_string(),
    }
}

/// Muxers are configured for non-seekable output since bytes leave as they
/// are produced.
fn muxer_element(name: &str) -> String {
    match name {
        "mp4mux" => "mp4mux name=mux fragment-duration=1000 streamable=true".to_string(),
        "webmmux" | "matroskamux" => format!("{name} name=mux streamable=true"),
        other => format!("{other} name=mux"),
    }
}

fn app_src(pipeline: &gst::Pipeline, name: &str) -> LyriclipResult<gst_app::AppSrc> {
    pipeline
        .by_name(name)
        .and_then(|e| e.dynamic_cast::<gst_app::AppSrc>().ok())
        .ok_or_else(|| LyriclipError::encoder(format!("Encoder pipeline has no '{name}' source")))
}

/// Encodes the canvas feed and tapped audio into one muxed byte stream.
pub struct GstEncoder {
    pipeline: gst::Pipeline,
    profile: EncoderProfile,
    feed: Arc<VideoFeed>,
    audio_tap: Option<Arc<AudioTap>>,
    video_src: gst_app::AppSrc,
    audio_src: Option<gst_app::AppSrc>,
    overlay_queue: Arc<OverlayQueue>,
    sink: gst_app::AppSink,
    stopping: bool,
}

impl GstEncoder {
    pub fn open(
        profile: EncoderProfile,
        feed: Arc<VideoFeed>,
        audio_tap: Option<Arc<AudioTap>>,
    ) -> LyriclipResult<Self> {
        let launch = encoder_launch(
            &profile,
            feed.size(),
            feed.fps(),
            feed.overlay_slots(),
            audio_tap.is_some(),
        );
        tracing::debug!(%launch, "Building encoder pipeline");
        let pipeline = launch_pipeline("encoder", &launch)?;

        let video_src = app_src(&pipeline, "video")?;
        let audio_src = match audio_tap {
            Some(_) => Some(app_src(&pipeline, "audio")?),
            None => None,
        };
        let overlays = (0..feed.overlay_slots())
            .map(|i| {
                pipeline.by_name(&format!("line{i}")).ok_or_else(|| {
                    LyriclipError::encoder(format!("Encoder pipeline has no overlay {i}"))
                })
            })
            .collect::<LyriclipResult<Vec<_>>>()?;
        let frame_sync = pipeline
            .by_name("frame_sync")
            .ok_or_else(|| LyriclipError::encoder("Encoder pipeline has no frame sync"))?;
        let overlay_queue = Arc::new(OverlayQueue::new());
        sync_overlays_on_handoff(&frame_sync, overlays, overlay_queue.clone());
        let sink = pipeline
            .by_name("out")
            .and_then(|e| e.dynamic_cast::<gst_app::AppSink>().ok())
            .ok_or_else(|| LyriclipError::encoder("Encoder pipeline has no output sink"))?;

        Ok(Self {
            pipeline,
            profile,
            feed,
            audio_tap,
            video_src,
            audio_src,
            overlay_queue,
            sink,
            stopping: false,
        })
    }

    fn detach_sources(&self) {
        self.feed.detach();
        if let Some(tap) = &self.audio_tap {
            tap.detach();
        }
    }
}

/// Apply each frame's overlay settings as the frame passes `frame_sync`,
/// matched by the sequence the feed stored in the buffer offset.
fn sync_overlays_on_handoff(
    frame_sync: &gst::Element,
    overlays: Vec<gst::Element>,
    queue: Arc<OverlayQueue>,
) {
    frame_sync.connect("handoff", false, move |values| {
        let buffer = values.get(1)?.get::<gst::Buffer>().ok()?;
        let slots = match buffer.offset() {
            gst::BUFFER_OFFSET_NONE => queue.take_next(),
            seq => queue.take(seq),
        };
        match slots {
            Some(slots) => apply_overlays(&overlays, &slots),
            None => tracing::trace!(offset = buffer.offset(), "No overlay settings for frame"),
        }
        None
    });
}

#[async_trait::async_trait]
impl Encoder for GstEncoder {
    async fn start(&mut self, events: UnboundedSender<EncoderEvent>) -> LyriclipResult<()> {
        let chunk_tx = events.clone();
        let eos_tx = events.clone();
        self.sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
                    chunk_tx
                        .send(EncoderEvent::Chunk(map.as_slice().to_vec()))
                        .map_err(|_| gst::FlowError::Flushing)?;
                    Ok(gst::FlowSuccess::Ok)
                })
                .eos(move |_| {
                    let _ = eos_tx.send(EncoderEvent::Stopped);
                })
                .build(),
        );

        if let Some(bus) = self.pipeline.bus() {
            bus.set_sync_handler(move |_, message| {
                if let gst::MessageView::Error(e) = message.view() {
                    let _ = events.send(EncoderEvent::Error(e.error().to_string()));
                }
                gst::BusSyncReply::Drop
            });
        }

        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            LyriclipError::encoder(format!("Failed to start encoder pipeline: {e:?}"))
        })?;
        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || wait_for_playing(&pipeline, "encoder"))
            .await
            .map_err(|e| LyriclipError::encoder(format!("Encoder state wait failed: {e}")))??;

        self.feed.attach(FeedSink {
            appsrc: self.video_src.clone(),
            overlays: self.overlay_queue.clone(),
        });
        if let (Some(tap), Some(src)) = (&self.audio_tap, &self.audio_src) {
            tap.attach(src.clone());
        }

        tracing::info!(
            video = self.profile.video_encoder,
            audio = self.profile.audio_encoder,
            muxer = self.profile.muxer,
            "Encoder started"
        );
        Ok(())
    }

    fn request_stop(&mut self) {
        if self.stopping {
            return;
        }
        self.stopping = true;
        self.detach_sources();

        for src in std::iter::once(&self.video_src).chain(self.audio_src.as_ref()) {
            if let Err(e) = src.end_of_stream() {
                tracing::warn!(error = ?e, "Failed to send EOS; output may be truncated");
            }
        }
    }

    fn mime_type(&self) -> Option<String> {
        Some(self.profile.output_mime.to_string())
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        self.detach_sources();
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to shut down encoder pipeline");
        }
    }
}
