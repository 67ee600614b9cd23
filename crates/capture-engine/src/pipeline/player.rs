//! Audio playback with a capturable tap.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use lyriclip_common::clock::RecordingClock;
use lyriclip_common::error::{LyriclipError, LyriclipResult};
use lyriclip_render_engine::PlaybackPosition;

use super::{escape_value, launch_pipeline, wait_for_playing, AUDIO_CAPS};
use crate::media::{MediaStream, MediaTrack};
use crate::runtime::AudioElement;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const METADATA_POLL: Duration = Duration::from_millis(50);

/// Forwards decoded audio from the player's tee into an encoder.
#[derive(Default)]
pub struct AudioTap {
    target: Mutex<Option<gst_app::AppSrc>>,
    samples: AtomicU64,
}

impl AudioTap {
    pub fn samples_forwarded(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub(crate) fn attach(&self, appsrc: gst_app::AppSrc) {
        *self.target.lock().unwrap_or_else(|e| e.into_inner()) = Some(appsrc);
    }

    pub(crate) fn detach(&self) {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    fn forward(&self, sample: &gst::Sample) {
        let target = self.target.lock().unwrap_or_else(|e| e.into_inner());
        let Some(appsrc) = target.as_ref() else {
            return;
        };
        let Some(mut buffer) = sample.buffer_owned() else {
            return;
        };

        // The encoder timestamps on arrival; playback timestamps would jump
        // after the clip-start seek.
        {
            let buffer = buffer.make_mut();
            buffer.set_pts(gst::ClockTime::NONE);
            buffer.set_dts(gst::ClockTime::NONE);
        }

        match appsrc.push_buffer(buffer) {
            Ok(_) => {
                self.samples.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => tracing::debug!(error = ?e, "Audio sample not accepted by encoder"),
        }
    }
}

/// Plays an audio file through the default output device.
///
/// Decoded audio is teed to an `appsink`, which is how recordings capture
/// it; the player offers no direct capture method.
pub struct GstAudioPlayer {
    path: PathBuf,
    pipeline: gst::Pipeline,
    tap: Arc<AudioTap>,
    last_position_bits: AtomicU64,
}

impl GstAudioPlayer {
    /// Open `path` and preroll it (paused at zero).
    pub fn open(path: &Path) -> LyriclipResult<Self> {
        if !path.exists() {
            return Err(LyriclipError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        super::init_gstreamer()?;

        let absolute = path.canonicalize()?;
        let uri = gst::glib::filename_to_uri(&absolute, None).map_err(|e| {
            LyriclipError::capture(format!("Invalid audio path {}: {e}", absolute.display()))
        })?;

        // The tap branch drops when nobody reads it so playback never stalls.
        let launch = format!(
            "uridecodebin uri=\"{uri}\" ! audioconvert ! audioresample ! {AUDIO_CAPS} ! tee name=t \
             t. ! queue ! autoaudiosink \
             t. ! queue max-size-buffers=50 leaky=downstream ! appsink name=tap sync=true max-buffers=8 drop=true",
            uri = escape_value(uri.as_str()),
        );
        let pipeline = launch_pipeline("audio", &launch)?;

        let sink = pipeline
            .by_name("tap")
            .and_then(|e| e.dynamic_cast::<gst_app::AppSink>().ok())
            .ok_or_else(|| LyriclipError::capture("Audio pipeline has no tap sink"))?;

        let tap = Arc::new(AudioTap::default());
        let forward = tap.clone();
        sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    forward.forward(&sample);
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline.set_state(gst::State::Paused).map_err(|e| {
            LyriclipError::capture(format!("Failed to preroll audio pipeline: {e:?}"))
        })?;

        tracing::info!(path = %path.display(), "Audio opened");
        Ok(Self {
            path: path.to_path_buf(),
            pipeline,
            tap,
            last_position_bits: AtomicU64::new(0f64.to_bits()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A stream carrying the tapped audio. Stopping its track detaches the
    /// tap; playback continues.
    pub(crate) fn tap_stream(&self) -> LyriclipResult<MediaStream> {
        let on_stop = self.tap.clone();
        let track = MediaTrack::audio("graph-tap")
            .with_source(self.tap.clone())
            .with_stop_hook(move || on_stop.detach());
        Ok(MediaStream::new(vec![track]))
    }

    fn pending_error(&self) -> Option<String> {
        let message = self
            .pipeline
            .bus()?
            .pop_filtered(&[gst::MessageType::Error])?;
        match message.view() {
            gst::MessageView::Error(e) => Some(e.error().to_string()),
            _ => None,
        }
    }
}

impl PlaybackPosition for GstAudioPlayer {
    fn current_time(&self) -> f64 {
        match self.pipeline.query_position::<gst::ClockTime>() {
            Some(position) => {
                let secs = RecordingClock::ns_to_secs(position.nseconds());
                self.last_position_bits
                    .store(secs.to_bits(), Ordering::Relaxed);
                secs
            }
            None => f64::from_bits(self.last_position_bits.load(Ordering::Relaxed)),
        }
    }
}

#[async_trait::async_trait]
impl AudioElement for GstAudioPlayer {
    fn is_metadata_loaded(&self) -> bool {
        self.pipeline.query_duration::<gst::ClockTime>().is_some()
    }

    async fn wait_for_metadata(&self) -> LyriclipResult<()> {
        let deadline = tokio::time::Instant::now() + METADATA_TIMEOUT;
        loop {
            if let Some(error) = self.pending_error() {
                return Err(LyriclipError::capture(format!(
                    "Audio failed to load: {error}"
                )));
            }
            if self.is_metadata_loaded() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LyriclipError::capture(
                    "Timed out waiting for audio metadata",
                ));
            }
            tokio::time::sleep(METADATA_POLL).await;
        }
    }

    fn seek(&self, secs: f64) -> LyriclipResult<()> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(LyriclipError::capture(format!("Invalid seek position {secs}")));
        }
        self.pipeline
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                gst::ClockTime::from_nseconds(RecordingClock::secs_to_ns(secs)),
            )
            .map_err(|e| LyriclipError::capture(format!("Seek to {secs}s failed: {e}")))?;
        self.last_position_bits
            .store(secs.to_bits(), Ordering::Relaxed);
        tracing::debug!(secs, "Audio seeked");
        Ok(())
    }

    async fn play(&self) -> LyriclipResult<()> {
        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            LyriclipError::capture(format!("Failed to start audio playback: {e:?}"))
        })?;

        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || wait_for_playing(&pipeline, "audio"))
            .await
            .map_err(|e| LyriclipError::capture(format!("Audio state wait failed: {e}")))?
    }

    fn pause(&self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Paused) {
            tracing::warn!(error = ?e, "Failed to pause audio");
        }
    }

    fn is_paused(&self) -> bool {
        self.pipeline.current_state() != gst::State::Playing
    }

    fn duration(&self) -> Option<f64> {
        self.pipeline
            .query_duration::<gst::ClockTime>()
            .map(|d| RecordingClock::ns_to_secs(d.nseconds()))
    }
}

impl Drop for GstAudioPlayer {
    fn drop(&mut self) {
        self.tap.detach();
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to shut down audio pipeline");
        }
    }
}
