//! In-memory media runtime for lifecycle tests.
//!
//! Time comes from tokio's clock, so tests run with `start_paused = true`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lyriclip_capture_engine::{
    Encoder, EncoderEvent, FormatProbe, FormatSpec, MediaRuntime, MediaStream, MediaTrack,
    RecordingConfig, RecordingController,
};
use lyriclip_capture_engine::AudioElement;
use lyriclip_common::error::LyriclipResult;
use lyriclip_render_engine::{PlaybackPosition, RecordingSurface};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tokio::time::Instant;

pub const CHUNK_SIZE: usize = 16;
pub const FLUSH_CHUNK: [u8; 4] = [0xFF; 4];

struct AudioState {
    base: f64,
    playing_since: Option<Instant>,
    seeks: Vec<f64>,
    plays: usize,
}

/// Audio element whose position advances with the tokio clock while playing.
pub struct StubAudio {
    state: Mutex<AudioState>,
    metadata_delay: Mutex<Option<Duration>>,
    duration: Option<f64>,
}

impl StubAudio {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AudioState {
                base: 0.0,
                playing_since: None,
                seeks: Vec::new(),
                plays: 0,
            }),
            metadata_delay: Mutex::new(None),
            duration: None,
        }
    }

    /// Report a known total length.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }

    /// Metadata becomes available `delay` after the first wait.
    pub fn with_metadata_delay(self, delay: Duration) -> Self {
        *self.metadata_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().unwrap().seeks.clone()
    }

    pub fn plays(&self) -> usize {
        self.state.lock().unwrap().plays
    }
}

impl PlaybackPosition for StubAudio {
    fn current_time(&self) -> f64 {
        let state = self.state.lock().unwrap();
        state.base
            + state
                .playing_since
                .map_or(0.0, |since| since.elapsed().as_secs_f64())
    }
}

#[async_trait::async_trait]
impl AudioElement for StubAudio {
    fn is_metadata_loaded(&self) -> bool {
        self.metadata_delay.lock().unwrap().is_none()
    }

    async fn wait_for_metadata(&self) -> LyriclipResult<()> {
        let delay = *self.metadata_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
            *self.metadata_delay.lock().unwrap() = None;
        }
        Ok(())
    }

    fn seek(&self, secs: f64) -> LyriclipResult<()> {
        let mut state = self.state.lock().unwrap();
        state.base = secs;
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
        state.seeks.push(secs);
        Ok(())
    }

    async fn play(&self) -> LyriclipResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.playing_since.is_none() {
            state.playing_since = Some(Instant::now());
        }
        state.plays += 1;
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(since) = state.playing_since.take() {
            state.base += since.elapsed().as_secs_f64();
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().playing_since.is_none()
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

/// How the stub encoder behaves.
#[derive(Debug, Clone)]
pub struct EncoderPlan {
    /// A chunk of [`CHUNK_SIZE`] bytes is emitted this often.
    pub chunk_every: Duration,
    /// Emit an empty chunk before every data chunk.
    pub empty_chunks: bool,
    /// Report an error once this much time has passed.
    pub fail_after: Option<Duration>,
    /// MIME type reported by the encoder.
    pub reported_mime: Option<String>,
    /// Ignore stop requests forever.
    pub never_stops: bool,
    /// Time `start` takes before the encoder accepts media.
    pub start_delay: Option<Duration>,
}

impl Default for EncoderPlan {
    fn default() -> Self {
        Self {
            chunk_every: Duration::from_millis(100),
            empty_chunks: false,
            fail_after: None,
            reported_mime: None,
            never_stops: false,
            start_delay: None,
        }
    }
}

struct StubEncoder {
    plan: EncoderPlan,
    stop: Arc<Notify>,
}

#[async_trait::async_trait]
impl Encoder for StubEncoder {
    async fn start(&mut self, events: UnboundedSender<EncoderEvent>) -> LyriclipResult<()> {
        if let Some(delay) = self.plan.start_delay {
            tokio::time::sleep(delay).await;
        }
        let plan = self.plan.clone();
        let stop = self.stop.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticks = tokio::time::interval(plan.chunk_every);
            ticks.tick().await;
            let mut n: u8 = 0;

            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        if plan.fail_after.is_some_and(|after| started.elapsed() >= after) {
                            let _ = events.send(EncoderEvent::Error("stub encoder failure".into()));
                            // Buffered data is still flushed once stop arrives.
                            stop.notified().await;
                            break;
                        }
                        if plan.empty_chunks {
                            let _ = events.send(EncoderEvent::Chunk(Vec::new()));
                        }
                        let _ = events.send(EncoderEvent::Chunk(vec![n; CHUNK_SIZE]));
                        n = n.wrapping_add(1);
                    }
                    _ = stop.notified() => break,
                }
            }

            if plan.never_stops {
                std::future::pending::<()>().await;
            }
            let _ = events.send(EncoderEvent::Chunk(FLUSH_CHUNK.to_vec()));
            let _ = events.send(EncoderEvent::Stopped);
        });
        Ok(())
    }

    fn request_stop(&mut self) {
        self.stop.notify_one();
    }

    fn mime_type(&self) -> Option<String> {
        self.plan.reported_mime.clone()
    }
}

/// Runtime whose tracks record their liveness for inspection.
pub struct StubRuntime {
    supported: Vec<String>,
    plan: Mutex<EncoderPlan>,
    graph_tap: AtomicBool,
    tracks: Mutex<Vec<MediaTrack>>,
    opened: Mutex<Vec<Option<String>>>,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self {
            supported: vec!["video/webm".to_string()],
            plan: Mutex::new(EncoderPlan::default()),
            graph_tap: AtomicBool::new(true),
            tracks: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn supporting(mut self, mimes: &[&str]) -> Self {
        self.supported = mimes.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_plan(self, plan: EncoderPlan) -> Self {
        self.set_plan(plan);
        self
    }

    pub fn set_plan(&self, plan: EncoderPlan) {
        *self.plan.lock().unwrap() = plan;
    }

    pub fn set_graph_tap(&self, available: bool) {
        self.graph_tap.store(available, Ordering::SeqCst);
    }

    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.lock().unwrap().clone()
    }

    pub fn any_track_active(&self) -> bool {
        self.tracks.lock().unwrap().iter().any(MediaTrack::is_active)
    }

    /// Formats passed to `open_encoder`, by MIME.
    pub fn opened_formats(&self) -> Vec<Option<String>> {
        self.opened.lock().unwrap().clone()
    }

    fn track(&self, track: MediaTrack) -> MediaStream {
        self.tracks.lock().unwrap().push(track.clone());
        MediaStream::new(vec![track])
    }
}

impl FormatProbe for StubRuntime {
    fn is_format_supported(&self, format: &FormatSpec) -> bool {
        self.supported.iter().any(|m| m == format.mime())
    }
}

#[async_trait::async_trait]
impl MediaRuntime for StubRuntime {
    type Audio = StubAudio;
    type Surface = RecordingSurface;

    fn capture_surface(&self, _surface: &RecordingSurface, _fps: u32) -> LyriclipResult<MediaStream> {
        Ok(self.track(MediaTrack::video("canvas")))
    }

    fn tap_audio_graph(&self, _audio: &StubAudio) -> Option<LyriclipResult<MediaStream>> {
        if self.graph_tap.load(Ordering::SeqCst) {
            Some(Ok(self.track(MediaTrack::audio("graph-tap"))))
        } else {
            None
        }
    }

    fn open_encoder(
        &self,
        _stream: &MediaStream,
        format: Option<&FormatSpec>,
    ) -> LyriclipResult<Box<dyn Encoder>> {
        self.opened
            .lock()
            .unwrap()
            .push(format.map(|f| f.mime().to_string()));
        Ok(Box::new(StubEncoder {
            plan: self.plan.lock().unwrap().clone(),
            stop: Arc::new(Notify::new()),
        }))
    }
}

pub struct Rig {
    pub controller: Arc<RecordingController<StubRuntime>>,
    pub runtime: Arc<StubRuntime>,
    pub audio: Arc<StubAudio>,
}

pub fn rig(runtime: StubRuntime, audio: StubAudio) -> Rig {
    let runtime = Arc::new(runtime);
    let audio = Arc::new(audio);
    let controller = Arc::new(RecordingController::new(
        runtime.clone(),
        Arc::new(RecordingSurface::default()),
        audio.clone(),
    ));
    Rig {
        controller,
        runtime,
        audio,
    }
}

pub fn config(duration_secs: f64) -> RecordingConfig {
    RecordingConfig {
        duration_secs,
        start_secs: 2.0,
        ..Default::default()
    }
}
