//! Recording lifecycle management.
//!
//! ```text
//! Idle ──start──▶ Preparing ──▶ Recording ──timer/stop──▶ Finalizing ──▶ Idle
//!                     │              │
//!                     └──failure─────┴──────────────────▶ Error ──start──▶ Preparing
//! ```
//!
//! One session at a time per controller. Every path out of a session stops
//! all acquired tracks and pauses the audio element.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lyriclip_common::clock::{DriftMeasurement, RecordingClock};
use lyriclip_common::config::RecordingDefaults;
use lyriclip_common::error::{LyriclipError, LyriclipResult};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Notify};

use crate::acquisition::{acquire, AcquiredStreams, AudioCaptureStrategy};
use crate::codec::{default_candidates, extension_for_mime, negotiate, FormatSpec, FALLBACK_MIME};
use crate::media::MediaStream;
use crate::runtime::{AudioElement, Encoder, EncoderEvent, MediaRuntime};

/// Drift between audio progress and wall-clock time worth a warning.
const DRIFT_WARN_MS: f64 = 100.0;

/// State of the recording controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    /// No session.
    Idle,
    /// Acquiring streams and starting playback.
    Preparing,
    /// Encoder running.
    Recording,
    /// Draining the encoder and assembling output.
    Finalizing,
    /// The last session failed. A new session may be started.
    Error,
}

impl RecordingState {
    /// Whether a session currently exists.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RecordingState::Preparing | RecordingState::Recording | RecordingState::Finalizing
        )
    }

    /// Whether a new session may start from this state.
    pub fn can_start(self) -> bool {
        matches!(self, RecordingState::Idle | RecordingState::Error)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingState::Idle => "idle",
            RecordingState::Preparing => "preparing",
            RecordingState::Recording => "recording",
            RecordingState::Finalizing => "finalizing",
            RecordingState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Parameters of one recording.
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Surface capture rate.
    pub fps: u32,

    /// Audio position the clip starts at.
    pub start_secs: f64,

    /// Clip length; the session stops on its own after this long.
    pub duration_secs: f64,

    /// Output file name without extension.
    pub file_base_name: String,

    /// Output formats in preference order.
    pub candidates: Vec<FormatSpec>,

    /// Upper bound on waiting for the encoder to flush after a stop.
    pub drain_timeout: Duration,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            start_secs: 0.0,
            duration_secs: 30.0,
            file_base_name: "lyric-clip".to_string(),
            candidates: default_candidates(),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl RecordingConfig {
    /// Build from the application defaults.
    pub fn from_defaults(defaults: &RecordingDefaults) -> Self {
        Self {
            fps: defaults.fps,
            duration_secs: defaults.duration_secs,
            file_base_name: defaults.file_base_name.clone(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> LyriclipResult<()> {
        if self.fps == 0 {
            return Err(LyriclipError::config("fps must be at least 1"));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(LyriclipError::config(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration_secs
            )));
        }
        if !self.start_secs.is_finite() || self.start_secs < 0.0 {
            return Err(LyriclipError::config(format!(
                "start time must be zero or positive, got {}",
                self.start_secs
            )));
        }
        if self.file_base_name.trim().is_empty() {
            return Err(LyriclipError::config("file base name must not be empty"));
        }
        Ok(())
    }
}

/// Why a session left the recording state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum StopReason {
    /// The clip duration elapsed.
    DurationElapsed,
    /// Someone asked the session to stop.
    Requested,
    /// The encoder finished on its own.
    EncoderEnded,
    /// The encoder reported an error.
    EncoderFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::DurationElapsed => f.write_str("duration elapsed"),
            StopReason::Requested => f.write_str("stop requested"),
            StopReason::EncoderEnded => f.write_str("encoder ended"),
            StopReason::EncoderFailed(message) => write!(f, "encoder failed: {message}"),
        }
    }
}

/// A finished (or partial) recording.
#[derive(Debug, Clone)]
pub struct RecordingOutput {
    /// All non-empty encoder chunks, concatenated in arrival order.
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
    /// `<file_base_name>.<extension>`.
    pub file_name: String,
    pub chunk_count: usize,
    /// Wall-clock time spent recording.
    pub duration_secs: f64,
    /// Wall-clock start (RFC 3339).
    pub started_at: String,
    pub audio_path: AudioCaptureStrategy,
    pub stop_reason: StopReason,
}

impl RecordingOutput {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Everything but the bytes.
    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            bytes: self.bytes.len(),
            chunk_count: self.chunk_count,
            duration_secs: self.duration_secs,
            started_at: self.started_at.clone(),
            audio_path: self.audio_path,
            stop_reason: self.stop_reason.clone(),
        }
    }

    /// Write the recording into `dir` under [`file_name`](Self::file_name).
    pub fn save_to(&self, dir: &Path) -> LyriclipResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = self.bytes.len(),
            mime = %self.mime_type,
            "Recording saved"
        );
        Ok(path)
    }
}

/// Serializable description of a [`RecordingOutput`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSummary {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: usize,
    pub chunk_count: usize,
    pub duration_secs: f64,
    pub started_at: String,
    pub audio_path: AudioCaptureStrategy,
    pub stop_reason: StopReason,
}

/// MIME type of the output: encoder-reported, else negotiated, else WebM.
pub fn resolve_mime(reported: Option<String>, negotiated: Option<&FormatSpec>) -> String {
    reported
        .filter(|mime| !mime.trim().is_empty())
        .or_else(|| negotiated.map(|f| f.mime().to_string()))
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

#[derive(Clone)]
struct SessionSignal {
    id: u64,
    stop: Arc<Notify>,
}

struct ControllerInner {
    state: RecordingState,
    session: Option<SessionSignal>,
    next_session_id: u64,
    partial: Option<RecordingOutput>,
    last_error: Option<String>,
}

struct ControllerShared {
    inner: Mutex<ControllerInner>,
    state_tx: watch::Sender<RecordingState>,
}

impl ControllerShared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(RecordingState::Idle);
        Self {
            inner: Mutex::new(ControllerInner {
                state: RecordingState::Idle,
                session: None,
                next_session_id: 0,
                partial: None,
                last_error: None,
            }),
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, inner: &mut ControllerInner, state: RecordingState) {
        let previous = inner.state;
        inner.state = state;
        self.state_tx.send_replace(state);
        tracing::debug!(from = %previous, to = %state, "Recording state changed");
    }
}

/// Cloneable view of a controller: state queries and stop requests.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<ControllerShared>,
}

impl SessionHandle {
    pub fn state(&self) -> RecordingState {
        self.shared.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Ask the current session to stop.
    ///
    /// Returns `false` (and does nothing) when there is no session to stop,
    /// or it is already finalizing. A request made while preparing ends the
    /// session as soon as it starts recording.
    pub fn request_stop(&self) -> bool {
        let inner = self.shared.lock();
        match (inner.state, inner.session.as_ref()) {
            (RecordingState::Preparing | RecordingState::Recording, Some(signal)) => {
                signal.stop.notify_one();
                tracing::info!(session = signal.id, state = %inner.state, "Stop requested");
                true
            }
            (state, _) => {
                tracing::debug!(%state, "Stop request ignored");
                false
            }
        }
    }

    /// Output salvaged from the last failed session, if any.
    pub fn take_partial_output(&self) -> Option<RecordingOutput> {
        self.shared.lock().partial.take()
    }

    /// Error message of the last failed session.
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<RecordingState> {
        self.shared.state_tx.subscribe()
    }

    /// Resolve once no session is active.
    pub async fn wait_until_settled(&self) {
        let mut rx = self.subscribe();
        loop {
            if !rx.borrow_and_update().is_active() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Releases session resources on every exit path, including cancellation.
struct SessionGuard<A: AudioElement> {
    shared: Arc<ControllerShared>,
    audio: Arc<A>,
    session_id: u64,
    streams: Vec<MediaStream>,
    settled: bool,
}

impl<A: AudioElement> SessionGuard<A> {
    fn new(shared: Arc<ControllerShared>, audio: Arc<A>, session_id: u64) -> Self {
        Self {
            shared,
            audio,
            session_id,
            streams: Vec::new(),
            settled: false,
        }
    }

    fn hold(&mut self, streams: &AcquiredStreams) {
        self.streams.push(streams.video.clone());
        self.streams.push(streams.audio.clone());
    }

    fn release(&mut self) {
        for stream in self.streams.drain(..) {
            stream.stop_all();
        }
        self.audio.pause();
    }

    fn finish(
        mut self,
        state: RecordingState,
        error: Option<String>,
        partial: Option<RecordingOutput>,
    ) {
        self.release();
        self.settle(state, error, partial);
    }

    fn settle(
        &mut self,
        state: RecordingState,
        error: Option<String>,
        partial: Option<RecordingOutput>,
    ) {
        let mut inner = self.shared.lock();
        if inner.session.as_ref().map(|s| s.id) == Some(self.session_id) {
            inner.session = None;
        }
        inner.last_error = error;
        inner.partial = partial;
        self.shared.set_state(&mut inner, state);
        self.settled = true;
    }
}

impl<A: AudioElement> Drop for SessionGuard<A> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(session = self.session_id, "Recording session aborted");
            self.release();
            self.settle(
                RecordingState::Error,
                Some("recording session aborted".to_string()),
                None,
            );
        }
    }
}

struct Prepared {
    streams: AcquiredStreams,
    format: Option<FormatSpec>,
    encoder: Box<dyn Encoder>,
    events: mpsc::UnboundedReceiver<EncoderEvent>,
}

/// Drives recording sessions over one surface and one audio element.
pub struct RecordingController<R: MediaRuntime> {
    runtime: Arc<R>,
    surface: Arc<R::Surface>,
    audio: Arc<R::Audio>,
    shared: Arc<ControllerShared>,
}

impl<R: MediaRuntime> RecordingController<R> {
    pub fn new(runtime: Arc<R>, surface: Arc<R::Surface>, audio: Arc<R::Audio>) -> Self {
        Self {
            runtime,
            surface,
            audio,
            shared: Arc::new(ControllerShared::new()),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.shared.lock().state
    }

    /// Run one recording session to completion.
    ///
    /// Rejected without side effects while another session is active.
    pub async fn record(&self, config: &RecordingConfig) -> LyriclipResult<RecordingOutput> {
        config.validate()?;
        let signal = self.begin()?;
        let mut guard = SessionGuard::new(self.shared.clone(), self.audio.clone(), signal.id);

        tracing::info!(
            session = signal.id,
            fps = config.fps,
            start_secs = config.start_secs,
            duration_secs = config.duration_secs,
            "Preparing recording session"
        );

        let prepared = match self.prepare(config, &mut guard).await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!(session = signal.id, error = %e, "Recording failed to start");
                guard.finish(RecordingState::Error, Some(e.to_string()), None);
                return Err(e);
            }
        };

        self.run(config, signal, guard, prepared).await
    }

    fn begin(&self) -> LyriclipResult<SessionSignal> {
        let mut inner = self.shared.lock();
        if !inner.state.can_start() {
            return Err(LyriclipError::session(format!(
                "cannot start a recording while {}",
                inner.state
            )));
        }

        inner.next_session_id += 1;
        let signal = SessionSignal {
            id: inner.next_session_id,
            stop: Arc::new(Notify::new()),
        };
        inner.session = Some(signal.clone());
        inner.partial = None;
        inner.last_error = None;
        self.shared.set_state(&mut inner, RecordingState::Preparing);
        Ok(signal)
    }

    async fn prepare(
        &self,
        config: &RecordingConfig,
        guard: &mut SessionGuard<R::Audio>,
    ) -> LyriclipResult<Prepared> {
        self.runtime.fonts_ready().await;

        let streams = acquire(
            self.runtime.as_ref(),
            self.surface.as_ref(),
            self.audio.as_ref(),
            config.fps,
        )?;
        guard.hold(&streams);

        let format = negotiate(&config.candidates, self.runtime.as_ref());
        let mut encoder = self
            .runtime
            .open_encoder(&streams.combined(), format.as_ref())?;

        if !self.audio.is_metadata_loaded() {
            tracing::debug!("Waiting for audio metadata");
            self.audio.wait_for_metadata().await?;
        }
        if let Some(total) = self.audio.duration() {
            if config.start_secs >= total {
                return Err(LyriclipError::config(format!(
                    "start time {:.2}s is past the end of the audio ({total:.2}s)",
                    config.start_secs
                )));
            }
        }
        self.audio.seek(config.start_secs)?;
        self.audio.play().await?;

        let (tx, events) = mpsc::unbounded_channel();
        encoder.start(tx).await?;

        Ok(Prepared {
            streams,
            format,
            encoder,
            events,
        })
    }

    async fn run(
        &self,
        config: &RecordingConfig,
        signal: SessionSignal,
        guard: SessionGuard<R::Audio>,
        prepared: Prepared,
    ) -> LyriclipResult<RecordingOutput> {
        let Prepared {
            streams,
            format,
            mut encoder,
            mut events,
        } = prepared;

        {
            let mut inner = self.shared.lock();
            self.shared.set_state(&mut inner, RecordingState::Recording);
        }

        let clock = RecordingClock::start();
        let started = tokio::time::Instant::now();
        let audio_start = self.audio.current_time();
        tracing::info!(
            session = signal.id,
            epoch_wall = %clock.epoch_wall(),
            format = format.as_ref().map(FormatSpec::mime).unwrap_or("runtime default"),
            audio_path = %streams.audio_path,
            "Recording started"
        );

        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let timer = tokio::time::sleep(
            Duration::try_from_secs_f64(config.duration_secs).unwrap_or(Duration::ZERO),
        );
        tokio::pin!(timer);

        let reason = loop {
            tokio::select! {
                _ = &mut timer => break StopReason::DurationElapsed,
                _ = signal.stop.notified() => break StopReason::Requested,
                event = events.recv() => match event {
                    Some(EncoderEvent::Chunk(bytes)) => push_chunk(&mut chunks, bytes),
                    Some(EncoderEvent::Error(message)) => break StopReason::EncoderFailed(message),
                    Some(EncoderEvent::Stopped) | None => break StopReason::EncoderEnded,
                },
            }
        };

        {
            let mut inner = self.shared.lock();
            self.shared.set_state(&mut inner, RecordingState::Finalizing);
        }
        tracing::info!(session = signal.id, %reason, "Finalizing recording");

        let wall_secs = started.elapsed().as_secs_f64();
        log_drift(self.audio.current_time() - audio_start, wall_secs);

        encoder.request_stop();
        self.audio.pause();

        let mut failure = match &reason {
            StopReason::EncoderFailed(message) => Some(message.clone()),
            _ => None,
        };

        if reason != StopReason::EncoderEnded {
            match tokio::time::timeout(config.drain_timeout, drain(&mut events, &mut chunks)).await
            {
                Ok(None) => {}
                Ok(Some(message)) => {
                    tracing::warn!(error = %message, "Encoder failed while draining");
                    failure.get_or_insert(message);
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = config.drain_timeout.as_secs_f64(),
                        "Encoder drain timed out; output may be truncated"
                    );
                }
            }
        }

        let mime_type = resolve_mime(encoder.mime_type(), format.as_ref());
        drop(encoder);

        let extension = extension_for_mime(&mime_type).to_string();
        let output = RecordingOutput {
            bytes: chunks.concat(),
            file_name: format!("{}.{extension}", config.file_base_name),
            mime_type,
            extension,
            chunk_count: chunks.len(),
            duration_secs: wall_secs,
            started_at: clock.epoch_wall().to_string(),
            audio_path: streams.audio_path,
            stop_reason: reason,
        };

        match failure {
            Some(message) => {
                tracing::error!(
                    session = signal.id,
                    error = %message,
                    partial_bytes = output.bytes.len(),
                    "Recording failed; partial output kept"
                );
                guard.finish(RecordingState::Error, Some(message.clone()), Some(output));
                Err(LyriclipError::encoder(message))
            }
            None => {
                tracing::info!(
                    session = signal.id,
                    bytes = output.bytes.len(),
                    chunks = output.chunk_count,
                    mime = %output.mime_type,
                    duration_secs = output.duration_secs,
                    "Recording finished"
                );
                guard.finish(RecordingState::Idle, None, None);
                Ok(output)
            }
        }
    }
}

fn push_chunk(chunks: &mut Vec<Vec<u8>>, bytes: Vec<u8>) {
    if !bytes.is_empty() {
        chunks.push(bytes);
    }
}

/// Collect chunks until the encoder reports completion. Returns an encoder
/// error message if one arrives first.
async fn drain(
    events: &mut mpsc::UnboundedReceiver<EncoderEvent>,
    chunks: &mut Vec<Vec<u8>>,
) -> Option<String> {
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Chunk(bytes) => push_chunk(chunks, bytes),
            EncoderEvent::Stopped => return None,
            EncoderEvent::Error(message) => return Some(message),
        }
    }
    None
}

fn log_drift(audio_progress_secs: f64, wall_secs: f64) {
    let measurement = DriftMeasurement::from_secs(wall_secs, audio_progress_secs.max(0.0));
    let drift_ms = measurement.drift_ms();
    if measurement.exceeds_threshold_ms(DRIFT_WARN_MS) {
        tracing::warn!(drift_ms, "Audio drifted from wall clock by more than 100ms");
    } else {
        tracing::info!(drift_ms, "Audio drift within threshold");
    }
}
