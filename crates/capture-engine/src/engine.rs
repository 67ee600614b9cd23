//! The lyric capture engine: preview and recording over one surface and one
//! audio element.

use std::sync::{Arc, Mutex};

use lyriclip_common::error::{LyriclipError, LyriclipResult};
use lyriclip_lyric_model::{StyleConfig, Timeline};
use lyriclip_render_engine::{
    Compositor, FrameComposition, FrameLoop, FrameLoopStats, FrameRenderer, FrameScheduler,
    LayoutMetrics, PlaybackPosition, SharedStyle, SharedTimeline, Surface, TextMeasure,
};
use tokio::task::JoinHandle;

use crate::runtime::{AudioElement, MediaRuntime};
use crate::session::{RecordingConfig, RecordingController, RecordingOutput, SessionHandle};

/// Configures a [`LyricCaptureEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    style: StyleConfig,
    metrics: LayoutMetrics,
    measure: Option<Arc<dyn TextMeasure>>,
    lyrics: Option<String>,
    recording: RecordingConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(mut self, style: StyleConfig) -> Self {
        self.style = style;
        self
    }

    pub fn metrics(mut self, metrics: LayoutMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn text_measure(mut self, measure: Arc<dyn TextMeasure>) -> Self {
        self.measure = Some(measure);
        self
    }

    /// Initial timed-lyric text.
    pub fn lyrics(mut self, raw: impl Into<String>) -> Self {
        self.lyrics = Some(raw.into());
        self
    }

    /// Defaults used by [`LyricCaptureEngine::record`].
    pub fn recording(mut self, config: RecordingConfig) -> Self {
        self.recording = config;
        self
    }

    pub fn build<R: MediaRuntime>(
        self,
        runtime: Arc<R>,
        surface: Arc<R::Surface>,
        audio: Arc<R::Audio>,
    ) -> LyricCaptureEngine<R> {
        let timeline = match &self.lyrics {
            Some(raw) => SharedTimeline::new(Timeline::parse(raw)),
            None => SharedTimeline::default(),
        };

        let mut compositor = Compositor::new(self.metrics);
        if let Some(measure) = self.measure {
            compositor = compositor.with_measure(measure);
        }

        let controller = Arc::new(RecordingController::new(
            runtime.clone(),
            surface.clone(),
            audio.clone(),
        ));

        tracing::debug!(
            entries = timeline.snapshot().len(),
            size = ?surface.size(),
            "Lyric capture engine built"
        );

        LyricCaptureEngine {
            runtime,
            surface,
            audio,
            timeline,
            style: SharedStyle::new(self.style),
            compositor,
            controller,
            preview: Mutex::new(None),
            recording: self.recording,
        }
    }
}

/// Owns the timeline and style cells, the frame loop and the recording
/// controller.
///
/// Dropping the engine cancels the frame loop and asks any active session to
/// stop.
pub struct LyricCaptureEngine<R: MediaRuntime> {
    runtime: Arc<R>,
    surface: Arc<R::Surface>,
    audio: Arc<R::Audio>,
    timeline: SharedTimeline,
    style: SharedStyle,
    compositor: Compositor,
    controller: Arc<RecordingController<R>>,
    preview: Mutex<Option<FrameLoop>>,
    recording: RecordingConfig,
}

impl<R: MediaRuntime> LyricCaptureEngine<R> {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn surface(&self) -> &Arc<R::Surface> {
        &self.surface
    }

    pub fn audio(&self) -> &Arc<R::Audio> {
        &self.audio
    }

    /// Replace the lyrics. Returns the number of entries accepted.
    ///
    /// Takes effect from the next frame, including during a recording.
    pub fn set_lyrics(&self, raw: &str) -> usize {
        let count = self.timeline.set_raw(raw);
        tracing::info!(entries = count, "Lyrics updated");
        count
    }

    pub fn timeline(&self) -> Arc<Timeline> {
        self.timeline.snapshot()
    }

    pub fn set_style(&self, style: StyleConfig) {
        self.style.set(style);
    }

    pub fn update_style(&self, f: impl FnOnce(&mut StyleConfig)) {
        self.style.update(f);
    }

    pub fn style(&self) -> StyleConfig {
        self.style.get()
    }

    fn renderer(&self) -> FrameRenderer {
        let position: Arc<dyn PlaybackPosition> = self.audio.clone();
        let surface: Arc<dyn Surface> = self.surface.clone();
        FrameRenderer::new(
            self.compositor.clone(),
            self.timeline.clone(),
            self.style.clone(),
            position,
            surface,
        )
    }

    /// Compose and present one frame at the current playback position.
    pub fn render_frame(&self) -> LyriclipResult<FrameComposition> {
        self.renderer().render_once()
    }

    /// Start the frame loop. Fails if one is already running.
    pub fn start_preview<S>(&self, scheduler: S) -> LyriclipResult<()>
    where
        S: FrameScheduler + 'static,
    {
        let mut preview = self.preview.lock().unwrap_or_else(|e| e.into_inner());
        if preview.as_ref().is_some_and(|l| !l.is_finished()) {
            return Err(LyriclipError::render("preview is already running"));
        }
        *preview = Some(FrameLoop::spawn(self.renderer(), scheduler));
        tracing::info!("Preview started");
        Ok(())
    }

    pub fn is_previewing(&self) -> bool {
        self.preview
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|l| !l.is_finished())
    }

    /// Cancel the frame loop and wait for it to end.
    pub async fn stop_preview(&self) -> Option<FrameLoopStats> {
        let frame_loop = self
            .preview
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        frame_loop.cancel();
        let stats = frame_loop.join().await;
        tracing::info!(
            frames = stats.frames_presented,
            errors = stats.present_errors,
            "Preview stopped"
        );
        Some(stats)
    }

    /// Move playback for previewing. Rejected while a session is active.
    pub fn seek_preview(&self, secs: f64) -> LyriclipResult<()> {
        let state = self.controller.state();
        if state.is_active() {
            return Err(LyriclipError::session(format!(
                "cannot seek while {state}"
            )));
        }
        self.audio.seek(secs)
    }

    /// Record with the configured defaults.
    pub async fn record(&self) -> LyriclipResult<RecordingOutput> {
        self.controller.record(&self.recording).await
    }

    pub async fn record_with(&self, config: &RecordingConfig) -> LyriclipResult<RecordingOutput> {
        self.controller.record(config).await
    }

    /// Run a recording on its own task.
    pub fn spawn_recording(
        &self,
        config: RecordingConfig,
    ) -> JoinHandle<LyriclipResult<RecordingOutput>> {
        let controller = self.controller.clone();
        tokio::spawn(async move { controller.record(&config).await })
    }

    /// Session state and stop control.
    pub fn handle(&self) -> SessionHandle {
        self.controller.handle()
    }

    pub fn recording_defaults(&self) -> &RecordingConfig {
        &self.recording
    }

    /// Stop the preview and bring any active session to a terminal state.
    pub async fn shutdown(&self) {
        self.stop_preview().await;

        let handle = self.handle();
        if handle.is_active() {
            handle.request_stop();
            handle.wait_until_settled().await;
        }
        tracing::info!(state = %handle.state(), "Engine shut down");
    }
}

impl<R: MediaRuntime> Drop for LyricCaptureEngine<R> {
    fn drop(&mut self) {
        if let Some(frame_loop) = self
            .preview
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            frame_loop.cancel();
        }
        self.controller.handle().request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FormatProbe, FormatSpec};
    use crate::media::MediaStream;
    use crate::runtime::Encoder;
    use lyriclip_render_engine::{ManualPosition, RecordingSurface, SurfaceSize};

    struct PreviewAudio(ManualPosition);

    impl PlaybackPosition for PreviewAudio {
        fn current_time(&self) -> f64 {
            self.0.current_time()
        }
    }

    #[async_trait::async_trait]
    impl AudioElement for PreviewAudio {
        fn is_metadata_loaded(&self) -> bool {
            true
        }
        async fn wait_for_metadata(&self) -> LyriclipResult<()> {
            Ok(())
        }
        fn seek(&self, secs: f64) -> LyriclipResult<()> {
            self.0.set(secs);
            Ok(())
        }
        async fn play(&self) -> LyriclipResult<()> {
            Ok(())
        }
        fn pause(&self) {}
        fn is_paused(&self) -> bool {
            true
        }
    }

    struct PreviewRuntime;

    impl FormatProbe for PreviewRuntime {
        fn is_format_supported(&self, _format: &FormatSpec) -> bool {
            false
        }
    }

    #[async_trait::async_trait]
    impl MediaRuntime for PreviewRuntime {
        type Audio = PreviewAudio;
        type Surface = RecordingSurface;

        fn capture_surface(&self, _s: &RecordingSurface, _fps: u32) -> LyriclipResult<MediaStream> {
            Err(LyriclipError::unsupported("preview only"))
        }

        fn tap_audio_graph(&self, _a: &PreviewAudio) -> Option<LyriclipResult<MediaStream>> {
            None
        }

        fn open_encoder(
            &self,
            _stream: &MediaStream,
            _format: Option<&FormatSpec>,
        ) -> LyriclipResult<Box<dyn Encoder>> {
            Err(LyriclipError::unsupported("preview only"))
        }
    }

    fn engine() -> LyricCaptureEngine<PreviewRuntime> {
        EngineBuilder::new()
            .lyrics("[00:01.00]first\n[00:03.00]second")
            .build(
                Arc::new(PreviewRuntime),
                Arc::new(RecordingSurface::new(SurfaceSize::new(640, 360))),
                Arc::new(PreviewAudio(ManualPosition::new(0.0))),
            )
    }

    #[test]
    fn test_render_frame_follows_seek_and_lyrics() {
        let engine = engine();
        engine.seek_preview(1.5).unwrap();
        assert_eq!(engine.render_frame().unwrap().active_index(), Some(0));

        engine.set_lyrics("[00:00.50]replaced");
        let frame = engine.render_frame().unwrap();
        assert_eq!(frame.active_index(), Some(0));
        assert!(frame.texts().any(|t| t == "replaced"));
        assert_eq!(engine.surface().frames_presented(), 2);
    }

    #[test]
    fn test_style_changes_reach_next_frame() {
        let engine = engine();
        engine.update_style(|s| s.background_color = lyriclip_lyric_model::Color::WHITE);
        let frame = engine.render_frame().unwrap();
        match &frame.commands[0] {
            lyriclip_render_engine::DrawCommand::FillRect { color, .. } => {
                assert_eq!(*color, lyriclip_lyric_model::Color::WHITE)
            }
            other => panic!("unexpected first command {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_recording_leaves_engine_usable() {
        let engine = engine();
        let err = engine.record().await.unwrap_err();
        assert!(err.to_string().contains("preview only"));
        assert_eq!(engine.handle().state(), crate::session::RecordingState::Error);

        // Error is idle-equivalent for seeking.
        engine.seek_preview(3.5).unwrap();
        assert_eq!(engine.render_frame().unwrap().active_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_loop_runs_until_stopped() {
        let engine = engine();
        engine
            .start_preview(lyriclip_render_engine::DisplayLinkScheduler::new(60))
            .unwrap();
        assert!(engine.start_preview(lyriclip_render_engine::DisplayLinkScheduler::new(60)).is_err());

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let stats = engine.stop_preview().await.unwrap();
        assert!(stats.frames_presented >= 5);
        assert!(!engine.is_previewing());
        assert!(engine.stop_preview().await.is_none());
    }
}
