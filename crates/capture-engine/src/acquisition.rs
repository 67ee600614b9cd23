//! Stream acquisition: video from the surface, audio from the first capture
//! path that applies.

use std::fmt;

use lyriclip_common::error::{LyriclipError, LyriclipResult};
use serde::Serialize;

use crate::media::MediaStream;
use crate::runtime::{AudioElement, MediaRuntime};

/// Ways to capture the audio element, tried in [`AudioCaptureStrategy::CHAIN`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCaptureStrategy {
    /// The element's own capture method.
    DirectCapture,
    /// A vendor-prefixed capture method.
    LegacyCapture,
    /// Tee the element through the runtime's signal graph.
    GraphTap,
}

impl AudioCaptureStrategy {
    pub const CHAIN: [AudioCaptureStrategy; 3] = [
        AudioCaptureStrategy::DirectCapture,
        AudioCaptureStrategy::LegacyCapture,
        AudioCaptureStrategy::GraphTap,
    ];

    /// Try this strategy. `None` means it does not apply here.
    pub fn attempt<R: MediaRuntime>(
        &self,
        runtime: &R,
        audio: &R::Audio,
    ) -> Option<LyriclipResult<MediaStream>> {
        match self {
            AudioCaptureStrategy::DirectCapture => audio.capture_stream(),
            AudioCaptureStrategy::LegacyCapture => audio.legacy_capture_stream(),
            AudioCaptureStrategy::GraphTap => runtime.tap_audio_graph(audio),
        }
    }
}

impl fmt::Display for AudioCaptureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioCaptureStrategy::DirectCapture => "direct",
            AudioCaptureStrategy::LegacyCapture => "legacy",
            AudioCaptureStrategy::GraphTap => "graph-tap",
        };
        f.write_str(name)
    }
}

/// Streams held by one recording session.
#[derive(Debug, Clone)]
pub struct AcquiredStreams {
    pub video: MediaStream,
    pub audio: MediaStream,
    /// Which strategy produced `audio`.
    pub audio_path: AudioCaptureStrategy,
}

impl AcquiredStreams {
    /// Video tracks of the video stream plus audio tracks of the audio stream.
    pub fn combined(&self) -> MediaStream {
        MediaStream::mux(&self.video, &self.audio)
    }

    /// Stop every acquired track.
    pub fn release(&self) {
        self.video.stop_all();
        self.audio.stop_all();
    }
}

/// Capture audio through the first strategy that applies.
///
/// A strategy that applies but fails ends the search with its error.
pub fn acquire_audio<R: MediaRuntime>(
    runtime: &R,
    audio: &R::Audio,
) -> LyriclipResult<(MediaStream, AudioCaptureStrategy)> {
    for strategy in AudioCaptureStrategy::CHAIN {
        match strategy.attempt(runtime, audio) {
            None => {
                tracing::debug!(%strategy, "Audio capture path not available");
            }
            Some(Ok(stream)) => {
                tracing::info!(%strategy, tracks = stream.tracks().len(), "Audio captured");
                return Ok((stream, strategy));
            }
            Some(Err(e)) => {
                tracing::warn!(%strategy, error = %e, "Audio capture path failed");
                return Err(e);
            }
        }
    }

    Err(LyriclipError::acquisition(
        "no audio capture path available (direct, legacy and graph tap all unsupported)",
    ))
}

/// Acquire the surface video stream and the audio stream.
///
/// If audio acquisition fails the video stream is released before the error
/// is returned.
pub fn acquire<R: MediaRuntime>(
    runtime: &R,
    surface: &R::Surface,
    audio: &R::Audio,
    fps: u32,
) -> LyriclipResult<AcquiredStreams> {
    let video = runtime.capture_surface(surface, fps)?;
    tracing::debug!(fps, tracks = video.tracks().len(), "Surface capture started");

    match acquire_audio(runtime, audio) {
        Ok((audio, audio_path)) => Ok(AcquiredStreams {
            video,
            audio,
            audio_path,
        }),
        Err(e) => {
            video.stop_all();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FormatProbe, FormatSpec};
    use crate::media::MediaTrack;
    use crate::runtime::Encoder;
    use lyriclip_render_engine::{PlaybackPosition, RecordingSurface};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAudio {
        direct: Option<bool>,
        legacy: Option<bool>,
    }

    fn outcome(ok: Option<bool>, label: &str) -> Option<LyriclipResult<MediaStream>> {
        ok.map(|ok| {
            if ok {
                Ok(MediaStream::new(vec![MediaTrack::audio(label)]))
            } else {
                Err(LyriclipError::acquisition(format!("{label} broke")))
            }
        })
    }

    impl PlaybackPosition for FakeAudio {
        fn current_time(&self) -> f64 {
            0.0
        }
    }

    #[async_trait::async_trait]
    impl AudioElement for FakeAudio {
        fn is_metadata_loaded(&self) -> bool {
            true
        }
        async fn wait_for_metadata(&self) -> LyriclipResult<()> {
            Ok(())
        }
        fn seek(&self, _secs: f64) -> LyriclipResult<()> {
            Ok(())
        }
        async fn play(&self) -> LyriclipResult<()> {
            Ok(())
        }
        fn pause(&self) {}
        fn is_paused(&self) -> bool {
            true
        }
        fn capture_stream(&self) -> Option<LyriclipResult<MediaStream>> {
            outcome(self.direct, "direct")
        }
        fn legacy_capture_stream(&self) -> Option<LyriclipResult<MediaStream>> {
            outcome(self.legacy, "legacy")
        }
    }

    #[derive(Default)]
    struct FakeRuntime {
        graph: Option<bool>,
        video_tracks: Mutex<Vec<MediaTrack>>,
    }

    impl FormatProbe for FakeRuntime {
        fn is_format_supported(&self, _format: &FormatSpec) -> bool {
            false
        }
    }

    #[async_trait::async_trait]
    impl MediaRuntime for FakeRuntime {
        type Audio = FakeAudio;
        type Surface = RecordingSurface;

        fn capture_surface(&self, _surface: &RecordingSurface, _fps: u32) -> LyriclipResult<MediaStream> {
            let track = MediaTrack::video("canvas");
            self.video_tracks.lock().unwrap().push(track.clone());
            Ok(MediaStream::new(vec![track]))
        }

        fn tap_audio_graph(&self, _audio: &FakeAudio) -> Option<LyriclipResult<MediaStream>> {
            outcome(self.graph, "graph")
        }

        fn open_encoder(
            &self,
            _stream: &MediaStream,
            _format: Option<&FormatSpec>,
        ) -> LyriclipResult<Box<dyn Encoder>> {
            Err(LyriclipError::unsupported("no encoder in this test"))
        }
    }

    fn run(runtime: &FakeRuntime, audio: &FakeAudio) -> LyriclipResult<AcquiredStreams> {
        acquire(runtime, &RecordingSurface::default(), audio, 30)
    }

    #[test]
    fn test_direct_capture_preferred() {
        let audio = FakeAudio {
            direct: Some(true),
            legacy: Some(true),
        };
        let runtime = FakeRuntime {
            graph: Some(true),
            ..Default::default()
        };
        let streams = run(&runtime, &audio).unwrap();
        assert_eq!(streams.audio_path, AudioCaptureStrategy::DirectCapture);
        assert_eq!(streams.audio.tracks()[0].label(), "direct");
    }

    #[test]
    fn test_falls_through_to_graph_tap() {
        let runtime = FakeRuntime {
            graph: Some(true),
            ..Default::default()
        };
        let streams = run(&runtime, &FakeAudio::default()).unwrap();
        assert_eq!(streams.audio_path, AudioCaptureStrategy::GraphTap);

        let combined = streams.combined();
        assert_eq!(combined.video_tracks().count(), 1);
        assert_eq!(combined.audio_tracks().count(), 1);
    }

    #[test]
    fn test_available_but_failing_path_stops_the_chain() {
        let audio = FakeAudio {
            direct: None,
            legacy: Some(false),
        };
        let runtime = FakeRuntime {
            graph: Some(true),
            ..Default::default()
        };
        let err = run(&runtime, &audio).unwrap_err();
        assert!(err.to_string().contains("legacy broke"));
        assert!(runtime.video_tracks.lock().unwrap().iter().all(|t| !t.is_active()));
    }

    #[test]
    fn test_no_path_releases_video() {
        let runtime = FakeRuntime::default();
        let err = run(&runtime, &FakeAudio::default()).unwrap_err();
        assert!(matches!(err, LyriclipError::Acquisition { .. }));

        let tracks = runtime.video_tracks.lock().unwrap();
        assert_eq!(tracks.len(), 1);
        assert!(!tracks[0].is_active());
    }
}
