mod support;

use std::sync::Arc;
use std::time::Duration;

use lyriclip_capture_engine::{AudioElement, EngineBuilder, RecordingState, SessionHandle, StopReason};
use lyriclip_common::error::LyriclipError;
use lyriclip_render_engine::{PlaybackPosition, RecordingSurface};
use support::{config, rig, EncoderPlan, StubAudio, StubRuntime, CHUNK_SIZE, FLUSH_CHUNK};

async fn wait_for_state(handle: &SessionHandle, state: RecordingState) {
    let mut rx = handle.subscribe();
    rx.wait_for(|s| *s == state)
        .await
        .expect("controller dropped");
}

#[tokio::test(start_paused = true)]
async fn full_duration_recording_returns_to_idle() {
    let rig = rig(
        StubRuntime::new().with_plan(EncoderPlan {
            chunk_every: Duration::from_millis(300),
            reported_mime: Some("video/webm;codecs=vp8,opus".into()),
            ..Default::default()
        }),
        StubAudio::new(),
    );

    let output = rig.controller.record(&config(1.0)).await.unwrap();

    assert_eq!(output.stop_reason, StopReason::DurationElapsed);
    // Chunks at 300, 600 and 900 ms, then the flush on stop.
    assert_eq!(output.chunk_count, 4);
    assert_eq!(output.len(), 3 * CHUNK_SIZE + FLUSH_CHUNK.len());
    assert_eq!(&output.bytes[..CHUNK_SIZE], &[0u8; CHUNK_SIZE]);
    assert!((output.duration_secs - 1.0).abs() < 1e-3);
    assert_eq!(output.mime_type, "video/webm;codecs=vp8,opus");
    assert_eq!(output.file_name, "lyric-clip.webm");

    assert_eq!(rig.controller.state(), RecordingState::Idle);
    assert_eq!(rig.audio.seeks(), vec![2.0]);
    assert!(rig.audio.is_paused());
    assert!(!rig.runtime.any_track_active());
    assert_eq!(rig.runtime.tracks().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_chunks_are_ignored() {
    let rig = rig(
        StubRuntime::new().with_plan(EncoderPlan {
            chunk_every: Duration::from_millis(300),
            empty_chunks: true,
            ..Default::default()
        }),
        StubAudio::new(),
    );

    let output = rig.controller.record(&config(1.0)).await.unwrap();
    assert_eq!(output.chunk_count, 4);
}

#[tokio::test(start_paused = true)]
async fn start_while_recording_is_rejected() {
    let rig = rig(StubRuntime::new(), StubAudio::new());
    let handle = rig.controller.handle();

    let controller = rig.controller.clone();
    let first = tokio::spawn(async move { controller.record(&config(30.0)).await });
    wait_for_state(&handle, RecordingState::Recording).await;

    let err = rig.controller.record(&config(1.0)).await.unwrap_err();
    assert!(err.is_session_conflict());
    assert_eq!(handle.state(), RecordingState::Recording);
    assert_eq!(rig.runtime.opened_formats().len(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(handle.request_stop());

    let output = first.await.unwrap().unwrap();
    assert_eq!(output.stop_reason, StopReason::Requested);
    // Chunks at 100 and 200 ms plus the flush; the rejected start added nothing.
    assert_eq!(output.chunk_count, 3);
    assert_eq!(handle.state(), RecordingState::Idle);
}

#[tokio::test(start_paused = true)]
async fn early_stop_keeps_only_elapsed_portion() {
    let rig = rig(StubRuntime::new(), StubAudio::new());
    let handle = rig.controller.handle();

    let controller = rig.controller.clone();
    let session = tokio::spawn(async move { controller.record(&config(10.0)).await });
    wait_for_state(&handle, RecordingState::Recording).await;

    tokio::time::sleep(Duration::from_millis(450)).await;
    handle.request_stop();
    let output = session.await.unwrap().unwrap();

    assert_eq!(output.stop_reason, StopReason::Requested);
    assert_eq!(output.chunk_count, 5);
    assert_eq!(output.len(), 4 * CHUNK_SIZE + FLUSH_CHUNK.len());
    assert!((output.duration_secs - 0.45).abs() < 1e-3);
    assert!(!rig.runtime.any_track_active());

    // The audio element advanced by the recorded portion only.
    assert!((rig.audio.current_time() - 2.45).abs() < 1e-3);
}

#[tokio::test(start_paused = true)]
async fn stop_during_preparing_is_remembered() {
    let rig = rig(
        StubRuntime::new(),
        StubAudio::new().with_metadata_delay(Duration::from_millis(500)),
    );
    let handle = rig.controller.handle();

    let controller = rig.controller.clone();
    let session = tokio::spawn(async move { controller.record(&config(10.0)).await });
    wait_for_state(&handle, RecordingState::Preparing).await;
    assert!(handle.request_stop());

    let output = session.await.unwrap().unwrap();
    assert_eq!(output.stop_reason, StopReason::Requested);
    assert_eq!(output.bytes, FLUSH_CHUNK.to_vec());
    assert!(output.duration_secs < 1e-3);
    assert_eq!(rig.audio.plays(), 1);
    assert_eq!(handle.state(), RecordingState::Idle);
}

#[tokio::test(start_paused = true)]
async fn stale_stop_does_not_affect_later_session() {
    let rig = rig(StubRuntime::new(), StubAudio::new());
    let handle = rig.controller.handle();

    assert!(!handle.request_stop());
    rig.controller.record(&config(0.5)).await.unwrap();
    assert!(!handle.request_stop());

    let output = rig.controller.record(&config(1.0)).await.unwrap();
    assert_eq!(output.stop_reason, StopReason::DurationElapsed);
    assert!((output.duration_secs - 1.0).abs() < 1e-3);
}

#[tokio::test(start_paused = true)]
async fn negotiation_picks_first_supported_candidate() {
    let rig = rig(
        StubRuntime::new().supporting(&["video/webm", "video/webm;codecs=vp8,opus"]),
        StubAudio::new(),
    );

    let output = rig.controller.record(&config(0.5)).await.unwrap();
    assert_eq!(
        rig.runtime.opened_formats(),
        vec![Some("video/webm;codecs=vp8,opus".to_string())]
    );
    // The encoder reports nothing, so the negotiated type is used.
    assert_eq!(output.mime_type, "video/webm;codecs=vp8,opus");
    assert_eq!(output.extension, "webm");
}

#[tokio::test(start_paused = true)]
async fn mime_falls_back_to_webm_without_negotiation() {
    let rig = rig(StubRuntime::new().supporting(&[]), StubAudio::new());

    let output = rig.controller.record(&config(0.5)).await.unwrap();
    assert_eq!(rig.runtime.opened_formats(), vec![None]);
    assert_eq!(output.mime_type, "video/webm");
    assert_eq!(output.file_name, "lyric-clip.webm");
}

#[tokio::test(start_paused = true)]
async fn mp4_output_is_named_accordingly() {
    let rig = rig(StubRuntime::new().supporting(&["video/mp4"]), StubAudio::new());

    let mut cfg = config(0.5);
    cfg.file_base_name = "chorus".into();
    let output = rig.controller.record(&cfg).await.unwrap();
    assert_eq!(output.mime_type, "video/mp4");
    assert_eq!(output.file_name, "chorus.mp4");
}

#[tokio::test(start_paused = true)]
async fn encoder_failure_keeps_partial_output() {
    let rig = rig(
        StubRuntime::new().with_plan(EncoderPlan {
            fail_after: Some(Duration::from_millis(350)),
            ..Default::default()
        }),
        StubAudio::new(),
    );
    let handle = rig.controller.handle();

    let err = rig.controller.record(&config(10.0)).await.unwrap_err();
    assert!(matches!(err, LyriclipError::Encoder { .. }));
    assert_eq!(handle.state(), RecordingState::Error);
    assert!(handle.last_error().unwrap().contains("stub encoder failure"));
    assert!(!rig.runtime.any_track_active());
    assert!(rig.audio.is_paused());

    let partial = handle.take_partial_output().unwrap();
    // Chunks at 100, 200 and 300 ms plus the flush.
    assert_eq!(partial.chunk_count, 4);
    assert!(matches!(partial.stop_reason, StopReason::EncoderFailed(_)));
    assert!(handle.take_partial_output().is_none());

    // Error is idle-equivalent: a new session may start.
    rig.runtime.set_plan(EncoderPlan::default());
    let output = rig.controller.record(&config(0.5)).await.unwrap();
    assert_eq!(output.stop_reason, StopReason::DurationElapsed);
    assert_eq!(handle.state(), RecordingState::Idle);
    assert!(handle.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn acquisition_failure_releases_video_and_allows_restart() {
    let runtime = StubRuntime::new();
    runtime.set_graph_tap(false);
    let rig = rig(runtime, StubAudio::new());

    let err = rig.controller.record(&config(1.0)).await.unwrap_err();
    assert!(matches!(err, LyriclipError::Acquisition { .. }));
    assert_eq!(rig.controller.state(), RecordingState::Error);
    assert_eq!(rig.runtime.tracks().len(), 1);
    assert!(!rig.runtime.any_track_active());
    assert!(rig.runtime.opened_formats().is_empty());
    assert_eq!(rig.audio.plays(), 0);

    rig.runtime.set_graph_tap(true);
    rig.controller.record(&config(0.5)).await.unwrap();
    assert_eq!(rig.controller.state(), RecordingState::Idle);
    assert!(!rig.runtime.any_track_active());
}

#[tokio::test(start_paused = true)]
async fn drain_timeout_bounds_finalize() {
    let rig = rig(
        StubRuntime::new().with_plan(EncoderPlan {
            never_stops: true,
            ..Default::default()
        }),
        StubAudio::new(),
    );

    let mut cfg = config(0.45);
    cfg.drain_timeout = Duration::from_secs(2);
    let started = tokio::time::Instant::now();
    let output = rig.controller.record(&cfg).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(2450));
    // No flush chunk ever arrives.
    assert_eq!(output.chunk_count, 4);
    assert_eq!(rig.controller.state(), RecordingState::Idle);
    assert!(!rig.runtime.any_track_active());
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected_without_state_change() {
    let rig = rig(StubRuntime::new(), StubAudio::new());
    let mut cfg = config(0.0);
    assert!(rig.controller.record(&cfg).await.is_err());

    cfg.duration_secs = 1.0;
    cfg.fps = 0;
    assert!(rig.controller.record(&cfg).await.is_err());

    assert_eq!(rig.controller.state(), RecordingState::Idle);
    assert!(rig.runtime.tracks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn engine_shutdown_finalizes_active_session() {
    let runtime = Arc::new(StubRuntime::new());
    let audio = Arc::new(StubAudio::new());
    let engine = EngineBuilder::new()
        .lyrics("[00:02.00]first\n[00:04.00]second")
        .build(runtime.clone(), Arc::new(RecordingSurface::default()), audio);

    let handle = engine.handle();
    let session = engine.spawn_recording(config(30.0));
    wait_for_state(&handle, RecordingState::Recording).await;

    // Nothing else may move playback during a session.
    let err = engine.seek_preview(10.0).unwrap_err();
    assert!(err.is_session_conflict());
    assert_eq!(engine.render_frame().unwrap().active_index(), Some(0));

    tokio::time::sleep(Duration::from_millis(150)).await;
    engine.shutdown().await;

    assert_eq!(handle.state(), RecordingState::Idle);
    let output = session.await.unwrap().unwrap();
    assert_eq!(output.stop_reason, StopReason::Requested);
    assert!(!runtime.any_track_active());
}

#[tokio::test(start_paused = true)]
async fn aborted_session_releases_resources() {
    let rig = rig(StubRuntime::new(), StubAudio::new());
    let handle = rig.controller.handle();

    let controller = rig.controller.clone();
    let session = tokio::spawn(async move { controller.record(&config(30.0)).await });
    wait_for_state(&handle, RecordingState::Recording).await;
    assert!(rig.runtime.any_track_active());
    assert!(!rig.audio.is_paused());

    tokio::time::sleep(Duration::from_millis(150)).await;
    session.abort();
    assert!(session.await.unwrap_err().is_cancelled());

    assert_eq!(handle.state(), RecordingState::Error);
    assert!(!rig.runtime.any_track_active());
    assert!(rig.audio.is_paused());
    assert!(handle.last_error().is_some_and(|e| e.contains("aborted")));

    // Error behaves like idle for the next start.
    rig.controller.record(&config(0.5)).await.unwrap();
    assert_eq!(handle.state(), RecordingState::Idle);
    assert!(handle.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn start_past_end_of_audio_is_rejected() {
    let rig = rig(StubRuntime::new(), StubAudio::new().with_duration(2.0));

    let err = rig.controller.record(&config(1.0)).await.unwrap_err();
    assert!(matches!(err, LyriclipError::Config { .. }));
    assert!(err.to_string().contains("past the end"));
    assert_eq!(rig.controller.state(), RecordingState::Error);
    assert!(!rig.runtime.any_track_active());
    assert!(rig.audio.seeks().is_empty());
    assert_eq!(rig.audio.plays(), 0);

    let mut cfg = config(1.0);
    cfg.start_secs = 1.5;
    let output = rig.controller.record(&cfg).await.unwrap();
    assert_eq!(output.stop_reason, StopReason::DurationElapsed);
    assert_eq!(rig.audio.seeks(), vec![1.5]);
}

#[tokio::test(start_paused = true)]
async fn slow_encoder_start_yields_to_other_tasks() {
    let rig = rig(
        StubRuntime::new().with_plan(EncoderPlan {
            start_delay: Some(Duration::from_millis(400)),
            ..Default::default()
        }),
        StubAudio::new(),
    );
    let handle = rig.controller.handle();

    let controller = rig.controller.clone();
    let session = tokio::spawn(async move { controller.record(&config(0.5)).await });
    wait_for_state(&handle, RecordingState::Preparing).await;

    // This task keeps running while the encoder is still starting.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.state(), RecordingState::Preparing);
    assert_eq!(rig.runtime.opened_formats().len(), 1);

    wait_for_state(&handle, RecordingState::Recording).await;
    let output = session.await.unwrap().unwrap();
    assert_eq!(output.stop_reason, StopReason::DurationElapsed);
    assert_eq!(handle.state(), RecordingState::Idle);
}
