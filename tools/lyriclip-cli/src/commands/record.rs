//! Record a lyric clip.

use std::path::PathBuf;
use std::sync::Arc;

use lyriclip_capture_engine::pipeline::{GstAudioPlayer, GstCanvas, GstRuntime};
use lyriclip_capture_engine::{default_candidates, EngineBuilder, FormatSpec, RecordingConfig};
use lyriclip_render_engine::{DisplayLinkScheduler, LayoutMetrics, SurfaceSize};

use super::StyleArgs;

pub struct RecordArgs {
    pub lyrics: PathBuf,
    pub audio: PathBuf,
    pub start: f64,
    pub duration: f64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub refresh_hz: u32,
    pub style: StyleArgs,
    pub formats: Vec<FormatSpec>,
    pub output: PathBuf,
    pub name: String,
}

pub async fn run(args: RecordArgs) -> anyhow::Result<()> {
    let raw = super::read_lyrics(&args.lyrics)?;
    let style = args.style.load()?;
    let candidates = if args.formats.is_empty() {
        default_candidates()
    } else {
        args.formats
    };
    let config = RecordingConfig {
        fps: args.fps,
        start_secs: args.start,
        duration_secs: args.duration,
        file_base_name: args.name,
        candidates,
        ..Default::default()
    };
    config.validate()?;

    println!("Recording lyric clip: {}", config.file_base_name);
    println!("  Lyrics: {}", args.lyrics.display());
    println!("  Audio: {}", args.audio.display());
    println!("  Window: {:.2}s + {:.2}s", config.start_secs, config.duration_secs);
    println!("  Surface: {}x{} @ {} fps", args.width, args.height, config.fps);
    println!();

    let runtime = Arc::new(GstRuntime::new()?);
    let metrics = LayoutMetrics::default();
    let surface = Arc::new(GstCanvas::with_metrics(
        SurfaceSize::new(args.width, args.height),
        &metrics,
    ));
    let audio = Arc::new(GstAudioPlayer::open(&args.audio)?);

    let engine = EngineBuilder::new()
        .lyrics(raw)
        .style(style)
        .metrics(metrics)
        .recording(config.clone())
        .build(runtime, surface.clone(), audio);
    tracing::info!(entries = engine.timeline().len(), "Lyrics loaded");

    engine.start_preview(DisplayLinkScheduler::new(args.refresh_hz))?;
    let handle = engine.handle();

    println!("Press Ctrl+C to stop early...");
    let recording = engine.record_with(&config);
    tokio::pin!(recording);
    let result = tokio::select! {
        result = &mut recording => result,
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Stopping...");
            handle.request_stop();
            recording.await
        }
    };

    engine.stop_preview().await;
    surface.close();

    match result {
        Ok(output) => {
            let path = output.save_to(&args.output)?;
            println!("Clip saved to: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&output.summary())?);
            Ok(())
        }
        Err(e) => {
            if let Some(partial) = handle.take_partial_output().filter(|p| !p.is_empty()) {
                let path = partial.save_to(&args.output)?;
                eprintln!("Partial clip saved to: {}", path.display());
            }
            Err(e.into())
        }
    }
}
