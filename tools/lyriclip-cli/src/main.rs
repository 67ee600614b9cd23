//! Lyriclip CLI: parse timed lyrics, preview frames, and record lyric clips.
//!
//! Usage:
//!   lyriclip parse <LYRICS>             Print the parsed timeline
//!   lyriclip preview <LYRICS> --at <S>  Print one frame's draw commands
//!   lyriclip record <LYRICS> --audio F  Record a clip
//!   lyriclip transcribe <AUDIO>         Produce a (placeholder) transcript
//!   lyriclip subtitles <TRANSCRIPT>     Export SubRip / Enhanced LRC / timed lyrics
//!   lyriclip check                      Check encoder availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lyriclip_capture_engine::FormatSpec;
use lyriclip_render_engine::SurfaceSize;
use lyriclip_transcript::SubtitleFormat;

mod commands;

#[derive(Parser)]
#[command(
    name = "lyriclip",
    about = "Lyric-synchronized canvas capture",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a timed-lyric file and print the timeline
    Parse {
        /// Timed-lyric file ([mm:ss.cc]text per line)
        lyrics: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Compose the frame shown at a playback position
    Preview {
        /// Timed-lyric file
        lyrics: PathBuf,

        /// Playback position in seconds
        #[arg(long)]
        at: f64,

        /// Style configuration (JSON)
        #[arg(long)]
        style: Option<PathBuf>,

        /// Use the classic look (next line and progress bar)
        #[arg(long)]
        classic: bool,

        /// Surface width
        #[arg(long)]
        width: Option<u32>,

        /// Surface height
        #[arg(long)]
        height: Option<u32>,

        /// Print a readable listing instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Record a lyric clip over an audio file
    Record {
        /// Timed-lyric file
        lyrics: PathBuf,

        /// Audio file to play and capture
        #[arg(short, long)]
        audio: PathBuf,

        /// Clip start in the audio (seconds)
        #[arg(long, default_value = "0")]
        start: f64,

        /// Clip length (seconds)
        #[arg(long)]
        duration: Option<f64>,

        /// Capture frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Surface width
        #[arg(long)]
        width: Option<u32>,

        /// Surface height
        #[arg(long)]
        height: Option<u32>,

        /// Style configuration (JSON)
        #[arg(long)]
        style: Option<PathBuf>,

        /// Use the classic look (next line and progress bar)
        #[arg(long)]
        classic: bool,

        /// Candidate output format, in preference order (repeatable)
        #[arg(long = "format")]
        formats: Vec<FormatSpec>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file name without extension
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Transcribe an audio file (placeholder transcript)
    Transcribe {
        /// Audio file
        audio: PathBuf,

        /// Write the transcript JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export a transcript as subtitles
    Subtitles {
        /// Transcript JSON file
        transcript: PathBuf,

        /// srt, lrc or timed; inferred from --output when omitted
        #[arg(short, long)]
        format: Option<SubtitleFormat>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check encoder and runtime capabilities
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = lyriclip_common::config::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    lyriclip_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Parse { lyrics, json } => commands::parse::run(lyrics, json),
        Commands::Preview {
            lyrics,
            at,
            style,
            classic,
            width,
            height,
            text,
        } => commands::preview::run(
            lyrics,
            at,
            commands::StyleArgs { path: style, classic },
            SurfaceSize::new(
                width.unwrap_or(config.recording.width),
                height.unwrap_or(config.recording.height),
            ),
            text,
        ),
        Commands::Record {
            lyrics,
            audio,
            start,
            duration,
            fps,
            width,
            height,
            style,
            classic,
            formats,
            output,
            name,
        } => {
            let defaults = &config.recording;
            commands::record::run(commands::record::RecordArgs {
                lyrics,
                audio,
                start,
                duration: duration.unwrap_or(defaults.duration_secs),
                fps: fps.unwrap_or(defaults.fps),
                width: width.unwrap_or(defaults.width),
                height: height.unwrap_or(defaults.height),
                refresh_hz: defaults.refresh_hz,
                style: commands::StyleArgs { path: style, classic },
                formats,
                output: output.unwrap_or_else(|| defaults.output_dir.clone()),
                name: name.unwrap_or_else(|| defaults.file_base_name.clone()),
            })
            .await
        }
        Commands::Transcribe { audio, output } => commands::transcribe::run(audio, output),
        Commands::Subtitles {
            transcript,
            format,
            output,
        } => commands::subtitles::run(transcript, format, output),
        Commands::Check => commands::check::run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_accepts_repeated_formats() {
        let cli = Cli::try_parse_from([
            "lyriclip",
            "record",
            "song.lrc",
            "--audio",
            "song.ogg",
            "--format",
            "video/webm;codecs=vp9,opus",
            "--format",
            "video/webm",
        ])
        .unwrap();
        let Commands::Record { formats, start, .. } = cli.command else {
            panic!("expected record");
        };
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0].codecs(), ["vp9", "opus"]);
        assert_eq!(start, 0.0);
    }

    #[test]
    fn test_invalid_subtitle_format_is_rejected() {
        assert!(Cli::try_parse_from(["lyriclip", "subtitles", "t.json", "-f", "vtt"]).is_err());
    }
}
