//! Subtitle generation in SubRip, Enhanced LRC and timed-lyric formats.

use crate::transcription::{Transcript, TranscriptSegment, TranscriptWord};
use lyriclip_common::error::{LyriclipError, LyriclipResult};
use lyriclip_lyric_model::format_timestamp;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output formats understood by [`save_subtitles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// SubRip (`.srt`), one cue per segment.
    Srt,
    /// Enhanced LRC (`.lrc`), one line of per-word timestamps.
    Lrc,
    /// Timed-lyric text, one `[mm:ss.cc]` line per segment.
    Timed,
}

impl SubtitleFormat {
    /// Pick a format from a file extension. Unknown extensions map to SubRip.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("lrc") => SubtitleFormat::Lrc,
            Some("txt") | Some("lyrics") => SubtitleFormat::Timed,
            _ => SubtitleFormat::Srt,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Lrc => "lrc",
            SubtitleFormat::Timed => "txt",
        }
    }

    /// Render a transcript in this format.
    pub fn render(&self, transcript: &Transcript) -> String {
        match self {
            SubtitleFormat::Srt => generate_srt(&transcript.segments),
            SubtitleFormat::Lrc => generate_enhanced_lrc(&transcript.words),
            SubtitleFormat::Timed => generate_timed_lyrics(&transcript.segments),
        }
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = LyriclipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "lrc" => Ok(SubtitleFormat::Lrc),
            "timed" | "txt" => Ok(SubtitleFormat::Timed),
            other => Err(LyriclipError::transcript(format!(
                "unknown subtitle format '{other}' (expected srt, lrc or timed)"
            ))),
        }
    }
}

/// Generate SRT subtitle content from transcript segments.
pub fn generate_srt(segments: &[TranscriptSegment]) -> String {
    let mut output = String::new();

    for (i, segment) in segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(segment.start_secs),
            format_srt_time(segment.end_secs),
        ));
        output.push_str(&segment.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate Enhanced LRC from word timings.
///
/// The whole transcript becomes a single line of `[mm:ss.cc]word` tokens
/// under a `[00:00.00]Lyrics` header.
pub fn generate_enhanced_lrc(words: &[TranscriptWord]) -> String {
    let line = words
        .iter()
        .map(|w| format!("[{}]{}", format_timestamp(w.start_secs), w.word))
        .collect::<Vec<_>>()
        .join(" ");
    format!("[00:00.00]Lyrics\n{line}\n")
}

/// Generate timed-lyric text (one `[mm:ss.cc]text` line per segment).
pub fn generate_timed_lyrics(segments: &[TranscriptSegment]) -> String {
    let mut output = String::new();
    for segment in segments {
        output.push('[');
        output.push_str(&format_timestamp(segment.start_secs));
        output.push(']');
        output.push_str(segment.text.trim());
        output.push('\n');
    }
    output
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm (truncated to the millisecond).
fn format_srt_time(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Save subtitles to a file, choosing the format from its extension.
pub fn save_subtitles(transcript: &Transcript, path: &Path) -> LyriclipResult<SubtitleFormat> {
    let format = SubtitleFormat::from_path(path);
    std::fs::write(path, format.render(transcript))?;
    tracing::info!(path = %path.display(), ?format, "Subtitles written");
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::PlaceholderTranscriber;
    use lyriclip_lyric_model::Timeline;

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment {
                start_secs: 0.0,
                end_secs: 2.5,
                text: "Hello world".to_string(),
            },
            TranscriptSegment {
                start_secs: 3.0,
                end_secs: 5.0,
                text: "This is a test".to_string(),
            },
        ]
    }

    #[test]
    fn test_srt_generation() {
        let srt = generate_srt(&segments());
        assert!(srt.contains("1\n00:00:00,000 --> 00:00:02,500\nHello world"));
        assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nThis is a test"));
    }

    #[test]
    fn test_srt_time_formatting() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3661.5), "01:01:01,500");
        assert_eq!(format_srt_time(-2.0), "00:00:00,000");
    }

    #[test]
    fn test_enhanced_lrc() {
        let words = vec![
            TranscriptWord {
                start_secs: 0.5,
                end_secs: 1.0,
                word: "This".to_string(),
            },
            TranscriptWord {
                start_secs: 61.25,
                end_secs: 62.0,
                word: "is".to_string(),
            },
        ];
        assert_eq!(
            generate_enhanced_lrc(&words),
            "[00:00.00]Lyrics\n[00:00.50]This [01:01.25]is\n"
        );
    }

    #[test]
    fn test_timed_lyrics_feed_the_parser() {
        let text = generate_timed_lyrics(&segments());
        let timeline = Timeline::parse(&text);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.entries()[0].end_time, 3.0);
        assert_eq!(timeline.entries()[1].text, "This is a test");
    }

    #[test]
    fn test_timed_lyrics_past_99_minutes_still_parse() {
        let late = vec![TranscriptSegment {
            start_secs: 6000.0,
            end_secs: 6004.0,
            text: "encore".to_string(),
        }];
        let text = generate_timed_lyrics(&late);
        assert_eq!(text, "[99:60.00]encore\n");

        let timeline = Timeline::parse(&text);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.entries()[0].time, 6000.0);
        assert_eq!(Timeline::parse(&timeline.to_timed_lyrics()), timeline);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SubtitleFormat::from_path(Path::new("a.LRC")), SubtitleFormat::Lrc);
        assert_eq!(SubtitleFormat::from_path(Path::new("a.txt")), SubtitleFormat::Timed);
        assert_eq!(SubtitleFormat::from_path(Path::new("a")), SubtitleFormat::Srt);
        assert!("vtt".parse::<SubtitleFormat>().is_err());
    }

    #[test]
    fn test_save_subtitles_writes_file() {
        let dir = std::env::temp_dir().join(format!("lyriclip-subs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clip.lrc");

        let transcript = PlaceholderTranscriber::default().sample();
        let format = save_subtitles(&transcript, &path).unwrap();
        assert_eq!(format, SubtitleFormat::Lrc);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("[00:00.00]Lyrics\n[00:00.50]This "));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
