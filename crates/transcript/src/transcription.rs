//! Transcript contract.
//!
//! Speech-to-text runs outside this workspace. A transcript source hands back
//! segment and word timings, which the subtitle exporters turn into text
//! formats the timeline parser (and other players) understand.

use lyriclip_common::error::{LyriclipError, LyriclipResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A timed span of text, typically one lyric line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    #[serde(alias = "start")]
    pub start_secs: f64,
    /// End time in seconds.
    #[serde(alias = "end")]
    pub end_secs: f64,
    pub text: String,
}

/// A single timed word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    #[serde(alias = "start")]
    pub start_secs: f64,
    #[serde(alias = "end")]
    pub end_secs: f64,
    pub word: String,
}

/// Output of a transcript source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    pub words: Vec<TranscriptWord>,
}

impl Transcript {
    /// Latest end time across segments and words.
    pub fn duration_secs(&self) -> f64 {
        let seg_end = self.segments.iter().map(|s| s.end_secs);
        let word_end = self.words.iter().map(|w| w.end_secs);
        seg_end.chain(word_end).fold(0.0, f64::max)
    }

    /// Read a transcript from a JSON file.
    pub fn load(path: &Path) -> LyriclipResult<Self> {
        if !path.exists() {
            return Err(LyriclipError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write this transcript as pretty JSON.
    pub fn save(&self, path: &Path) -> LyriclipResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Anything that can produce timings for an audio file.
pub trait TranscriptSource {
    fn transcribe(&self, audio_path: &Path) -> LyriclipResult<Transcript>;
}

/// Stand-in source that returns one fixed sample line.
///
/// Words are spread evenly across the segment. Useful for exercising the
/// export and preview paths before a real recognizer is wired in.
#[derive(Debug, Clone)]
pub struct PlaceholderTranscriber {
    pub text: String,
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl Default for PlaceholderTranscriber {
    fn default() -> Self {
        Self {
            text: "This is only a sample lyric line for preview".to_string(),
            start_secs: 0.5,
            duration_secs: 8.0,
        }
    }
}

impl PlaceholderTranscriber {
    /// Build the transcript without touching the filesystem.
    pub fn sample(&self) -> Transcript {
        let words: Vec<&str> = self.text.split_whitespace().collect();
        let per_word = if words.is_empty() {
            0.0
        } else {
            self.duration_secs / words.len() as f64
        };

        let mut t = self.start_secs;
        let words = words
            .into_iter()
            .map(|word| {
                let start_secs = t;
                t += per_word;
                TranscriptWord {
                    start_secs,
                    end_secs: t,
                    word: word.to_string(),
                }
            })
            .collect();

        Transcript {
            segments: vec![TranscriptSegment {
                start_secs: self.start_secs,
                end_secs: self.start_secs + self.duration_secs,
                text: self.text.clone(),
            }],
            words,
        }
    }
}

impl TranscriptSource for PlaceholderTranscriber {
    fn transcribe(&self, audio_path: &Path) -> LyriclipResult<Transcript> {
        tracing::info!(
            path = %audio_path.display(),
            "Producing placeholder transcript"
        );

        if !audio_path.exists() {
            return Err(LyriclipError::FileNotFound {
                path: audio_path.to_path_buf(),
            });
        }

        Ok(self.sample())
    }
}
