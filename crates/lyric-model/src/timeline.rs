//! Timed-lyric timelines.
//!
//! The input format is line oriented: each line starts with a `[mm:ss]` or
//! `[mm:ss.cc]` timestamp (cc = centiseconds) followed by free text. Lines
//! that do not start with a timestamp are skipped; hand-edited lyric files
//! routinely contain headers, blank lines and stray notes.
//!
//! An entry lasts until the next accepted entry starts. The last entry is
//! unbounded.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Time position in seconds.
pub type Seconds = f64;

/// One parsed timestamp + text pair with its inferred end time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEntry {
    /// Start of the entry.
    pub time: Seconds,

    /// Start of the following entry, or `+inf` for the last one.
    /// Serialized as `null` when unbounded.
    #[serde(with = "unbounded_secs")]
    pub end_time: Seconds,

    /// Lyric text with leading whitespace removed.
    pub text: String,
}

impl TimedEntry {
    /// Whether `now` falls inside `[time, end_time)`.
    pub fn contains(&self, now: Seconds) -> bool {
        self.time <= now && now < self.end_time
    }

    /// Whether this is the last entry of its timeline.
    pub fn is_terminal(&self) -> bool {
        self.end_time.is_infinite()
    }

    /// Entry length in seconds (`+inf` for the last entry).
    pub fn duration(&self) -> Seconds {
        self.end_time - self.time
    }
}

/// An ordered, immutable sequence of [`TimedEntry`] values.
///
/// Built once per raw text; rebuild it when the text changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    entries: Vec<TimedEntry>,
}

impl Timeline {
    /// Parse raw timed-lyric text.
    pub fn parse(raw: &str) -> Self {
        Self {
            entries: parse_timed_lyrics(raw),
        }
    }

    /// Build a timeline from `(start, text)` pairs, deriving end times.
    pub fn from_starts<I, S>(starts: I) -> Self
    where
        I: IntoIterator<Item = (Seconds, S)>,
        S: Into<String>,
    {
        let rows = starts
            .into_iter()
            .map(|(time, text)| (time, text.into()))
            .collect();
        Self {
            entries: link_end_times(rows),
        }
    }

    pub fn entries(&self) -> &[TimedEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimedEntry> {
        self.entries.get(index)
    }

    /// Index of the first entry with `time <= now < end_time`.
    ///
    /// Timelines hold tens to low hundreds of entries, so a linear scan is
    /// cheaper than keeping a search structure in sync.
    pub fn active_index(&self, now: Seconds) -> Option<usize> {
        self.entries.iter().position(|entry| entry.contains(now))
    }

    /// The entry active at `now`, if any.
    pub fn active(&self, now: Seconds) -> Option<&TimedEntry> {
        self.active_index(now).map(|i| &self.entries[i])
    }

    /// The entry immediately following `index`.
    pub fn next_after(&self, index: usize) -> Option<&TimedEntry> {
        self.entries.get(index.checked_add(1)?)
    }

    /// Start time of the first entry.
    pub fn first_time(&self) -> Option<Seconds> {
        self.entries.first().map(|entry| entry.time)
    }

    /// Serialize back to timed-lyric text, one `[mm:ss.cc]text` line per entry.
    ///
    /// Parsing the output yields the same `(time, text)` pairs.
    pub fn to_timed_lyrics(&self) -> String {
        let mut output = String::new();
        for entry in &self.entries {
            output.push('[');
            output.push_str(&format_timestamp(entry.time));
            output.push(']');
            output.push_str(&entry.text);
            output.push('\n');
        }
        output
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a TimedEntry;
    type IntoIter = std::slice::Iter<'a, TimedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Parse timed-lyric text into entries.
///
/// Accepts `\n`, `\r\n` and lone `\r` line endings. End times are linked in
/// a second pass over the accepted lines only, so skipped lines never leave
/// zero-length gaps.
pub fn parse_timed_lyrics(raw: &str) -> Vec<TimedEntry> {
    let rows: Vec<(Seconds, String)> = raw
        .split(['\n', '\r'])
        .filter_map(|line| {
            let parsed = parse_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                tracing::trace!(line, "Skipping line without timestamp");
            }
            parsed
        })
        .collect();

    link_end_times(rows)
}

/// Parse one line into `(start, text)`; `None` if it has no leading timestamp.
pub fn parse_line(line: &str) -> Option<(Seconds, String)> {
    let caps = line_pattern().captures(line)?;
    let minutes: u32 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: u32 = caps.get(2)?.as_str().parse().ok()?;
    let centis: u32 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let text = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

    let time = f64::from(minutes * 60 + seconds) + f64::from(centis) / 100.0;
    Some((time, text.to_string()))
}

/// Largest value a two-digit `mm:ss.cc` stamp can hold, in centiseconds.
const MAX_STAMP_CS: u64 = 99 * 6000 + 99 * 100 + 99;

/// Format seconds as `mm:ss.cc`, rounding to the nearest centisecond.
///
/// Both fields stay two digits so the output always parses back. Past
/// `99:00.00` the seconds field carries the excess (`6000.0` becomes
/// `99:60.00`); values beyond `99:99.99` clamp to it. Negative and
/// non-finite input formats as `00:00.00`.
pub fn format_timestamp(secs: Seconds) -> String {
    let total_cs = if secs.is_finite() && secs > 0.0 {
        ((secs * 100.0).round() as u64).min(MAX_STAMP_CS)
    } else {
        0
    };
    let (minutes, rest) = if total_cs >= 99 * 6000 {
        (99, total_cs - 99 * 6000)
    } else {
        (total_cs / 6000, total_cs % 6000)
    };
    let seconds = rest / 100;
    let centis = rest % 100;
    format!("{minutes:02}:{seconds:02}.{centis:02}")
}

fn link_end_times(rows: Vec<(Seconds, String)>) -> Vec<TimedEntry> {
    let starts: Vec<Seconds> = rows.iter().map(|(time, _)| *time).collect();
    rows.into_iter()
        .enumerate()
        .map(|(i, (time, text))| TimedEntry {
            time,
            end_time: starts.get(i + 1).copied().unwrap_or(f64::INFINITY),
            text,
        })
        .collect()
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[([0-9]{2}):([0-9]{2})(?:\.([0-9]{2}))?\]\s*(.*)$")
            .expect("timed-lyric line pattern is valid")
    })
}

mod unbounded_secs {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
