//! Frame compositor: turns a timeline, a playback position and a style into
//! drawing instructions.
//!
//! Composition is pure. The same inputs always produce the same
//! [`FrameComposition`]; a [`Surface`](crate::surface::Surface) executes it.

use std::sync::Arc;

use lyriclip_lyric_model::{Color, StyleConfig, TimedEntry, Timeline};
use serde::{Deserialize, Serialize};

use crate::layout::{wrap_text, ApproxTextMeasure, FontSpec, LayoutMetrics, TextMeasure};
use crate::surface::SurfaceSize;

/// One drawing instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Solid rectangle in surface pixels.
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },
    /// A single line of text, horizontally centered on `x`, baseline at `y`.
    Text {
        text: String,
        x: f64,
        y: f64,
        font: FontSpec,
        color: Color,
    },
}

/// What the visible lyric block is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameContent {
    /// No entry covers the playback position.
    Idle,
    /// Entry at this timeline index is active.
    Active(usize),
}

/// A single frame's composition instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameComposition {
    /// Playback position the frame was composed for.
    pub time_secs: f64,

    pub size: SurfaceSize,

    pub content: FrameContent,

    /// Progress through the active entry in `[0, 1]`; zero while idle.
    pub progress: f64,

    /// Draw commands in painter's order.
    pub commands: Vec<DrawCommand>,
}

impl FrameComposition {
    pub fn active_index(&self) -> Option<usize> {
        match self.content {
            FrameContent::Active(i) => Some(i),
            FrameContent::Idle => None,
        }
    }

    /// Text lines in draw order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            DrawCommand::FillRect { .. } => None,
        })
    }
}

/// Progress through `entry` at `now`, clamped to `[0, 1]`.
///
/// Very short entries are treated as lasting `min_duration` so the value
/// never divides by zero. Non-finite input yields `0`.
pub fn progress_fraction(entry: &TimedEntry, now: f64, min_duration: f64) -> f64 {
    let duration = (entry.end_time - entry.time).max(min_duration);
    let p = (now - entry.time) / duration;
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Lays out lyric frames using configurable metrics and text measurement.
#[derive(Clone)]
pub struct Compositor {
    metrics: LayoutMetrics,
    measure: Arc<dyn TextMeasure>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(LayoutMetrics::default())
    }
}

impl Compositor {
    pub fn new(metrics: LayoutMetrics) -> Self {
        Self {
            metrics,
            measure: Arc::new(ApproxTextMeasure),
        }
    }

    /// Replace the text measurement used for wrapping.
    pub fn with_measure(mut self, measure: Arc<dyn TextMeasure>) -> Self {
        self.measure = measure;
        self
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    /// Compose the frame shown at playback position `now`.
    pub fn compose(
        &self,
        timeline: &Timeline,
        now: f64,
        style: &StyleConfig,
        size: SurfaceSize,
    ) -> FrameComposition {
        let m = &self.metrics;
        let width = f64::from(size.width);
        let height = f64::from(size.height);
        let center_x = width / 2.0;
        let mid_y = height / 2.0;
        let block_width = m.block_width(width);
        let wrap_width = m.wrap_width(width);

        let mut commands = vec![
            DrawCommand::FillRect {
                x: 0.0,
                y: 0.0,
                width,
                height,
                color: style.background_color,
            },
            DrawCommand::FillRect {
                x: m.margin,
                y: mid_y - m.backdrop_height / 2.0,
                width: block_width,
                height: m.backdrop_height,
                color: style.background_color,
            },
        ];

        let Some(index) = timeline.active_index(now) else {
            commands.push(DrawCommand::Text {
                text: m.idle_glyph.clone(),
                x: center_x,
                y: mid_y,
                font: m.active_font(),
                color: m.idle_color,
            });
            return FrameComposition {
                time_secs: now,
                size,
                content: FrameContent::Idle,
                progress: 0.0,
                commands,
            };
        };

        let entry = &timeline.entries()[index];
        let progress = progress_fraction(entry, now, m.min_entry_duration);

        if style.show_progress_bar {
            commands.push(DrawCommand::FillRect {
                x: m.margin,
                y: mid_y + m.bar_offset_y,
                width: block_width * progress,
                height: m.bar_height,
                color: style.progress_bar_color,
            });
        }

        let active_font = m.active_font();
        let lines = wrap_text(&entry.text, wrap_width, &active_font, self.measure.as_ref());
        let line_count = lines.len().max(1) as f64;
        let mut y = mid_y - (line_count - 1.0) * m.active_line_height / 2.0;
        for line in lines {
            commands.push(DrawCommand::Text {
                text: line,
                x: center_x,
                y,
                font: active_font.clone(),
                color: style.lyric_color,
            });
            y += m.active_line_height;
        }

        if style.show_next_line {
            if let Some(next) = timeline.next_after(index) {
                let next_font = m.next_font();
                let next_lines =
                    wrap_text(&next.text, wrap_width, &next_font, self.measure.as_ref());
                let mut y = mid_y + m.next_offset_y;
                for line in next_lines.into_iter().take(m.next_max_lines) {
                    commands.push(DrawCommand::Text {
                        text: line,
                        x: center_x,
                        y,
                        font: next_font.clone(),
                        color: style.next_line_color,
                    });
                    y += m.next_line_height;
                }
            }
        }

        FrameComposition {
            time_secs: now,
            size,
            content: FrameContent::Active(index),
            progress,
            commands,
        }
    }
}

/// Compose with default metrics and measurement.
pub fn compose(
    timeline: &Timeline,
    now: f64,
    style: &StyleConfig,
    size: SurfaceSize,
) -> FrameComposition {
    Compositor::default().compose(timeline, now, style, size)
}
