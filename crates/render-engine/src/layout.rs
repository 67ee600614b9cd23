//! Text layout: fonts, measurement, and greedy word wrapping.

use lyriclip_lyric_model::Color;
use serde::{Deserialize, Serialize};

/// A font request for one text draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub size_px: f64,
    pub bold: bool,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size_px: f64, bold: bool) -> Self {
        Self {
            family: family.into(),
            size_px,
            bold,
        }
    }

    /// Pango-style description, e.g. `"Montserrat Bold 64px"`.
    pub fn pango_description(&self) -> String {
        let family = self
            .family
            .split(',')
            .next()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or("Sans");
        let weight = if self.bold { " Bold" } else { "" };
        format!("{family}{weight} {}px", self.size_px.round() as i64)
    }
}

/// Geometry and typography used by the compositor.
///
/// All distances are in surface pixels. Vertical offsets are relative to the
/// surface midpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    /// Horizontal margin on both sides of the lyric block.
    pub margin: f64,
    /// Extra horizontal inset applied when wrapping text.
    pub wrap_inset: f64,
    pub font_family: String,

    pub active_font_px: f64,
    pub active_line_height: f64,

    pub next_font_px: f64,
    pub next_line_height: f64,
    /// Baseline of the first next-line row.
    pub next_offset_y: f64,
    pub next_max_lines: usize,

    /// Top edge of the progress bar.
    pub bar_offset_y: f64,
    pub bar_height: f64,

    /// Height of the backdrop drawn behind the lyric block.
    pub backdrop_height: f64,

    /// Entries shorter than this still animate the bar smoothly.
    pub min_entry_duration: f64,

    pub idle_glyph: String,
    pub idle_color: Color,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            margin: 120.0,
            wrap_inset: 60.0,
            font_family: "Montserrat, system-ui, sans-serif".to_string(),
            active_font_px: 64.0,
            active_line_height: 80.0,
            next_font_px: 36.0,
            next_line_height: 48.0,
            next_offset_y: 150.0,
            next_max_lines: 2,
            bar_offset_y: 60.0,
            bar_height: 8.0,
            backdrop_height: 200.0,
            min_entry_duration: 0.05,
            idle_glyph: "\u{2026}".to_string(),
            idle_color: Color::rgb(0x6b, 0x72, 0x80),
        }
    }
}

impl LayoutMetrics {
    pub fn active_font(&self) -> FontSpec {
        FontSpec::new(self.font_family.clone(), self.active_font_px, true)
    }

    pub fn next_font(&self) -> FontSpec {
        FontSpec::new(self.font_family.clone(), self.next_font_px, false)
    }

    /// Width of the lyric block for a surface of `surface_width` pixels.
    pub fn block_width(&self, surface_width: f64) -> f64 {
        (surface_width - 2.0 * self.margin).max(0.0)
    }

    /// Maximum width of one wrapped text line.
    pub fn wrap_width(&self, surface_width: f64) -> f64 {
        (self.block_width(surface_width) - self.wrap_inset).max(0.0)
    }
}

/// Measures rendered text width.
pub trait TextMeasure: Send + Sync {
    fn text_width(&self, text: &str, font: &FontSpec) -> f64;
}

/// Advance-width estimate from glyph classes.
///
/// Close enough to a proportional sans-serif for line breaking, and
/// deterministic, so layout does not depend on installed fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTextMeasure;

impl ApproxTextMeasure {
    fn advance(c: char) -> f64 {
        match c {
            ' ' | 'i' | 'j' | 'l' | '.' | ',' | '\'' | '!' | '|' | ':' | ';' => 0.28,
            'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' => 0.36,
            'm' | 'w' | 'M' | 'W' => 0.86,
            '0'..='9' => 0.56,
            'A'..='Z' => 0.68,
            c if c.is_ascii() => 0.55,
            // CJK and other full-width scripts.
            c if (c as u32) >= 0x2E80 => 1.0,
            _ => 0.6,
        }
    }
}

impl TextMeasure for ApproxTextMeasure {
    fn text_width(&self, text: &str, font: &FontSpec) -> f64 {
        let weight = if font.bold { 1.06 } else { 1.0 };
        text.chars().map(Self::advance).sum::<f64>() * font.size_px * weight
    }
}

/// Greedy word wrap.
///
/// Words are split on whitespace. A word that would push the current line past
/// `max_width` starts a new line; a single word wider than `max_width` still
/// gets its own line rather than being broken. Blank text yields no lines.
pub fn wrap_text(
    text: &str,
    max_width: f64,
    font: &FontSpec,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{current} {word}");
        if measure.text_width(&candidate, font) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
