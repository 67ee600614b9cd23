//! Colors and per-frame style configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error raised when a color string is not valid hex notation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {input:?}: expected #rgb, #rrggbb or #rrggbbaa")]
pub struct ColorParseError {
    pub input: String,
}

/// An sRGB color with alpha.
///
/// Serialized as lowercase hex (`#rrggbb`, or `#rrggbbaa` when not opaque).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(input: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError {
            input: input.to_string(),
        };
        let hex = input.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return Err(err());
        }

        let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());
        match hex.len() {
            3 => {
                let nibble = |i: usize| byte(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Ok(Self::rgb(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
            )),
            8 => Ok(Self::rgba(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => Err(err()),
        }
    }

    /// Lowercase hex; alpha is only written when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Packed `0xAARRGGBB`, the layout most overlay elements expect.
    pub fn to_argb_u32(&self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }

    pub fn to_rgba_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Visual configuration read by the compositor on every frame.
///
/// Changes take effect on the next frame; nothing is cached between frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub background_color: Color,
    pub lyric_color: Color,
    pub next_line_color: Color,
    pub progress_bar_color: Color,

    /// Draw a preview of the following lyric line below the active one.
    pub show_next_line: bool,

    /// Draw a bar showing progress through the active line.
    pub show_progress_bar: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            background_color: Color::rgb(0x0b, 0x12, 0x20),
            lyric_color: Color::WHITE,
            next_line_color: Color::rgb(0x6b, 0x72, 0x80),
            progress_bar_color: Color::rgb(0x22, 0xc5, 0x5e),
            show_next_line: false,
            show_progress_bar: false,
        }
    }
}

impl StyleConfig {
    /// Black background, white lyric, grey next line, both extras on.
    pub fn classic() -> Self {
        Self {
            background_color: Color::BLACK,
            lyric_color: Color::WHITE,
            next_line_color: Color::rgb(0x99, 0x99, 0x99),
            progress_bar_color: Color::rgb(0x22, 0xc5, 0x5e),
            show_next_line: true,
            show_progress_bar: true,
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_lyric_color(mut self, color: Color) -> Self {
        self.lyric_color = color;
        self
    }

    pub fn with_next_line_color(mut self, color: Color) -> Self {
        self.next_line_color = color;
        self
    }

    pub fn with_progress_bar_color(mut self, color: Color) -> Self {
        self.progress_bar_color = color;
        self
    }

    pub fn with_next_line(mut self, show: bool) -> Self {
        self.show_next_line = show;
        self
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Load a style from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, StyleLoadError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Failure reading a style file.
#[derive(Debug, thiserror::Error)]
pub enum StyleLoadError {
    #[error("failed to read style file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse style file: {0}")]
    Json(#[from] serde_json::Error),
}
