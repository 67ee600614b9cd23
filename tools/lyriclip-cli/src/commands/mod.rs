pub mod check;
pub mod parse;
pub mod preview;
pub mod record;
pub mod subtitles;
pub mod transcribe;

use std::path::{Path, PathBuf};

use anyhow::Context;
use lyriclip_lyric_model::{StyleConfig, Timeline};

/// Style selection shared by `preview` and `record`.
pub struct StyleArgs {
    pub path: Option<PathBuf>,
    pub classic: bool,
}

impl StyleArgs {
    pub fn load(&self) -> anyhow::Result<StyleConfig> {
        match &self.path {
            Some(path) => StyleConfig::from_json_file(path)
                .with_context(|| format!("loading style from {}", path.display())),
            None if self.classic => Ok(StyleConfig::classic()),
            None => Ok(StyleConfig::default()),
        }
    }
}

/// Read a timed-lyric file as raw text.
pub fn read_lyrics(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading lyrics from {}", path.display()))
}

/// Parse a timed-lyric file, warning when nothing was accepted.
pub fn load_timeline(path: &Path) -> anyhow::Result<Timeline> {
    let timeline = Timeline::parse(&read_lyrics(path)?);
    if timeline.is_empty() {
        tracing::warn!(path = %path.display(), "No timestamped lines found");
    }
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_selection() {
        let classic = StyleArgs {
            path: None,
            classic: true,
        };
        assert_eq!(classic.load().unwrap(), StyleConfig::classic());

        let plain = StyleArgs {
            path: None,
            classic: false,
        };
        assert_eq!(plain.load().unwrap(), StyleConfig::default());

        let missing = StyleArgs {
            path: Some(PathBuf::from("/nonexistent/style.json")),
            classic: true,
        };
        assert!(missing.load().is_err());
    }
}
