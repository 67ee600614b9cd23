//! Error types shared across Lyriclip crates.

use std::path::PathBuf;

/// Top-level error type for Lyriclip operations.
#[derive(Debug, thiserror::Error)]
pub enum LyriclipError {
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    /// No audio capture path could produce a stream.
    #[error("Stream acquisition failed: {message}")]
    Acquisition { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    /// Lifecycle violations such as starting a second session.
    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Transcript error: {message}")]
    Transcript { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using LyriclipError.
pub type LyriclipResult<T> = Result<T, LyriclipError>;

impl LyriclipError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    pub fn transcript(msg: impl Into<String>) -> Self {
        Self::Transcript {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error was raised by the lifecycle guard rather than a
    /// media failure.
    pub fn is_session_conflict(&self) -> bool {
        matches!(self, Self::Session { .. })
    }
}
