//! Output format negotiation.
//!
//! Candidates are MIME strings such as `video/webm;codecs=vp9,opus`. The
//! first candidate the runtime can encode wins; when none is supported the
//! runtime's default format is used and the recording still proceeds.

use std::fmt;

use lyriclip_common::error::{LyriclipError, LyriclipResult};

/// Candidate formats in preference order.
pub const DEFAULT_CANDIDATES: [&str; 5] = [
    "video/mp4;codecs=avc1.42E01E,mp4a.40.2",
    "video/mp4",
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// MIME type assumed when neither the encoder nor negotiation names one.
pub const FALLBACK_MIME: &str = "video/webm";

/// Container family of a format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Mp4,
    WebM,
    Matroska,
    Other(String),
}

impl Container {
    fn from_subtype(subtype: &str) -> Self {
        match subtype {
            "mp4" => Container::Mp4,
            "webm" => Container::WebM,
            "x-matroska" => Container::Matroska,
            other => Container::Other(other.to_string()),
        }
    }
}

/// A parsed MIME candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    mime: String,
    container: Container,
    codecs: Vec<String>,
}

impl FormatSpec {
    /// Parse `type/subtype[;codecs=a,b]`.
    pub fn parse(mime: &str) -> LyriclipResult<Self> {
        let mime = mime.trim();
        let mut parts = mime.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let Some((_, subtype)) = essence.split_once('/').filter(|(t, s)| {
            !t.is_empty() && !s.is_empty()
        }) else {
            return Err(LyriclipError::encoder(format!("invalid MIME type '{mime}'")));
        };

        let mut codecs = Vec::new();
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("codecs") {
                codecs.extend(
                    value
                        .trim()
                        .trim_matches('"')
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty()),
                );
            }
        }

        Ok(Self {
            mime: mime.to_string(),
            container: Container::from_subtype(subtype),
            codecs,
        })
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn codecs(&self) -> &[String] {
        &self.codecs
    }

    /// File extension for recordings in this format.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime)
    }

    /// Encoder elements needed to produce this format, if known.
    pub fn encoder_profile(&self) -> Option<EncoderProfile> {
        EncoderProfile::for_format(self)
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mime)
    }
}

impl std::str::FromStr for FormatSpec {
    type Err = LyriclipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// File extension for a MIME type: `mp4`, `mkv`, or `webm` for anything else.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("mp4") {
        "mp4"
    } else if mime.contains("x-matroska") {
        "mkv"
    } else {
        "webm"
    }
}

/// The default candidate list, parsed.
pub fn default_candidates() -> Vec<FormatSpec> {
    DEFAULT_CANDIDATES
        .iter()
        .filter_map(|mime| FormatSpec::parse(mime).ok())
        .collect()
}

/// Parse a list of MIME strings, rejecting the first invalid one.
pub fn parse_candidates<S: AsRef<str>>(mimes: &[S]) -> LyriclipResult<Vec<FormatSpec>> {
    mimes.iter().map(|m| FormatSpec::parse(m.as_ref())).collect()
}

/// Runtime capability check for output formats.
pub trait FormatProbe {
    fn is_format_supported(&self, format: &FormatSpec) -> bool;
}

/// Pick the first supported candidate, in order.
pub fn negotiate<P: FormatProbe + ?Sized>(
    candidates: &[FormatSpec],
    probe: &P,
) -> Option<FormatSpec> {
    let chosen = candidates
        .iter()
        .find(|candidate| probe.is_format_supported(candidate))
        .cloned();

    match &chosen {
        Some(format) => tracing::info!(format = %format, "Negotiated output format"),
        None => tracing::warn!(
            candidates = candidates.len(),
            "No candidate format supported; using runtime default"
        ),
    }
    chosen
}

/// Element names used to encode and mux one output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProfile {
    pub video_encoder: &'static str,
    pub video_parser: Option<&'static str>,
    pub audio_encoder: &'static str,
    pub muxer: &'static str,
    /// MIME type the muxer actually produces.
    pub output_mime: &'static str,
}

impl EncoderProfile {
    /// Profile used when negotiation found nothing.
    pub fn runtime_default() -> Self {
        Self {
            video_encoder: "vp8enc",
            video_parser: None,
            audio_encoder: "opusenc",
            muxer: "matroskamux",
            output_mime: "video/x-matroska",
        }
    }

    /// Map a format to elements. `None` when a codec is not recognized.
    pub fn for_format(format: &FormatSpec) -> Option<Self> {
        let (mut profile, allowed_video, allowed_audio) =
            match format.container() {
                Container::Mp4 => (
                    Self {
                        video_encoder: "x264enc",
                        video_parser: Some("h264parse"),
                        audio_encoder: "avenc_aac",
                        muxer: "mp4mux",
                        output_mime: "video/mp4",
                    },
                    MP4_VIDEO,
                    MP4_AUDIO,
                ),
                Container::Matroska => (
                    Self {
                        video_encoder: "x264enc",
                        video_parser: Some("h264parse"),
                        audio_encoder: "opusenc",
                        muxer: "matroskamux",
                        output_mime: "video/x-matroska",
                    },
                    MKV_VIDEO,
                    MKV_AUDIO,
                ),
                // WebM and anything unrecognized are written as WebM, matching
                // the extension chosen for them.
                Container::WebM | Container::Other(_) => (
                    Self {
                        video_encoder: "vp8enc",
                        video_parser: None,
                        audio_encoder: "opusenc",
                        muxer: "webmmux",
                        output_mime: "video/webm",
                    },
                    WEBM_VIDEO,
                    WEBM_AUDIO,
                ),
            };

        for codec in format.codecs() {
            let family = codec
                .split('.')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            let family = family.as_str();

            if allowed_video.contains(&family) {
                let (encoder, parser) = video_elements(family)?;
                profile.video_encoder = encoder;
                profile.video_parser = parser;
            } else if allowed_audio.contains(&family) {
                profile.audio_encoder = audio_element(family)?;
            } else {
                return None;
            }
        }

        Some(profile)
    }

    /// Every element the profile needs, in pipeline order.
    pub fn elements(&self) -> Vec<&'static str> {
        let mut elements = vec![self.video_encoder];
        elements.extend(self.video_parser);
        elements.push(self.audio_encoder);
        elements.push(self.muxer);
        elements
    }
}

const MP4_VIDEO: &[&str] = &["avc1", "h264", "hvc1", "hev1"];
const MP4_AUDIO: &[&str] = &["mp4a", "aac"];
const MKV_VIDEO: &[&str] = &["avc1", "h264", "hvc1", "hev1", "vp8", "vp9"];
const MKV_AUDIO: &[&str] = &["opus", "vorbis", "mp4a", "aac"];
const WEBM_VIDEO: &[&str] = &["vp8", "vp9"];
const WEBM_AUDIO: &[&str] = &["opus", "vorbis"];

fn video_elements(family: &str) -> Option<(&'static str, Option<&'static str>)> {
    match family {
        "avc1" | "h264" => Some(("x264enc", Some("h264parse"))),
        "hvc1" | "hev1" => Some(("x265enc", Some("h265parse"))),
        "vp8" => Some(("vp8enc", None)),
        "vp9" => Some(("vp9enc", None)),
        _ => None,
    }
}

fn audio_element(family: &str) -> Option<&'static str> {
    match family {
        "mp4a" | "aac" => Some("avenc_aac"),
        "opus" => Some("opusenc"),
        "vorbis" => Some("vorbisenc"),
        _ => None,
    }
}
