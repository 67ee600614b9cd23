//! Export a transcript as subtitles.

use std::path::PathBuf;

use lyriclip_transcript::{SubtitleFormat, Transcript};

pub fn run(
    transcript: PathBuf,
    format: Option<SubtitleFormat>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let transcript = Transcript::load(&transcript)?;
    let format = format
        .or_else(|| output.as_deref().map(SubtitleFormat::from_path))
        .unwrap_or(SubtitleFormat::Srt);
    let content = format.render(&transcript);

    match output {
        Some(path) => {
            std::fs::write(&path, content)?;
            tracing::info!(path = %path.display(), ?format, "Subtitles written");
            println!("Subtitles written to {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}
