//! Produce a transcript for an audio file.

use std::path::PathBuf;

use lyriclip_transcript::{PlaceholderTranscriber, TranscriptSource};

pub fn run(audio: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let transcript = PlaceholderTranscriber::default().transcribe(&audio)?;

    match output {
        Some(path) => {
            transcript.save(&path)?;
            println!(
                "Transcript written to {} ({} segments, {} words)",
                path.display(),
                transcript.segments.len(),
                transcript.words.len()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&transcript)?),
    }
    Ok(())
}
