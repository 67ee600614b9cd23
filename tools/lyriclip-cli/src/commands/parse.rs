//! Parse a timed-lyric file and print the timeline.

use std::path::PathBuf;

use lyriclip_lyric_model::format_timestamp;
use serde::Serialize;

#[derive(Serialize)]
struct ParseReport<'a> {
    entries: &'a lyriclip_lyric_model::Timeline,
    skipped_lines: usize,
}

pub fn run(lyrics: PathBuf, json: bool) -> anyhow::Result<()> {
    let raw = super::read_lyrics(&lyrics)?;
    let timeline = lyriclip_lyric_model::Timeline::parse(&raw);
    let skipped_lines = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
        .saturating_sub(timeline.len());

    if json {
        let report = ParseReport {
            entries: &timeline,
            skipped_lines,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Timeline: {}", lyrics.display());
    println!("{}", "=".repeat(50));
    for (i, entry) in timeline.iter().enumerate() {
        let end = if entry.is_terminal() {
            "end".to_string()
        } else {
            format_timestamp(entry.end_time)
        };
        println!(
            "{i:>4}  {} -> {:<8}  {}",
            format_timestamp(entry.time),
            end,
            entry.text
        );
    }
    println!();
    println!("Entries: {}", timeline.len());
    if skipped_lines > 0 {
        println!("Skipped lines without a timestamp: {skipped_lines}");
    }
    Ok(())
}
