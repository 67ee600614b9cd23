//! Compose a single frame and print its draw commands.

use std::path::PathBuf;

use lyriclip_render_engine::{Compositor, DrawCommand, FrameContent, SurfaceSize};

use super::StyleArgs;

pub fn run(
    lyrics: PathBuf,
    at: f64,
    style: StyleArgs,
    size: SurfaceSize,
    text: bool,
) -> anyhow::Result<()> {
    let timeline = super::load_timeline(&lyrics)?;
    let style = style.load()?;
    let frame = Compositor::default().compose(&timeline, at, &style, size);

    if !text {
        println!("{}", serde_json::to_string_pretty(&frame)?);
        return Ok(());
    }

    match frame.content {
        FrameContent::Idle => println!("t={at:.2}s  idle"),
        FrameContent::Active(i) => {
            println!("t={at:.2}s  entry {i}  progress {:.0}%", frame.progress * 100.0)
        }
    }
    println!("{}", "-".repeat(50));
    for command in &frame.commands {
        match command {
            DrawCommand::FillRect {
                x,
                y,
                width,
                height,
                color,
            } => println!("rect  {x:>7.1},{y:>7.1}  {width:.1}x{height:.1}  {color}"),
            DrawCommand::Text {
                text,
                x,
                y,
                font,
                color,
            } => println!(
                "text  {x:>7.1},{y:>7.1}  \"{text}\"  {}  {color}",
                font.pango_description()
            ),
        }
    }
    Ok(())
}
