//! Check runtime capabilities.

use lyriclip_capture_engine::pipeline::{
    gstreamer_version, has_element, missing_elements, BASE_ELEMENTS,
};
use lyriclip_capture_engine::{EncoderProfile, FormatSpec, DEFAULT_CANDIDATES};

pub fn run() -> anyhow::Result<()> {
    println!("Lyriclip System Check");
    println!("{}", "=".repeat(50));

    match gstreamer_version() {
        Ok(version) => println!("[OK] {version}"),
        Err(e) => {
            println!("[FAIL] GStreamer unavailable: {e}");
            return Ok(());
        }
    }

    let missing_base: Vec<_> = BASE_ELEMENTS
        .iter()
        .copied()
        .filter(|name| !has_element(name))
        .collect();
    if missing_base.is_empty() {
        println!("[OK] Base elements present");
    } else {
        println!("[FAIL] Base elements missing: {}", missing_base.join(", "));
    }

    println!();
    println!("Output formats (in preference order):");
    let mut negotiated = None;
    for mime in DEFAULT_CANDIDATES {
        let format: FormatSpec = mime.parse()?;
        match format.encoder_profile() {
            None => println!("  [--]   {mime}  (no encoder mapping)"),
            Some(profile) => {
                let missing = missing_elements(&profile);
                if missing.is_empty() {
                    println!("  [OK]   {mime}");
                    negotiated.get_or_insert(mime);
                } else {
                    println!("  [MISS] {mime}  (missing: {})", missing.join(", "));
                }
            }
        }
    }

    let fallback = EncoderProfile::runtime_default();
    let fallback_ok = missing_elements(&fallback).is_empty();
    println!(
        "  [{}]   runtime default ({})",
        if fallback_ok { "OK" } else { "MISS" },
        fallback.output_mime
    );

    println!();
    println!(
        "Config file: {}",
        lyriclip_common::config::config_file_path().display()
    );

    println!();
    match negotiated {
        Some(mime) => println!("Recordings will use {mime}. Lyriclip is ready."),
        None if fallback_ok => println!("No candidate is encodable; recordings fall back to the runtime default."),
        None => println!("No encoder is available. Install the GStreamer good/ugly/libav plugin sets."),
    }
    Ok(())
}
