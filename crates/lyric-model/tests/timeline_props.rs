use lyriclip_lyric_model::{format_timestamp, Timeline};
use proptest::prelude::*;

fn timed_line() -> impl Strategy<Value = (u32, u32, Option<u32>, String)> {
    (
        0u32..100,
        0u32..100,
        proptest::option::of(0u32..100),
        "[a-zA-Z0-9 ,.'!?]{0,24}",
    )
}

fn render(lines: &[(u32, u32, Option<u32>, String)]) -> String {
    lines
        .iter()
        .map(|(m, s, cs, text)| match cs {
            Some(cs) => format!("[{m:02}:{s:02}.{cs:02}] {text}"),
            None => format!("[{m:02}:{s:02}]{text}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

proptest! {
    #[test]
    fn parse_serialize_parse_is_stable(lines in proptest::collection::vec(timed_line(), 0..20)) {
        let first = Timeline::parse(&render(&lines));
        let second = Timeline::parse(&first.to_timed_lyrics());

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert!((a.time - b.time).abs() < 1e-9);
            prop_assert_eq!(&a.text, &b.text);
        }
    }

    #[test]
    fn end_times_link_to_next_start(lines in proptest::collection::vec(timed_line(), 1..20)) {
        let timeline = Timeline::parse(&render(&lines));
        let entries = timeline.entries();

        prop_assert_eq!(entries.len(), lines.len());
        for pair in entries.windows(2) {
            prop_assert_eq!(pair[0].end_time, pair[1].time);
        }
        prop_assert!(entries[entries.len() - 1].end_time.is_infinite());
    }

    #[test]
    fn garbage_lines_never_become_entries(noise in proptest::collection::vec("[a-z ]{0,30}", 0..10)) {
        let timeline = Timeline::parse(&noise.join("\n"));
        prop_assert!(timeline.is_empty());
    }

    #[test]
    fn formatted_timestamps_parse_back(cs in 0u64..=(99 * 6000 + 9999)) {
        let secs = cs as f64 / 100.0;
        let line = format!("[{}]x", format_timestamp(secs));
        let timeline = Timeline::parse(&line);
        prop_assert_eq!(timeline.len(), 1);
        prop_assert!((timeline.entries()[0].time - secs).abs() < 1e-9);
    }
}
