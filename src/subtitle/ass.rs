use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::config::SubtitleConfig;
use crate::error::Result;
use crate::segment::Segment;

/// Format seconds as an ASS timestamp (H:MM:SS.cc)
pub fn format_ass_time(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs % 360_000) / 6_000;
    let secs = (total_cs % 6_000) / 100;
    let cs = total_cs % 100;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, cs)
}

fn header(style: &SubtitleConfig) -> String {
    let size = style.font_size;
    let margin = style.margin;
    let highlight = &style.highlight_color;

    format!(
        "[Script Info]\n\
         Title: Karaoke Subtitles\n\
         ScriptType: v4.00+\n\
         PlayResX: 1280\n\
         PlayResY: 720\n\
         WrapStyle: 0\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Default,Arial,{size},&HFFFFFF&,{highlight},&H000000&,&H80000000,0,0,0,0,100,100,0,0,1,2,1,2,10,10,{margin},1\n\
         Style: Highlight,Arial,{size},{highlight},{highlight},&H000000&,&H80000000,1,0,0,0,100,100,0,0,1,2,1,2,10,10,{margin},1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n"
    )
}

/// Event text for one segment: per-word `\kf` fills when word timing exists
pub fn karaoke_text(segment: &Segment) -> String {
    match segment.timed_words() {
        Some(words) => words
            .iter()
            .map(|word| format!("{{\\kf{}}}{}", word.duration_cs(), escape_text(&word.word)))
            .collect(),
        None => escape_text(segment.display_text()),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('\n', "\\N")
}

/// Dialogue line for one segment
pub fn dialogue_line(segment: &Segment) -> String {
    format!(
        "Dialogue: 0,{},{},Default,,0,0,0,,{}",
        format_ass_time(segment.start),
        format_ass_time(segment.end),
        karaoke_text(segment)
    )
}

/// Render the whole karaoke track
pub fn to_karaoke_string(segments: &[Segment], style: &SubtitleConfig) -> String {
    let events: Vec<String> = segments.iter().map(dialogue_line).collect();
    format!("{}{}\n", header(style), events.join("\n"))
}

/// Write the karaoke track to an ASS file
pub async fn write_karaoke<P: AsRef<Path>>(segments: &[Segment], style: &SubtitleConfig, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing {} karaoke events to {}", segments.len(), output_path.display());

    fs::write(output_path, to_karaoke_string(segments, style)).await?;
    Ok(())
}
