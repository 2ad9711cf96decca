//! Human-readable run reporting: stage timings, the input/output
//! comparison table and the final summary.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::segment::MediaInfo;
use crate::translate::TranslationStats;

const RULE_WIDTH: usize = 50;

/// Elapsed time as `12.3s`, `2m 3.4s` or `1h 2m 3.4s`
pub fn format_duration(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        format!("{}m {:.1}s", minutes as u64, seconds - minutes * 60.0)
    } else {
        let hours = (seconds / 3600.0).floor();
        let rest = seconds - hours * 3600.0;
        let minutes = (rest / 60.0).floor();
        format!("{}h {}m {:.1}s", hours as u64, minutes as u64, rest - minutes * 60.0)
    }
}

/// File size with a binary unit, one decimal
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}TB", value)
}

/// Media length as `m:ss`, or `h:mm:ss` past an hour
pub fn format_video_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Wall-clock time spent in each stage
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    stages: Vec<(String, Duration)>,
}

impl StageTimings {
    pub fn record(&mut self, stage: impl Into<String>, elapsed: Duration) {
        self.stages.push((stage.into(), elapsed));
    }

    pub fn stages(&self) -> &[(String, Duration)] {
        &self.stages
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, d)| *d).sum()
    }
}

/// Side-by-side table of the source and the encoded output.
///
/// Rows whose source value is unknown are left out.
pub fn comparison_table(input: &MediaInfo, output: &MediaInfo, subtitle_bytes: Option<u64>) -> String {
    let mut table = String::new();
    let rule = "-".repeat(RULE_WIDTH);

    let _ = writeln!(table, "{}", rule);
    let _ = writeln!(table, "{:12} {:>16}    {:>16}", "", "Input", "Output");
    let _ = writeln!(table, "{}", rule);

    let mut row = |label: &str, left: String, right: String| {
        let _ = writeln!(table, "{:12} {:>16}    {:>16}", label, left, right);
    };

    row("Size", format_size(input.size_bytes), format_size(output.size_bytes));
    if input.duration_seconds > 0.0 {
        row(
            "Duration",
            format_video_duration(input.duration_seconds),
            format_video_duration(output.duration_seconds),
        );
    }
    if input.width > 0 {
        row(
            "Resolution",
            format!("{}x{}", input.width, input.height),
            format!("{}x{}", output.width, output.height),
        );
    }
    if !input.codec_name.is_empty() {
        row("Codec", input.codec_name.clone(), output.codec_name.clone());
    }
    if input.bitrate_bps > 0 {
        row(
            "Bitrate",
            format!("{}kbps", input.bitrate_bps / 1000),
            format!("{}kbps", output.bitrate_bps / 1000),
        );
    }
    if let Some(bytes) = subtitle_bytes {
        row("Subtitles", format_size(bytes), String::new());
    }

    let _ = writeln!(table, "{}", rule);
    table
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub subtitle_path: PathBuf,
    /// `None` in subtitle-only runs
    pub video_path: Option<PathBuf>,
    pub encoder: Option<String>,
    pub segments: usize,
    pub filtered_segments: usize,
    pub translation: Option<TranslationStats>,
    /// Input/output table, present once a video was encoded
    pub comparison: Option<String>,
    pub timings: StageTimings,
    /// Wall clock for the whole run, including work between stages
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(table) = &self.comparison {
            out.push_str(table);
        }
        let _ = writeln!(out, "Stage timings:");
        for (stage, elapsed) in self.timings.stages() {
            let _ = writeln!(out, "  {:<14} {}", stage, format_duration(*elapsed));
        }

        let _ = writeln!(
            out,
            "Segments: {} kept, {} filtered as non-speech",
            self.segments, self.filtered_segments
        );
        if let Some(stats) = &self.translation {
            if stats.degraded_batches > 0 || stats.untranslated > 0 {
                let _ = writeln!(
                    out,
                    "Translation: {} of {} batches degraded, {} lines left untranslated",
                    stats.degraded_batches, stats.batches, stats.untranslated
                );
            }
        }

        let _ = writeln!(out, "Subtitles: {}", self.subtitle_path.display());
        if let Some(video) = &self.video_path {
            match &self.encoder {
                Some(encoder) => {
                    let _ = writeln!(out, "Video:     {} ({})", video.display(), encoder);
                }
                None => {
                    let _ = writeln!(out, "Video:     {}", video.display());
                }
            }
        }
        let _ = writeln!(out, "Total time: {}", format_duration(self.elapsed));
        out
    }
}
