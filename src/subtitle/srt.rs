use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::error::{Result, BisubError};
use super::SubtitleRecord;

static TIMESTAMP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2,}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2,}):(\d{2}):(\d{2}),(\d{3})$")
        .expect("timestamp pattern is valid")
});

static BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").expect("block pattern is valid"));

/// Convert seconds to whole milliseconds
pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Format milliseconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_srt_time(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Render records as SRT text
pub fn to_srt_string(records: &[SubtitleRecord]) -> String {
    let mut content = String::new();

    for record in records {
        content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            record.index,
            format_srt_time(record.start_ms),
            format_srt_time(record.end_ms),
            record.text
        ));
    }

    content
}

/// Write records to an SRT file
pub async fn write_srt<P: AsRef<Path>>(records: &[SubtitleRecord], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing {} subtitle blocks to {}", records.len(), output_path.display());

    fs::write(output_path, to_srt_string(records)).await?;
    Ok(())
}

/// Parse SRT text back into records
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleRecord>> {
    let normalized = content.replace("\r\n", "\n");
    let mut records = Vec::new();

    for block in BLOCK_BREAK.split(normalized.trim()) {
        if block.trim().is_empty() {
            continue;
        }

        let mut lines = block.split('\n');
        let index_line = lines.next().unwrap_or_default().trim();
        let index: usize = index_line
            .parse()
            .map_err(|_| BisubError::Media(format!("Invalid subtitle index: {:?}", index_line)))?;

        let timestamp_line = lines.next().unwrap_or_default().trim();
        let caps = TIMESTAMP_LINE
            .captures(timestamp_line)
            .ok_or_else(|| BisubError::Media(format!("Invalid timestamp line: {:?}", timestamp_line)))?;

        let text = lines.collect::<Vec<_>>().join("\n");
        records.push(SubtitleRecord {
            index,
            start_ms: captured_ms(&caps, 1)?,
            end_ms: captured_ms(&caps, 5)?,
            text,
        });
    }

    Ok(records)
}

fn captured_ms(caps: &regex::Captures, first: usize) -> Result<u64> {
    let field = |i: usize| -> Result<u64> {
        caps[first + i]
            .parse::<u64>()
            .map_err(|e| BisubError::Media(format!("Invalid timestamp field: {}", e)))
    };
    Ok(field(0)? * 3_600_000 + field(1)? * 60_000 + field(2)? * 1_000 + field(3)?)
}
