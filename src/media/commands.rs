use std::path::Path;

use crate::config::SubtitleConfig;
use crate::encoder::EncoderChoice;
use crate::runner::ToolCommand;

/// Subtitle track kind, which decides the burn filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Plain SRT, styled at burn time
    Plain,
    /// ASS track carrying its own styles
    Styled,
}

/// Escape a path for use inside a quoted ffmpeg filter argument
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace(':', "\\:")
}

/// `-vf` value that renders the subtitle track onto the video
pub fn subtitle_filter(subtitle_path: &Path, kind: TrackKind, style: &SubtitleConfig) -> String {
    let escaped = escape_filter_path(subtitle_path);
    match kind {
        TrackKind::Styled => format!("ass='{}'", escaped),
        TrackKind::Plain => format!(
            "subtitles='{}':force_style='FontSize={},MarginV={},BorderStyle=4,BackColour=&H80000000'",
            escaped, style.font_size, style.margin
        ),
    }
}

/// Builder for the ffmpeg invocations of the burn stage
pub struct BurnCommandBuilder {
    binary_path: String,
}

impl BurnCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self { binary_path: binary_path.into() }
    }

    /// Re-encode `video` with `filter` applied, copying the audio stream.
    ///
    /// No timeout: the encode runs to completion or failure.
    pub fn burn<P: AsRef<Path>>(&self, video: P, filter: &str, encoder: &EncoderChoice, output: P) -> ToolCommand {
        ToolCommand::new(&self.binary_path, format!("Subtitle burn with {}", encoder.name))
            .arg("-y")
            .arg("-i")
            .path_arg(video)
            .arg("-vf")
            .arg(filter)
            .args(encoder.to_args())
            .args(["-c:a", "copy"])
            .path_arg(output)
    }
}
