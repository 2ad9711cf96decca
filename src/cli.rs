use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::subtitle::SubtitleMode;
use crate::workflow::RunRequest;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate and burn bilingual subtitles into a video", long_about = None)]
pub struct Args {
    /// Input video file
    pub video: PathBuf,

    /// Output video path (default: <input>_<mode>.mp4)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Source language
    #[arg(short, long)]
    pub language: Option<String>,

    /// Target language
    #[arg(short, long)]
    pub target: Option<String>,

    /// Whisper model size (tiny, base, small, medium, large-v3)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Subtitle font size
    #[arg(long)]
    pub fontsize: Option<u32>,

    /// Subtitle bottom margin
    #[arg(long)]
    pub margin: Option<u32>,

    /// Only generate the subtitle file, skip the burn
    #[arg(long)]
    pub srt_only: bool,

    /// Only show the translated line
    #[arg(long, alias = "target-only")]
    pub chinese_only: bool,

    /// Only show the source line
    #[arg(long)]
    pub source_only: bool,

    /// Word-highlight karaoke subtitles (source language only)
    #[arg(long)]
    pub karaoke: bool,

    /// Karaoke highlight colour as an ASS colour code
    #[arg(long)]
    pub highlight_color: Option<String>,

    /// Drop segments whose no-speech probability exceeds this value
    #[arg(long, value_parser = parse_probability)]
    pub no_speech_threshold: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn parse_probability(value: &str) -> std::result::Result<f64, String> {
    let parsed: f64 = value.parse().map_err(|_| format!("'{}' is not a number", value))?;
    if (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("{} is outside 0.0..=1.0", parsed))
    }
}

impl Args {
    /// Overlay explicitly given flags on top of `config`
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(language) = &self.language {
            config.transcriber.language = language.clone();
        }
        if let Some(model) = &self.model {
            config.transcriber.model = model.clone();
        }
        if let Some(threshold) = self.no_speech_threshold {
            config.transcriber.no_speech_threshold = threshold;
        }
        if let Some(target) = &self.target {
            config.translate.target = target.clone();
        }
        if let Some(size) = self.fontsize {
            config.subtitle.font_size = size;
        }
        if let Some(margin) = self.margin {
            config.subtitle.margin = margin;
        }
        if let Some(color) = &self.highlight_color {
            config.subtitle.highlight_color = color.clone();
        }
    }

    /// Reduce the output flags to a run request
    pub fn run_request(&self) -> Result<RunRequest> {
        let mode = SubtitleMode::from_flags(self.chinese_only, self.source_only, self.karaoke)?;
        Ok(RunRequest {
            video: self.video.clone(),
            output: self.output.clone(),
            mode,
            subtitles_only: self.srt_only,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BisubError;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("bisub").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let args = parse(&["talk.mp4"]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.transcriber.language, "en");
        assert_eq!(config.translate.target, "zh-CN");
        assert_eq!(config.transcriber.model, "small");
        assert_eq!(config.subtitle.font_size, 14);
        assert_eq!(config.subtitle.margin, 25);

        let request = args.run_request().unwrap();
        assert_eq!(request.mode, SubtitleMode::Bilingual);
        assert!(!request.subtitles_only);
        assert!(request.output.is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "talk.mp4", "-l", "ja", "-t", "en", "-m", "medium", "--fontsize", "20", "--margin", "40",
            "--no-speech-threshold", "0.8", "--highlight-color", "&H0000FF&", "-o", "out.mp4", "--srt-only",
        ]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.transcriber.language, "ja");
        assert_eq!(config.translate.target, "en");
        assert_eq!(config.transcriber.model, "medium");
        assert_eq!(config.subtitle.font_size, 20);
        assert_eq!(config.subtitle.margin, 40);
        assert_eq!(config.transcriber.no_speech_threshold, 0.8);
        assert_eq!(config.subtitle.highlight_color, "&H0000FF&");

        let request = args.run_request().unwrap();
        assert_eq!(request.output, Some(PathBuf::from("out.mp4")));
        assert!(request.subtitles_only);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let result = Args::try_parse_from(["bisub", "talk.mp4", "--no-speech-threshold", "1.5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mode_flags() {
        assert_eq!(parse(&["v.mp4", "--target-only"]).run_request().unwrap().mode, SubtitleMode::TargetOnly);
        assert_eq!(
            parse(&["v.mp4", "--karaoke", "--chinese-only"]).run_request().unwrap().mode,
            SubtitleMode::Karaoke
        );
        let conflict = parse(&["v.mp4", "--chinese-only", "--source-only"]).run_request();
        assert!(matches!(conflict, Err(BisubError::ConflictingFlags(_))));
    }
}
