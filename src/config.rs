use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, BisubError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub subtitle: SubtitleConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Whisper model size (tiny, base, small, medium, large-v3)
    pub model: String,
    /// Source language spoken in the video
    pub language: String,
    /// Segments whose no-speech probability exceeds this are dropped
    pub no_speech_threshold: f64,
    /// Minimum silence gap for voice-activity filtering, in milliseconds
    pub min_silence_ms: u32,
    /// mlx-whisper command-line entry point (Apple silicon)
    pub mlx_binary: String,
    /// faster-whisper command-line entry point (CUDA and CPU)
    pub faster_whisper_binary: String,
    /// Tool used to detect a CUDA-capable device
    pub gpu_probe_binary: String,
    /// Retry once on the CPU backend when a hardware backend fails mid-run
    pub cpu_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Translation endpoint URL
    pub endpoint: String,
    /// Target language code
    pub target: String,
    /// Number of subtitle lines joined into one request
    pub batch_size: usize,
    /// Per-request timeout for a joined batch, in seconds
    pub batch_timeout_secs: u64,
    /// Per-request timeout for a single line, in seconds
    pub item_timeout_secs: u64,
    /// Pause after a degraded batch before the next one, in milliseconds
    pub batch_delay_ms: u64,
    /// Pause between individual fallback requests, in milliseconds
    pub item_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub font_size: u32,
    /// Bottom margin of burned subtitles
    pub margin: u32,
    /// ASS colour code used for the karaoke fill
    pub highlight_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_binary: String,
    /// Path to ffprobe binary
    pub ffprobe_binary: String,
    /// Timeout applied to capability and media-info probes, in seconds
    pub probe_timeout_secs: u64,
    /// Target bitrate used when the source bitrate cannot be read
    pub default_bitrate_kbps: u32,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            model: "small".to_string(),
            language: "en".to_string(),
            no_speech_threshold: 0.6,
            min_silence_ms: 500,
            mlx_binary: "mlx_whisper".to_string(),
            faster_whisper_binary: "whisper-ctranslate2".to_string(),
            gpu_probe_binary: "nvidia-smi".to_string(),
            cpu_fallback: false,
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            target: "zh-CN".to_string(),
            batch_size: 10,
            batch_timeout_secs: 30,
            item_timeout_secs: 10,
            batch_delay_ms: 200,
            item_delay_ms: 100,
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            font_size: 14,
            margin: 25,
            highlight_color: "&H00FFFF&".to_string(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
            probe_timeout_secs: 10,
            default_bitrate_kbps: 2000,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BisubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| BisubError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BisubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| BisubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.transcriber.no_speech_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(BisubError::Config(format!(
                "no_speech_threshold must be within 0..=1, got {}",
                threshold
            )));
        }
        if self.translate.batch_size == 0 {
            return Err(BisubError::Config("batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = Config::default();
        assert_eq!(config.transcriber.no_speech_threshold, 0.6);
        assert_eq!(config.transcriber.min_silence_ms, 500);
        assert_eq!(config.translate.batch_size, 10);
        assert_eq!(config.subtitle.font_size, 14);
        assert_eq!(config.subtitle.margin, 25);
        assert_eq!(config.media.default_bitrate_kbps, 2000);
        assert!(!config.transcriber.cpu_fallback);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bisub.toml");
        std::fs::write(&path, "[translate]\ntarget = \"ja\"\nbatch_size = 4\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.translate.target, "ja");
        assert_eq!(config.translate.batch_size, 4);
        assert_eq!(config.translate.item_timeout_secs, 10);
        assert_eq!(config.transcriber.model, "small");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bisub.toml");
        let mut config = Config::default();
        config.subtitle.highlight_color = "&H0000FF&".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.subtitle.highlight_color, "&H0000FF&");
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.transcriber.no_speech_threshold = 1.5;
        assert!(matches!(config.validate(), Err(BisubError::Config(_))));

        config.transcriber.no_speech_threshold = 0.6;
        config.translate.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
