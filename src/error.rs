use thiserror::Error;

#[derive(Error, Debug)]
pub enum BisubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Input video not found: {0}")]
    MissingInput(String),

    #[error("No transcription backend available ({0}). Install faster-whisper (whisper-ctranslate2) or mlx-whisper")]
    NoBackendAvailable(String),

    #[error("Transcription error: {0}")]
    Transcriber(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("No usable video encoder found. Install an ffmpeg build with libx264 or libx265 support")]
    NoEncoderAvailable,

    #[error("All encoders failed, last was {encoder}: {stderr_tail}")]
    EncodeFailed { encoder: String, stderr_tail: String },

    #[error("Conflicting flags: {0}")]
    ConflictingFlags(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} timed out after {1}s")]
    Timeout(String, u64),
}

pub type Result<T> = std::result::Result<T, BisubError>;
