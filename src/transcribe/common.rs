use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, BisubError};
use crate::runner::{CommandRunner, ToolCommand};
use crate::segment::{Segment, Word};

/// Parameters of one transcription run
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeRequest {
    pub video: PathBuf,
    pub language: String,
    pub model: String,
    /// Only requested for karaoke output
    pub word_timestamps: bool,
    pub no_speech_threshold: f64,
    pub min_silence_ms: u32,
}

/// JSON document written by the whisper front ends (`--output_format json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperJsonOutput {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<WhisperJsonSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperJsonSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub no_speech_prob: Option<f64>,
    #[serde(default)]
    pub avg_logprob: Option<f64>,
    #[serde(default)]
    pub words: Option<Vec<WhisperJsonWord>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperJsonWord {
    pub start: f64,
    pub end: f64,
    pub word: String,
    #[serde(default)]
    pub probability: Option<f64>,
}

impl WhisperJsonOutput {
    /// Map backend segments to pipeline segments, keeping word timing only when asked
    pub fn into_segments(self, keep_words: bool) -> Vec<Segment> {
        self.segments
            .into_iter()
            .map(|seg| {
                let words = if keep_words {
                    seg.words.map(|words| {
                        words
                            .into_iter()
                            .map(|w| Word { start: w.start, end: w.end, word: w.word })
                            .collect()
                    })
                } else {
                    None
                };

                Segment {
                    start: seg.start,
                    end: seg.end,
                    text: seg.text,
                    words,
                    no_speech_prob: seg.no_speech_prob.unwrap_or(0.0),
                }
            })
            .collect()
    }
}

/// Run a whisper front end and read the JSON it leaves in `output_dir`
pub async fn run_whisper_cli(
    runner: &dyn CommandRunner,
    command: &ToolCommand,
    video: &Path,
    output_dir: &Path,
) -> Result<WhisperJsonOutput> {
    let output = runner.run(command).await?;
    if !output.success {
        return Err(BisubError::Transcriber(format!(
            "{} failed: {}",
            command.description,
            output.stderr_tail(500)
        )));
    }

    let json_file = locate_json_output(video, output_dir)?;
    debug!("Reading transcription output: {}", json_file.display());

    let content = tokio::fs::read_to_string(&json_file)
        .await
        .map_err(|e| BisubError::Transcriber(format!("Failed to read output: {}", e)))?;

    serde_json::from_str(&content)
        .map_err(|e| BisubError::Transcriber(format!("Failed to parse whisper JSON: {}", e)))
}

fn locate_json_output(video: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = video
        .file_stem()
        .ok_or_else(|| BisubError::Transcriber("Invalid video filename".to_string()))?;
    let expected = output_dir.join(format!("{}.json", stem.to_string_lossy()));
    if expected.exists() {
        return Ok(expected);
    }

    // Some front ends sanitise the output name
    std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|path| path.extension().is_some_and(|ext| ext == "json"))
        .ok_or_else(|| BisubError::Transcriber(format!("No JSON output in {}", output_dir.display())))
}
