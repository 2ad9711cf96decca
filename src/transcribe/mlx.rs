// mlx-whisper backend for Apple silicon

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::{Result, BisubError};
use crate::probe::TranscriptionBackend;
use crate::runner::{CommandRunner, ToolCommand};
use crate::segment::Segment;
use super::{TranscriberTrait, common::{TranscribeRequest, run_whisper_cli}};

pub struct MlxWhisperTranscriber {
    config: TranscriberConfig,
    runner: Arc<dyn CommandRunner>,
}

impl MlxWhisperTranscriber {
    pub fn new(config: TranscriberConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Hugging Face repository holding the converted weights
    pub fn model_repo(model: &str) -> String {
        format!("mlx-community/whisper-{}-mlx", model)
    }

    pub fn build_command(&self, request: &TranscribeRequest, output_dir: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.config.mlx_binary, "mlx-whisper transcription")
            .path_arg(&request.video)
            .arg("--model")
            .arg(Self::model_repo(&request.model))
            .args(["--language", request.language.as_str()])
            .arg("--output-dir")
            .path_arg(output_dir)
            .args(["--output-format", "json"]);

        if request.word_timestamps {
            cmd = cmd.args(["--word-timestamps", "True"]);
        }
        cmd
    }
}

#[async_trait]
impl TranscriberTrait for MlxWhisperTranscriber {
    fn backend(&self) -> TranscriptionBackend {
        TranscriptionBackend::AppleSilicon
    }

    async fn transcribe(&self, request: &TranscribeRequest) -> Result<Vec<Segment>> {
        info!("Transcribing {} with mlx-whisper", request.video.display());
        // mlx-whisper has no VAD option; non-speech is removed by the no-speech threshold
        debug!("Minimum silence gap {}ms not applicable to mlx-whisper", request.min_silence_ms);

        let temp_dir = tempfile::tempdir()
            .map_err(|e| BisubError::Transcriber(format!("Failed to create temp directory: {}", e)))?;
        let command = self.build_command(request, temp_dir.path());

        let output = run_whisper_cli(self.runner.as_ref(), &command, &request.video, temp_dir.path()).await?;
        Ok(output.into_segments(request.word_timestamps))
    }
}
