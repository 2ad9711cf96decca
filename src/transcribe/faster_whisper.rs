// faster-whisper backend, driven through the whisper-ctranslate2 front end

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::TranscriberConfig;
use crate::error::{Result, BisubError};
use crate::probe::TranscriptionBackend;
use crate::runner::{CommandRunner, ToolCommand};
use crate::segment::Segment;
use super::{TranscriberTrait, common::{TranscribeRequest, run_whisper_cli}};

/// Device faster-whisper runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    fn flag(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    fn compute_type(&self) -> &'static str {
        match self {
            Device::Cuda => "float16",
            Device::Cpu => "int8",
        }
    }
}

pub struct FasterWhisperTranscriber {
    config: TranscriberConfig,
    runner: Arc<dyn CommandRunner>,
    device: Device,
}

impl FasterWhisperTranscriber {
    pub fn new(config: TranscriberConfig, runner: Arc<dyn CommandRunner>, device: Device) -> Self {
        Self { config, runner, device }
    }

    pub fn build_command(&self, request: &TranscribeRequest, output_dir: &std::path::Path) -> ToolCommand {
        ToolCommand::new(&self.config.faster_whisper_binary, "faster-whisper transcription")
            .path_arg(&request.video)
            .args(["--model", request.model.as_str()])
            .args(["--device", self.device.flag()])
            .args(["--compute_type", self.device.compute_type()])
            .args(["--language", request.language.as_str()])
            .arg("--output_dir")
            .path_arg(output_dir)
            .args(["--output_format", "json"])
            .args(["--vad_filter", "True"])
            .arg("--vad_min_silence_duration_ms")
            .arg(request.min_silence_ms.to_string())
            .arg("--word_timestamps")
            .arg(if request.word_timestamps { "True" } else { "False" })
    }
}

#[async_trait]
impl TranscriberTrait for FasterWhisperTranscriber {
    fn backend(&self) -> TranscriptionBackend {
        match self.device {
            Device::Cuda => TranscriptionBackend::CudaGpu,
            Device::Cpu => TranscriptionBackend::CpuOnly,
        }
    }

    async fn transcribe(&self, request: &TranscribeRequest) -> Result<Vec<Segment>> {
        info!(
            "Transcribing {} with faster-whisper on {} ({})",
            request.video.display(),
            self.device.flag(),
            self.device.compute_type()
        );

        let temp_dir = tempfile::tempdir()
            .map_err(|e| BisubError::Transcriber(format!("Failed to create temp directory: {}", e)))?;
        let command = self.build_command(request, temp_dir.path());

        let output = run_whisper_cli(self.runner.as_ref(), &command, &request.video, temp_dir.path()).await?;
        Ok(output.into_segments(request.word_timestamps))
    }
}
