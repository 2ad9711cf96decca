use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{MediaConfig, SubtitleConfig};
use crate::encoder::{EncoderChoice, EncoderPlan};
use crate::error::{BisubError, Result};
use crate::runner::CommandRunner;
use super::{BurnCommandBuilder, MediaProcessorTrait, TrackKind, subtitle_filter};

/// Characters of encoder stderr kept for the final diagnostic
const STDERR_TAIL_CHARS: usize = 500;

/// ffmpeg-backed implementation of the burn stage
pub struct MediaProcessorImpl {
    runner: Arc<dyn CommandRunner>,
    command_builder: BurnCommandBuilder,
    show_progress: bool,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let command_builder = BurnCommandBuilder::new(&config.ffmpeg_binary);

        Self {
            runner,
            command_builder,
            show_progress: true,
        }
    }

    /// Disable the console spinner
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    fn spinner(&self, encoder: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Encoding with {}", encoder));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        kind: TrackKind,
        style: &SubtitleConfig,
        plan: &EncoderPlan,
        output_path: &Path,
    ) -> Result<EncoderChoice> {
        info!(
            "Burning {} into {} -> {}",
            subtitle_path.display(),
            video_path.display(),
            output_path.display()
        );

        let filter = subtitle_filter(subtitle_path, kind, style);
        let mut last_failure: Option<(String, String)> = None;

        for encoder in plan.candidates() {
            if last_failure.is_some() {
                info!("Trying fallback encoder {}", encoder.name);
            } else {
                info!("Encoding with {}", encoder.name);
            }

            let command = self.command_builder.burn(video_path, &filter, encoder, output_path);
            let spinner = self.spinner(&encoder.name);
            let result = self.runner.run(&command).await;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            match result {
                Ok(output) if output.success => {
                    info!("Encode finished with {}", encoder.name);
                    return Ok(encoder.clone());
                }
                Ok(output) => {
                    warn!("Encoder {} failed with exit code {:?}", encoder.name, output.code);
                    last_failure = Some((encoder.name.clone(), output.stderr_tail(STDERR_TAIL_CHARS)));
                }
                Err(e) => {
                    warn!("Encoder {} could not run: {}", encoder.name, e);
                    last_failure = Some((encoder.name.clone(), e.to_string()));
                }
            }
        }

        let (encoder, stderr_tail) = last_failure.unwrap_or_else(|| (plan.primary.name.clone(), String::new()));
        Err(BisubError::EncodeFailed { encoder, stderr_tail })
    }
}
