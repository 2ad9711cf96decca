// Media processing
//
// - Commands: ffmpeg burn command and subtitle filter construction
// - Processor: runs an encoder plan, walking its fallbacks in order

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::{MediaConfig, SubtitleConfig};
use crate::encoder::{EncoderChoice, EncoderPlan};
use crate::error::Result;
use crate::runner::CommandRunner;

/// Main trait for the subtitle burn stage
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Burn `subtitle_path` into `video_path`, trying each encoder of `plan`
    /// in order. Returns the encoder that succeeded.
    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        kind: TrackKind,
        style: &SubtitleConfig,
        plan: &EncoderPlan,
        output_path: &Path,
    ) -> Result<EncoderChoice>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    pub fn create_processor(config: MediaConfig, runner: Arc<dyn CommandRunner>) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config, runner))
    }
}
