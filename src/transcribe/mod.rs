// Modular transcription architecture
//
// One backend per acceleration class, created by a factory from the probe result:
// - AppleSilicon: mlx-whisper
// - CudaGpu / CpuOnly: faster-whisper (float16 on CUDA, int8 on CPU)
//
// Every backend emits raw segments; TranscriptionEngine applies the
// no-speech filter and ordering so callers only ever see clean segments.

pub mod common;
pub mod faster_whisper;
pub mod mlx;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use common::*;
use crate::config::TranscriberConfig;
use crate::error::Result;
use crate::probe::TranscriptionBackend;
use crate::runner::CommandRunner;
use crate::segment::Segment;

/// Main trait for transcription backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    /// Acceleration class this backend runs on
    fn backend(&self) -> TranscriptionBackend;

    /// Raw, unfiltered segments for the request
    async fn transcribe(&self, request: &TranscribeRequest) -> Result<Vec<Segment>>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(
        backend: TranscriptionBackend,
        config: TranscriberConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Box<dyn TranscriberTrait> {
        match backend {
            TranscriptionBackend::AppleSilicon => {
                Box::new(mlx::MlxWhisperTranscriber::new(config, runner))
            }
            TranscriptionBackend::CudaGpu => {
                Box::new(faster_whisper::FasterWhisperTranscriber::new(config, runner, faster_whisper::Device::Cuda))
            }
            TranscriptionBackend::CpuOnly => {
                Box::new(faster_whisper::FasterWhisperTranscriber::new(config, runner, faster_whisper::Device::Cpu))
            }
        }
    }
}

/// Segments kept after filtering, plus diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredSegments {
    pub segments: Vec<Segment>,
    /// Dropped for exceeding the no-speech threshold
    pub filtered: usize,
    /// Dropped for an empty or inverted time range
    pub malformed: usize,
}

/// Drop non-speech and malformed segments and order the rest by start time
pub fn filter_segments(raw: Vec<Segment>, no_speech_threshold: f64) -> FilteredSegments {
    let mut filtered = 0;
    let mut malformed = 0;
    let mut segments = Vec::with_capacity(raw.len());

    for segment in raw {
        if segment.no_speech_prob > no_speech_threshold {
            filtered += 1;
            continue;
        }
        if !(segment.start < segment.end) {
            malformed += 1;
            continue;
        }
        segments.push(segment);
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    FilteredSegments { segments, filtered, malformed }
}

/// Result of the transcription stage
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub backend: TranscriptionBackend,
    pub segments: Vec<Segment>,
    pub filtered: usize,
}

/// Drives one backend, with an optional explicit CPU retry
pub struct TranscriptionEngine {
    primary: Box<dyn TranscriberTrait>,
    fallback: Option<Box<dyn TranscriberTrait>>,
}

impl TranscriptionEngine {
    pub fn new(primary: Box<dyn TranscriberTrait>) -> Self {
        Self { primary, fallback: None }
    }

    /// Backend retried once if the primary fails mid-run
    pub fn with_fallback(mut self, fallback: Box<dyn TranscriberTrait>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub async fn transcribe(&self, request: &TranscribeRequest) -> Result<TranscriptionOutcome> {
        let (backend, raw) = match self.primary.transcribe(request).await {
            Ok(raw) => (self.primary.backend(), raw),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    warn!("{} failed ({}), retrying on {}", self.primary.backend(), e, fallback.backend());
                    (fallback.backend(), fallback.transcribe(request).await?)
                }
                None => return Err(e),
            },
        };

        let total = raw.len();
        let result = filter_segments(raw, request.no_speech_threshold);
        if result.malformed > 0 {
            debug!("Dropped {} segments with an empty time range", result.malformed);
        }
        info!(
            "Extracted {} of {} segments ({} filtered as non-speech)",
            result.segments.len(),
            total,
            result.filtered
        );

        Ok(TranscriptionOutcome {
            backend,
            segments: result.segments,
            filtered: result.filtered,
        })
    }
}
