use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::encoder;
use crate::error::{BisubError, Result};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait, TrackKind};
use crate::probe::{Capability, HardwareProbe, HostPlatform, Probed, TranscriptionBackend};
use crate::report::{comparison_table, RunSummary, StageTimings};
use crate::runner::CommandRunner;
use crate::subtitle::{self, ass, srt, SubtitleMode};
use crate::transcribe::{TranscribeRequest, TranscriberFactory, TranscriptionEngine};
use crate::translate::{TranslationBatcher, TranslationEndpoint};

/// One pipeline run as requested on the command line
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub video: PathBuf,
    /// Overrides the encoded video path only
    pub output: Option<PathBuf>,
    pub mode: SubtitleMode,
    /// Stop after writing the subtitle file
    pub subtitles_only: bool,
}

/// Where a run writes its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub subtitle: PathBuf,
    pub video: PathBuf,
}

impl OutputPaths {
    /// Subtitle next to the input as `<stem><suffix>.<ext>`; video at
    /// `output` or `<stem><suffix>.mp4`
    pub fn for_input(input: &Path, mode: SubtitleMode, output: Option<&Path>) -> Result<Self> {
        let stem = input
            .file_stem()
            .ok_or_else(|| BisubError::MissingInput(input.display().to_string()))?
            .to_string_lossy();
        let dir = input.parent().unwrap_or_else(|| Path::new(""));

        let subtitle = dir.join(format!("{}{}.{}", stem, mode.suffix(), mode.extension()));
        let video = match output {
            Some(path) => path.to_path_buf(),
            None => dir.join(format!("{}{}.mp4", stem, mode.suffix())),
        };

        Ok(Self { subtitle, video })
    }
}

/// Drives probe, transcription, translation, subtitle writing and the burn
pub struct Workflow {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    endpoint: Arc<dyn TranslationEndpoint>,
    platform: HostPlatform,
    media: Box<dyn MediaProcessorTrait>,
}

impl Workflow {
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        endpoint: Arc<dyn TranslationEndpoint>,
        platform: HostPlatform,
    ) -> Self {
        let media = MediaProcessorFactory::create_processor(config.media.clone(), runner.clone());

        Self {
            config,
            runner,
            endpoint,
            platform,
            media,
        }
    }

    /// Replace the burn stage implementation
    pub fn with_media_processor(mut self, media: Box<dyn MediaProcessorTrait>) -> Self {
        self.media = media;
        self
    }

    fn hardware_probe(&self) -> HardwareProbe {
        HardwareProbe::new(
            self.runner.clone(),
            self.platform.clone(),
            self.config.transcriber.clone(),
            self.config.media.clone(),
        )
    }

    /// Run every stage for one video
    pub async fn run(&self, request: &RunRequest) -> Result<RunSummary> {
        let run_started = Instant::now();
        let input = request.video.as_path();
        if !input.is_file() {
            return Err(BisubError::MissingInput(input.display().to_string()));
        }

        let paths = OutputPaths::for_input(input, request.mode, request.output.as_deref())?;
        info!("Processing {} ({} subtitles)", input.display(), request.mode);

        let probe = self.hardware_probe();
        let mut timings = StageTimings::default();

        // Transcription
        let started = Instant::now();
        let engine = self.transcription_engine(&probe).await?;
        let transcribe_request = TranscribeRequest {
            video: input.to_path_buf(),
            language: self.config.transcriber.language.clone(),
            model: self.config.transcriber.model.clone(),
            word_timestamps: request.mode.word_timestamps(),
            no_speech_threshold: self.config.transcriber.no_speech_threshold,
            min_silence_ms: self.config.transcriber.min_silence_ms,
        };
        let outcome = engine.transcribe(&transcribe_request).await?;
        timings.record("transcribe", started.elapsed());

        if outcome.segments.is_empty() {
            warn!("No speech segments were extracted from {}", input.display());
        }

        // Translation
        let mut translation_stats = None;
        let mut translations = Vec::new();
        if request.mode.needs_translation() {
            let started = Instant::now();
            let batcher = TranslationBatcher::new(self.endpoint.clone(), self.config.translate.clone());
            let texts: Vec<String> = outcome.segments.iter().map(|s| s.display_text().to_string()).collect();
            let translated = batcher
                .translate(&texts, &self.config.transcriber.language, &self.config.translate.target)
                .await;
            if translated.stats.untranslated > 0 {
                warn!("{} lines were left untranslated", translated.stats.untranslated);
            }
            translations = translated.texts;
            translation_stats = Some(translated.stats);
            timings.record("translate", started.elapsed());
        }

        // Subtitles
        let started = Instant::now();
        if request.mode == SubtitleMode::Karaoke {
            ass::write_karaoke(&outcome.segments, &self.config.subtitle, &paths.subtitle).await?;
        } else {
            let records = subtitle::assemble(request.mode, &outcome.segments, &translations)?;
            srt::write_srt(&records, &paths.subtitle).await?;
        }
        timings.record("subtitles", started.elapsed());

        let mut summary = RunSummary {
            subtitle_path: paths.subtitle.clone(),
            video_path: None,
            encoder: None,
            segments: outcome.segments.len(),
            filtered_segments: outcome.filtered,
            translation: translation_stats,
            comparison: None,
            timings,
            elapsed: Duration::ZERO,
        };

        if request.subtitles_only {
            info!("Subtitle-only run, skipping encode");
            summary.elapsed = run_started.elapsed();
            return Ok(summary);
        }

        // Encode
        let started = Instant::now();
        let source = probe.media_info(input).await.into_value();
        let bitrate_kbps = source.bitrate_kbps_or(self.config.media.default_bitrate_kbps);
        info!("Source: {}-bit, target bitrate {}kbps", source.bit_depth, bitrate_kbps);

        let available = probe.list_video_encoders().await;
        if let Probed::Defaulted { reason, .. } = &available {
            warn!("Could not list encoders ({}), assuming none", reason);
        }
        let available = available.into_value();
        info!(
            "Available encoders: {}",
            if available.is_empty() {
                "none".to_string()
            } else {
                available.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        );

        let plan = encoder::select(&available, source.bit_depth, bitrate_kbps, self.platform.encoder_platform())
            .ok_or(BisubError::NoEncoderAvailable)?;
        info!("Selected encoder: {}", plan.primary.name);

        let kind = match request.mode {
            SubtitleMode::Karaoke => TrackKind::Styled,
            _ => TrackKind::Plain,
        };
        let used = self
            .media
            .burn_subtitles(input, &paths.subtitle, kind, &self.config.subtitle, &plan, &paths.video)
            .await?;
        summary.timings.record("encode", started.elapsed());

        let encoded = probe.media_info(&paths.video).await.into_value();
        let subtitle_bytes = tokio::fs::metadata(&paths.subtitle).await.ok().map(|m| m.len());
        summary.comparison = Some(comparison_table(&source, &encoded, subtitle_bytes));
        summary.video_path = Some(paths.video);
        summary.encoder = Some(used.name);
        summary.elapsed = run_started.elapsed();

        Ok(summary)
    }

    async fn transcription_engine(&self, probe: &HardwareProbe) -> Result<TranscriptionEngine> {
        let backend = probe.detect_transcription_backend().await?;
        let primary = TranscriberFactory::create_transcriber(backend, self.config.transcriber.clone(), self.runner.clone());
        let engine = TranscriptionEngine::new(primary);

        if !self.config.transcriber.cpu_fallback || backend == TranscriptionBackend::CpuOnly {
            return Ok(engine);
        }

        match probe.probe(TranscriptionBackend::CpuOnly).await {
            Capability::Present(cpu) => {
                info!("CPU fallback enabled for transcription");
                let fallback = TranscriberFactory::create_transcriber(cpu, self.config.transcriber.clone(), self.runner.clone());
                Ok(engine.with_fallback(fallback))
            }
            Capability::Absent(reason) => {
                warn!("CPU fallback requested but unavailable: {}", reason);
                Ok(engine)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockCommandRunner, ToolCommand};
    use crate::translate::MockTranslationEndpoint;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use std::sync::Mutex;

    const WHISPER_JSON: &str = r#"{
        "text": " Hello. Music. World.",
        "segments": [
            {"start": 0.0, "end": 1.5, "text": " Hello.", "no_speech_prob": 0.05,
             "words": [{"start": 0.0, "end": 1.5, "word": " Hello."}]},
            {"start": 1.5, "end": 3.0, "text": " Music.", "no_speech_prob": 0.9},
            {"start": 3.0, "end": 4.25, "text": " World.", "no_speech_prob": 0.1,
             "words": [{"start": 3.0, "end": 3.5, "word": " World"}, {"start": 3.5, "end": 4.25, "word": "."}]}
        ]
    }"#;

    const FFPROBE_JSON: &str = r#"{
        "streams": [{"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720,
                     "pix_fmt": "yuv420p", "bit_rate": "3000000"}],
        "format": {"duration": "4.5", "bit_rate": "3200000"}
    }"#;

    /// Simulates the host tools of a CUDA-less Linux box
    fn fake_tools(encoders: &'static str, failing_encoders: &'static [&'static str], calls: Arc<Mutex<Vec<String>>>) -> MockCommandRunner {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(move |cmd: &ToolCommand| {
            calls.lock().unwrap().push(cmd.description.clone());
            match cmd.program.as_str() {
                "nvidia-smi" => Ok(CommandOutput::failed(9, "NVIDIA-SMI has failed")),
                "whisper-ctranslate2" if cmd.args == ["--help"] => Ok(CommandOutput::ok("usage")),
                "whisper-ctranslate2" => {
                    let dir = PathBuf::from(cmd.value_of("--output_dir").unwrap());
                    std::fs::write(dir.join("talk.json"), WHISPER_JSON).unwrap();
                    Ok(CommandOutput::ok(""))
                }
                "ffprobe" => Ok(CommandOutput::ok(FFPROBE_JSON)),
                "ffmpeg" if cmd.args.contains(&"-encoders".to_string()) => Ok(CommandOutput::ok(encoders)),
                "ffmpeg" => {
                    let encoder = cmd.value_of("-c:v").unwrap();
                    if failing_encoders.iter().any(|f| *f == encoder) {
                        return Ok(CommandOutput::failed(1, format!("{} init failed", encoder)));
                    }
                    std::fs::write(cmd.args.last().unwrap(), b"encoded").unwrap();
                    Ok(CommandOutput::ok(""))
                }
                other => panic!("unexpected program {}", other),
            }
        });
        runner
    }

    const LISTING: &str = " V....D h264_nvenc  NVIDIA NVENC H.264 encoder\n V....D libx264  libx264 H.264\n";

    fn echo_endpoint() -> MockTranslationEndpoint {
        let mut endpoint = MockTranslationEndpoint::new();
        endpoint.expect_translate().returning(|text, _, _, _| {
            Ok(text
                .split("###")
                .map(|line| format!("译({})", line.trim()))
                .collect::<Vec<_>>()
                .join("\n###\n"))
        });
        endpoint
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.translate.batch_delay_ms = 0;
        config.translate.item_delay_ms = 0;
        config
    }

    fn workflow(runner: MockCommandRunner, endpoint: MockTranslationEndpoint) -> Workflow {
        let runner: Arc<dyn CommandRunner> = Arc::new(runner);
        let media = crate::media::MediaProcessorImpl::new(config().media, runner.clone()).quiet();
        Workflow::new(config(), runner, Arc::new(endpoint), HostPlatform::new("linux", "x86_64"))
            .with_media_processor(Box::new(media))
    }

    fn request(video: PathBuf, mode: SubtitleMode, subtitles_only: bool) -> RunRequest {
        RunRequest { video, output: None, mode, subtitles_only }
    }

    #[test]
    fn test_output_paths_per_mode() {
        let input = Path::new("/videos/talk.mp4");
        let paths = OutputPaths::for_input(input, SubtitleMode::Bilingual, None).unwrap();
        assert_eq!(paths.subtitle, PathBuf::from("/videos/talk_bilingual.srt"));
        assert_eq!(paths.video, PathBuf::from("/videos/talk_bilingual.mp4"));

        let paths = OutputPaths::for_input(input, SubtitleMode::Karaoke, Some(Path::new("/out/final.mp4"))).unwrap();
        assert_eq!(paths.subtitle, PathBuf::from("/videos/talk_karaoke.ass"));
        assert_eq!(paths.video, PathBuf::from("/out/final.mp4"));

        let paths = OutputPaths::for_input(input, SubtitleMode::TargetOnly, None).unwrap();
        assert_eq!(paths.subtitle, PathBuf::from("/videos/talk_zh.srt"));
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_any_stage() {
        let runner = MockCommandRunner::new();
        let endpoint = MockTranslationEndpoint::new();
        let result = workflow(runner, endpoint)
            .run(&request(PathBuf::from("/nonexistent/talk.mp4"), SubtitleMode::Bilingual, false))
            .await;
        assert!(matches!(result, Err(BisubError::MissingInput(_))));
    }

    #[tokio::test]
    async fn test_bilingual_run_writes_subtitles_and_video() {
        let temp = TempDir::new().unwrap();
        let video = temp.child("talk.mp4");
        video.write_binary(b"source").unwrap();

        let runner = fake_tools(LISTING, &[], Arc::new(Mutex::new(Vec::new())));
        let summary = workflow(runner, echo_endpoint())
            .run(&request(video.path().to_path_buf(), SubtitleMode::Bilingual, false))
            .await
            .unwrap();

        let srt_file = temp.child("talk_bilingual.srt");
        let records = srt::parse_srt(&std::fs::read_to_string(srt_file.path()).unwrap()).unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello.\n译(Hello.)", "World.\n译(World.)"]);
        assert_eq!(records[1].start_ms, 3000);
        assert_eq!(records[1].end_ms, 4250);

        assert!(temp.child("talk_bilingual.mp4").path().exists());
        assert_eq!(summary.filtered_segments, 1);
        assert_eq!(summary.encoder.as_deref(), Some("h264_nvenc"));
        assert!(summary.comparison.unwrap().contains("1280x720"));
        assert!(summary.elapsed >= summary.timings.total());
    }

    #[tokio::test]
    async fn test_karaoke_run_skips_translation() {
        let temp = TempDir::new().unwrap();
        let video = temp.child("talk.mp4");
        video.write_binary(b"source").unwrap();

        let runner = fake_tools(LISTING, &[], Arc::new(Mutex::new(Vec::new())));
        let endpoint = MockTranslationEndpoint::new();
        let summary = workflow(runner, endpoint)
            .run(&request(video.path().to_path_buf(), SubtitleMode::Karaoke, true))
            .await
            .unwrap();

        let ass_file = std::fs::read_to_string(temp.child("talk_karaoke.ass").path()).unwrap();
        assert!(ass_file.contains("{\\kf50} World{\\kf75}."));
        assert!(summary.translation.is_none());
        assert!(summary.video_path.is_none());
        assert!(summary.elapsed >= summary.timings.total());
    }

    #[tokio::test]
    async fn test_failed_encoder_falls_back() {
        let temp = TempDir::new().unwrap();
        let video = temp.child("talk.mp4");
        video.write_binary(b"source").unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = fake_tools(LISTING, &["h264_nvenc"], calls.clone());
        let summary = workflow(runner, echo_endpoint())
            .run(&request(video.path().to_path_buf(), SubtitleMode::SourceOnly, false))
            .await
            .unwrap();

        assert_eq!(summary.encoder.as_deref(), Some("libx264"));
        let burns: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.starts_with("Subtitle burn"))
            .cloned()
            .collect();
        assert_eq!(burns, vec!["Subtitle burn with h264_nvenc", "Subtitle burn with libx264"]);
    }

    #[tokio::test]
    async fn test_no_encoder_is_fatal_after_subtitles_are_written() {
        let temp = TempDir::new().unwrap();
        let video = temp.child("talk.mp4");
        video.write_binary(b"source").unwrap();

        let runner = fake_tools("Encoders:\n ------\n", &[], Arc::new(Mutex::new(Vec::new())));
        let result = workflow(runner, echo_endpoint())
            .run(&request(video.path().to_path_buf(), SubtitleMode::Bilingual, false))
            .await;

        assert!(matches!(result, Err(BisubError::NoEncoderAvailable)));
        assert!(temp.child("talk_bilingual.srt").path().exists());
        assert!(!temp.child("talk_bilingual.mp4").path().exists());
    }
}
