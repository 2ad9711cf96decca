//! Hardware and toolchain capability probing.
//!
//! Backend detection walks an ordered list of capability probes and takes
//! the first one that is present. Encoder listing never fails: a crashed
//! probe degrades to an empty set, but the degradation is visible through
//! [`Probed::Defaulted`]. Media-info queries follow the same rule.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{MediaConfig, TranscriberConfig};
use crate::encoder::{Platform, KNOWN_ENCODERS};
use crate::error::{Result, BisubError};
use crate::runner::{CommandRunner, ToolCommand};
use crate::segment::MediaInfo;

/// Result of a best-effort probe
#[derive(Debug, Clone, PartialEq)]
pub enum Probed<T> {
    /// The probe ran and produced a value
    Found(T),
    /// The probe could not run; `value` is the fallback default
    Defaulted { value: T, reason: String },
}

impl<T> Probed<T> {
    pub fn value(&self) -> &T {
        match self {
            Probed::Found(value) | Probed::Defaulted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Probed::Found(value) | Probed::Defaulted { value, .. } => value,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Probed::Defaulted { .. })
    }
}

/// Acceleration class used for transcription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscriptionBackend {
    AppleSilicon,
    CudaGpu,
    CpuOnly,
}

impl TranscriptionBackend {
    /// Detection order, strongest first
    pub const PREFERENCE: [TranscriptionBackend; 3] = [
        TranscriptionBackend::AppleSilicon,
        TranscriptionBackend::CudaGpu,
        TranscriptionBackend::CpuOnly,
    ];
}

impl fmt::Display for TranscriptionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TranscriptionBackend::AppleSilicon => "mlx-whisper (Apple Silicon)",
            TranscriptionBackend::CudaGpu => "faster-whisper (CUDA GPU)",
            TranscriptionBackend::CpuOnly => "faster-whisper (CPU int8)",
        };
        f.write_str(label)
    }
}

/// Outcome of one capability probe
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    Present(TranscriptionBackend),
    Absent(String),
}

/// Operating system and architecture the pipeline runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: String,
    pub arch: String,
}

impl HostPlatform {
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn new(os: &str, arch: &str) -> Self {
        Self { os: os.to_string(), arch: arch.to_string() }
    }

    pub fn is_apple(&self) -> bool {
        self.os == "macos"
    }

    pub fn is_apple_silicon(&self) -> bool {
        self.is_apple() && self.arch == "aarch64"
    }

    pub fn encoder_platform(&self) -> Platform {
        if self.is_apple() { Platform::Apple } else { Platform::Other }
    }
}

pub struct HardwareProbe {
    runner: Arc<dyn CommandRunner>,
    platform: HostPlatform,
    transcriber: TranscriberConfig,
    media: MediaConfig,
}

impl HardwareProbe {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        platform: HostPlatform,
        transcriber: TranscriberConfig,
        media: MediaConfig,
    ) -> Self {
        Self { runner, platform, transcriber, media }
    }

    pub fn platform(&self) -> &HostPlatform {
        &self.platform
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.media.probe_timeout_secs)
    }

    /// Pick the strongest transcription backend whose runtime is installed
    pub async fn detect_transcription_backend(&self) -> Result<TranscriptionBackend> {
        let mut reasons = Vec::new();

        for backend in TranscriptionBackend::PREFERENCE {
            match self.probe(backend).await {
                Capability::Present(found) => {
                    info!("Transcription backend: {}", found);
                    return Ok(found);
                }
                Capability::Absent(reason) => {
                    debug!("Backend {:?} unavailable: {}", backend, reason);
                    reasons.push(format!("{:?}: {}", backend, reason));
                }
            }
        }

        Err(BisubError::NoBackendAvailable(reasons.join("; ")))
    }

    /// Probe a single acceleration class
    pub async fn probe(&self, backend: TranscriptionBackend) -> Capability {
        match backend {
            TranscriptionBackend::AppleSilicon => {
                if !self.platform.is_apple_silicon() {
                    return Capability::Absent(format!(
                        "host is {}/{}",
                        self.platform.os, self.platform.arch
                    ));
                }
                self.runtime_capability(&self.transcriber.mlx_binary, backend).await
            }
            TranscriptionBackend::CudaGpu => {
                if !self.cuda_device_present().await {
                    return Capability::Absent("no CUDA device detected".to_string());
                }
                self.runtime_capability(&self.transcriber.faster_whisper_binary, backend).await
            }
            TranscriptionBackend::CpuOnly => {
                self.runtime_capability(&self.transcriber.faster_whisper_binary, backend).await
            }
        }
    }

    async fn runtime_capability(&self, binary: &str, backend: TranscriptionBackend) -> Capability {
        let cmd = ToolCommand::new(binary, format!("{} runtime check", binary))
            .arg("--help")
            .timeout(self.probe_timeout());

        match self.runner.run(&cmd).await {
            Ok(output) if output.success => Capability::Present(backend),
            Ok(output) => Capability::Absent(format!("{} exited with {:?}", binary, output.code)),
            Err(e) => Capability::Absent(format!("{} not runnable: {}", binary, e)),
        }
    }

    async fn cuda_device_present(&self) -> bool {
        let cmd = ToolCommand::new(&self.transcriber.gpu_probe_binary, "CUDA device query")
            .arg("-L")
            .timeout(self.probe_timeout());

        match self.runner.run(&cmd).await {
            Ok(output) if output.success => {
                let device = output.stdout.lines().find(|l| l.trim_start().starts_with("GPU "));
                if let Some(device) = device {
                    info!("CUDA device: {}", device.trim());
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Known H.264/H.265 encoders offered by the installed ffmpeg
    pub async fn list_video_encoders(&self) -> Probed<BTreeSet<String>> {
        let cmd = ToolCommand::new(&self.media.ffmpeg_binary, "Encoder listing")
            .args(["-hide_banner", "-encoders"])
            .timeout(self.probe_timeout());

        match self.runner.run(&cmd).await {
            Ok(output) if output.success => Probed::Found(parse_encoder_listing(&output.stdout)),
            Ok(output) => {
                let reason = format!("encoder listing exited with {:?}", output.code);
                warn!("{}", reason);
                Probed::Defaulted { value: BTreeSet::new(), reason }
            }
            Err(e) => {
                warn!("Encoder listing failed: {}", e);
                Probed::Defaulted { value: BTreeSet::new(), reason: e.to_string() }
            }
        }
    }

    /// Size, duration, geometry, codec, bitrate and bit depth of a media file.
    ///
    /// Fields the probe cannot read stay at their zero defaults.
    pub async fn media_info(&self, path: &Path) -> Probed<MediaInfo> {
        let size_bytes = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);

        let cmd = ToolCommand::new(&self.media.ffprobe_binary, "Media info query")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .path_arg(path)
            .timeout(self.probe_timeout());

        let fallback = MediaInfo { size_bytes, bit_depth: 8, ..MediaInfo::default() };

        let output = match self.runner.run(&cmd).await {
            Ok(output) if output.success => output,
            Ok(output) => {
                let reason = format!("ffprobe exited with {:?}", output.code);
                warn!("{} for {}", reason, path.display());
                return Probed::Defaulted { value: fallback, reason };
            }
            Err(e) => {
                warn!("Media info query failed for {}: {}", path.display(), e);
                return Probed::Defaulted { value: fallback, reason: e.to_string() };
            }
        };

        match parse_ffprobe_output(&output.stdout, size_bytes) {
            Ok(info) => Probed::Found(info),
            Err(e) => {
                warn!("Unreadable ffprobe output for {}: {}", path.display(), e);
                Probed::Defaulted { value: fallback, reason: e.to_string() }
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
    pix_fmt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Build a [`MediaInfo`] from `ffprobe -print_format json -show_format -show_streams`
pub fn parse_ffprobe_output(json: &str, size_bytes: u64) -> Result<MediaInfo> {
    let data: FfprobeOutput = serde_json::from_str(json)?;
    let mut info = MediaInfo { size_bytes, bit_depth: 8, ..MediaInfo::default() };

    let format = data.format.unwrap_or_default();
    info.duration_seconds = format.duration.as_deref().and_then(|d| d.parse().ok()).unwrap_or(0.0);

    if let Some(video) = data.streams.iter().find(|s| s.codec_type.as_deref() == Some("video")) {
        info.width = video.width.unwrap_or(0);
        info.height = video.height.unwrap_or(0);
        info.codec_name = video.codec_name.clone().unwrap_or_default();
        info.bitrate_bps = video.bit_rate.as_deref().and_then(|b| b.parse().ok()).unwrap_or(0);
        info.bit_depth = video.pix_fmt.as_deref().map(bit_depth_of).unwrap_or(8);
    }

    if info.bitrate_bps == 0 {
        info.bitrate_bps = format.bit_rate.as_deref().and_then(|b| b.parse().ok()).unwrap_or(0);
    }

    debug!("Media info: {:?}", info);
    Ok(info)
}

/// 10 for pixel formats with a 10-bit layout (`yuv420p10le`, `p010le`), else 8
pub fn bit_depth_of(pix_fmt: &str) -> u8 {
    let pix_fmt = pix_fmt.to_lowercase();
    // p10 covers yuv420p10le and friends; bare "10" would also match yuv410p
    if pix_fmt.contains("p10") || pix_fmt.contains("p010") { 10 } else { 8 }
}

/// Extract known encoder names from `ffmpeg -encoders` output
pub fn parse_encoder_listing(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|name| KNOWN_ENCODERS.contains(name))
        .map(str::to_string)
        .collect()
}
