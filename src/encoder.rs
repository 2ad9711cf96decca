//! Video encoder selection.
//!
//! Selection is pure: the same available set, bit depth, bitrate and
//! platform always yield the same plan. Running the plan (and walking its
//! fallbacks) lives in [`crate::media`].

use std::collections::BTreeSet;

/// Every encoder identifier the capability probe recognises
pub const KNOWN_ENCODERS: [&str; 14] = [
    "h264_nvenc",
    "hevc_nvenc",
    "h264_amf",
    "hevc_amf",
    "h264_qsv",
    "hevc_qsv",
    "h264_videotoolbox",
    "hevc_videotoolbox",
    "h264_vaapi",
    "hevc_vaapi",
    "h264_mf",
    "libx265",
    "libx264",
    "libopenh264",
];

const NVENC_PRESET: &str = "p4";

/// Platform class relevant to encoder preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Apple,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderFamily {
    Nvenc,
    OtherHardware,
    Software(Option<&'static str>),
}

fn family(name: &str) -> EncoderFamily {
    match name {
        "h264_nvenc" | "hevc_nvenc" => EncoderFamily::Nvenc,
        "libx265" => EncoderFamily::Software(Some("medium")),
        "libx264" => EncoderFamily::Software(Some("fast")),
        // openh264 has no preset option
        "libopenh264" => EncoderFamily::Software(None),
        _ => EncoderFamily::OtherHardware,
    }
}

/// An encoder and its ffmpeg options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderChoice {
    pub name: String,
    pub options: Vec<(String, String)>,
}

impl EncoderChoice {
    /// Derive the option set for `name` at the given target bitrate
    pub fn for_encoder(name: &str, bitrate_kbps: u32) -> Self {
        let bitrate = format!("{}k", bitrate_kbps);
        let mut options = Vec::new();

        match family(name) {
            EncoderFamily::Nvenc => {
                let maxrate = bitrate_kbps as u64 * 3 / 2;
                let bufsize = bitrate_kbps as u64 * 2;
                options.push(("-preset".to_string(), NVENC_PRESET.to_string()));
                options.push(("-b:v".to_string(), bitrate));
                options.push(("-maxrate".to_string(), format!("{}k", maxrate)));
                options.push(("-bufsize".to_string(), format!("{}k", bufsize)));
            }
            EncoderFamily::OtherHardware => {
                options.push(("-b:v".to_string(), bitrate));
            }
            EncoderFamily::Software(preset) => {
                if let Some(preset) = preset {
                    options.push(("-preset".to_string(), preset.to_string()));
                }
                options.push(("-b:v".to_string(), bitrate));
            }
        }

        Self { name: name.to_string(), options }
    }

    /// Flattened `-c:v <name> <flag> <value>...` argument list
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.name.clone()];
        for (flag, value) in &self.options {
            args.push(flag.clone());
            args.push(value.clone());
        }
        args
    }

    pub fn option(&self, flag: &str) -> Option<&str> {
        self.options.iter().find(|(f, _)| f == flag).map(|(_, v)| v.as_str())
    }
}

/// Chosen encoder plus the ordered alternatives to try if it fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderPlan {
    pub primary: EncoderChoice,
    pub fallbacks: Vec<EncoderChoice>,
}

impl EncoderPlan {
    /// Primary followed by fallbacks, in attempt order
    pub fn candidates(&self) -> impl Iterator<Item = &EncoderChoice> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }
}

/// Encoder preference for a bit depth and platform, strongest first
pub fn preference_order(bit_depth: u8, platform: Platform) -> Vec<&'static str> {
    let mut order = Vec::new();

    if bit_depth >= 10 {
        order.extend(["hevc_nvenc", "hevc_amf", "hevc_qsv", "hevc_videotoolbox", "libx265"]);
        // 8-bit encoders as last resort, output is downsampled
        if platform == Platform::Apple {
            order.push("h264_videotoolbox");
        }
        order.extend(["libx264", "libopenh264"]);
        return order;
    }

    if platform == Platform::Apple {
        order.extend(["h264_videotoolbox", "hevc_videotoolbox"]);
    }
    order.extend([
        "h264_nvenc",
        "hevc_nvenc",
        "h264_amf",
        "hevc_amf",
        "h264_qsv",
        "hevc_qsv",
        "libx265",
        "libx264",
        "libopenh264",
    ]);
    order
}

/// Choose an encoder from `available`, or `None` when nothing usable is installed
pub fn select(
    available: &BTreeSet<String>,
    bit_depth: u8,
    bitrate_kbps: u32,
    platform: Platform,
) -> Option<EncoderPlan> {
    let mut candidates = preference_order(bit_depth, platform)
        .into_iter()
        .filter(|name| available.contains(*name))
        .map(|name| EncoderChoice::for_encoder(name, bitrate_kbps));

    let primary = candidates.next()?;
    Some(EncoderPlan { primary, fallbacks: candidates.collect() })
}
