use serde::{Deserialize, Serialize};

/// Timing of one spoken word inside a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub start: f64,
    pub end: f64,
    pub word: String,
}

impl Word {
    /// Karaoke fill duration in hundredths of a second
    pub fn duration_cs(&self) -> u32 {
        ((self.end - self.start) * 100.0).round().max(0.0) as u32
    }
}

/// A time-bounded unit of transcribed speech.
///
/// Segments leaving the transcription stage satisfy `start < end`, are
/// ordered by `start`, and never exceed the configured no-speech threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
    #[serde(default)]
    pub no_speech_prob: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: None,
            no_speech_prob: 0.0,
        }
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = Some(words);
        self
    }

    pub fn with_no_speech_prob(mut self, prob: f64) -> Self {
        self.no_speech_prob = prob;
        self
    }

    /// Text as it appears on screen
    pub fn display_text(&self) -> &str {
        self.text.trim()
    }

    /// Word timings, if the backend produced any
    pub fn timed_words(&self) -> Option<&[Word]> {
        self.words.as_deref().filter(|w| !w.is_empty())
    }
}

/// Read-only snapshot of a media file, used for encoder decisions and reporting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub size_bytes: u64,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub codec_name: String,
    pub bitrate_bps: u64,
    pub bit_depth: u8,
}

impl MediaInfo {
    /// Target bitrate in kbps, `default_kbps` when the bitrate is unknown
    pub fn bitrate_kbps_or(&self, default_kbps: u32) -> u32 {
        if self.bitrate_bps == 0 {
            default_kbps
        } else {
            (self.bitrate_bps / 1000) as u32
        }
    }
}
