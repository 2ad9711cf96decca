// Subtitle assembly
//
// Plain modes produce numbered SRT records; karaoke renders an ASS track
// straight from the segments so word timing survives.

pub mod ass;
pub mod srt;

use std::fmt;

use crate::error::{BisubError, Result};
use crate::segment::Segment;

/// One numbered block of a plain subtitle track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleRecord {
    /// 1-based, dense, in emission order
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleMode {
    Bilingual,
    SourceOnly,
    TargetOnly,
    Karaoke,
}

impl SubtitleMode {
    /// Reduce the output-mode flags to a single mode.
    ///
    /// Karaoke wins over the other two; target-only together with
    /// source-only is rejected.
    pub fn from_flags(target_only: bool, source_only: bool, karaoke: bool) -> Result<Self> {
        if karaoke {
            return Ok(SubtitleMode::Karaoke);
        }
        match (target_only, source_only) {
            (true, true) => Err(BisubError::ConflictingFlags(
                "--chinese-only and --source-only cannot be used together".to_string(),
            )),
            (true, false) => Ok(SubtitleMode::TargetOnly),
            (false, true) => Ok(SubtitleMode::SourceOnly),
            (false, false) => Ok(SubtitleMode::Bilingual),
        }
    }

    /// File stem suffix for outputs of this mode
    pub fn suffix(&self) -> &'static str {
        match self {
            SubtitleMode::Bilingual => "_bilingual",
            SubtitleMode::SourceOnly => "_source",
            SubtitleMode::TargetOnly => "_zh",
            SubtitleMode::Karaoke => "_karaoke",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleMode::Karaoke => "ass",
            _ => "srt",
        }
    }

    pub fn needs_translation(&self) -> bool {
        matches!(self, SubtitleMode::Bilingual | SubtitleMode::TargetOnly)
    }

    pub fn word_timestamps(&self) -> bool {
        matches!(self, SubtitleMode::Karaoke)
    }
}

impl fmt::Display for SubtitleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubtitleMode::Bilingual => "bilingual",
            SubtitleMode::SourceOnly => "source only",
            SubtitleMode::TargetOnly => "target only",
            SubtitleMode::Karaoke => "karaoke",
        };
        f.write_str(label)
    }
}

/// Build plain records from segments and their translations.
///
/// `translations` must be empty for modes that skip translation and
/// aligned 1:1 with `segments` otherwise.
pub fn assemble(mode: SubtitleMode, segments: &[Segment], translations: &[String]) -> Result<Vec<SubtitleRecord>> {
    if mode == SubtitleMode::Karaoke {
        return Err(BisubError::Config("Karaoke output is rendered as a styled track, not records".to_string()));
    }
    if mode.needs_translation() && translations.len() != segments.len() {
        return Err(BisubError::Translation(format!(
            "Got {} translations for {} segments",
            translations.len(),
            segments.len()
        )));
    }

    let records = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let source = segment.display_text();
            let text = match mode {
                SubtitleMode::Bilingual => format!("{}\n{}", source, translations[i].trim()),
                SubtitleMode::TargetOnly => translations[i].trim().to_string(),
                _ => source.to_string(),
            };
            SubtitleRecord {
                index: i + 1,
                start_ms: srt::seconds_to_ms(segment.start),
                end_ms: srt::seconds_to_ms(segment.end),
                text,
            }
        })
        .collect();

    Ok(records)
}
