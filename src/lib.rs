//! bisub - bilingual subtitle pipeline
//!
//! Hardware-aware transcription, batched machine translation, SRT/ASS
//! subtitle assembly and hardware-aware re-encoding with encoder fallback.

pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod media;
pub mod probe;
pub mod report;
pub mod runner;
pub mod segment;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
pub mod workflow;
