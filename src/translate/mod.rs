// Batched translation with per-item fallback
//
// Lines are joined into batches with a reserved separator and sent as one
// request. A failed or misaligned batch is retranslated line by line, and a
// line that still fails keeps its source text, so the output is always
// aligned 1:1 with the input.

pub mod google;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TranslateConfig;
use crate::error::Result;

pub use google::GoogleTranslateEndpoint;

/// Separator joining the lines of one batch request
pub const BATCH_SEPARATOR: &str = "\n###\n";
const SPLIT_TOKEN: &str = "###";

/// A translation service taking one text per request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationEndpoint: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str, timeout: Duration) -> Result<String>;
}

/// How much of a run had to be degraded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationStats {
    pub batches: usize,
    /// Batches that fell back to per-line requests
    pub degraded_batches: usize,
    /// Lines left in the source language
    pub untranslated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub texts: Vec<String>,
    pub stats: TranslationStats,
}

pub struct TranslationBatcher {
    endpoint: Arc<dyn TranslationEndpoint>,
    config: TranslateConfig,
}

impl TranslationBatcher {
    pub fn new(endpoint: Arc<dyn TranslationEndpoint>, config: TranslateConfig) -> Self {
        Self { endpoint, config }
    }

    /// Translate `texts` in order; the result always has the same length
    pub async fn translate(&self, texts: &[String], source: &str, target: &str) -> Translated {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = texts.len().div_ceil(batch_size);
        let mut translated = Vec::with_capacity(texts.len());
        let mut stats = TranslationStats::default();

        info!("Translating {} lines {} -> {} in {} batches", texts.len(), source, target, total_batches);

        for (index, chunk) in texts.chunks(batch_size).enumerate() {
            stats.batches += 1;

            if let Some(lines) = self.translate_batch(chunk, source, target).await {
                info!("Batch {}/{} done", index + 1, total_batches);
                translated.extend(lines);
                continue;
            }

            warn!("Batch {}/{} failed, translating line by line", index + 1, total_batches);
            stats.degraded_batches += 1;

            for (i, text) in chunk.iter().enumerate() {
                if i > 0 {
                    self.pause(self.config.item_delay_ms).await;
                }
                match self.translate_single(text, source, target).await {
                    Some(line) => translated.push(line),
                    None => {
                        stats.untranslated += 1;
                        translated.push(text.clone());
                    }
                }
            }

            if index + 1 < total_batches {
                self.pause(self.config.batch_delay_ms).await;
            }
        }

        Translated { texts: translated, stats }
    }

    /// One joined request; `None` when it fails or does not split back cleanly
    async fn translate_batch(&self, chunk: &[String], source: &str, target: &str) -> Option<Vec<String>> {
        let joined = chunk.join(BATCH_SEPARATOR);
        let timeout = Duration::from_secs(self.config.batch_timeout_secs);

        match self.endpoint.translate(&joined, source, target, timeout).await {
            Ok(response) => {
                let lines: Vec<String> = response.split(SPLIT_TOKEN).map(|l| l.trim().to_string()).collect();
                if lines.len() == chunk.len() {
                    Some(lines)
                } else {
                    debug!("Batch split into {} lines, expected {}", lines.len(), chunk.len());
                    None
                }
            }
            Err(e) => {
                debug!("Batch request failed: {}", e);
                None
            }
        }
    }

    /// `None` when the line could not be translated
    async fn translate_single(&self, text: &str, source: &str, target: &str) -> Option<String> {
        if text.trim().is_empty() {
            return Some(text.to_string());
        }

        let timeout = Duration::from_secs(self.config.item_timeout_secs);
        match self.endpoint.translate(text, source, target, timeout).await {
            Ok(line) => Some(line.trim().to_string()),
            Err(e) => {
                warn!("Keeping source text for {:?}: {}", text, e);
                None
            }
        }
    }

    async fn pause(&self, millis: u64) {
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BisubError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(batch_size: usize) -> TranslateConfig {
        TranslateConfig {
            batch_size,
            batch_delay_ms: 0,
            item_delay_ms: 0,
            ..TranslateConfig::default()
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn fake_translate(text: &str) -> String {
        text.split(SPLIT_TOKEN)
            .map(|line| format!("t({})", line.trim()))
            .collect::<Vec<_>>()
            .join(BATCH_SEPARATOR)
    }

    #[tokio::test]
    async fn test_batch_success_keeps_order() {
        let mut endpoint = MockTranslationEndpoint::new();
        endpoint
            .expect_translate()
            .withf(|text, source, target, _| text == "a\n###\nb\n###\nc" && source == "en" && target == "zh-CN")
            .times(1)
            .returning(|text, _, _, _| Ok(fake_translate(text)));

        let batcher = TranslationBatcher::new(Arc::new(endpoint), config(10));
        let result = batcher.translate(&texts(&["a", "b", "c"]), "en", "zh-CN").await;

        assert_eq!(result.texts, vec!["t(a)", "t(b)", "t(c)"]);
        assert_eq!(result.stats.degraded_batches, 0);
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_per_item_and_keeps_source() {
        let mut endpoint = MockTranslationEndpoint::new();
        endpoint
            .expect_translate()
            .withf(|text, _, _, _| text.contains(SPLIT_TOKEN))
            .times(1)
            .returning(|_, _, _, _| Err(BisubError::Translation("HTTP 429".to_string())));
        endpoint
            .expect_translate()
            .withf(|text, _, _, _| text == "b")
            .times(1)
            .returning(|_, _, _, _| Err(BisubError::Translation("timeout".to_string())));
        endpoint
            .expect_translate()
            .withf(|text, _, _, timeout| (text == "a" || text == "c") && *timeout == Duration::from_secs(10))
            .times(2)
            .returning(|text, _, _, _| Ok(format!("t({})", text)));

        let batcher = TranslationBatcher::new(Arc::new(endpoint), config(10));
        let result = batcher.translate(&texts(&["a", "b", "c"]), "en", "zh-CN").await;

        assert_eq!(result.texts, vec!["t(a)", "b", "t(c)"]);
        assert_eq!(result.stats.degraded_batches, 1);
        assert_eq!(result.stats.untranslated, 1);
    }

    #[tokio::test]
    async fn test_misaligned_batch_falls_back() {
        let mut endpoint = MockTranslationEndpoint::new();
        endpoint
            .expect_translate()
            .withf(|text, _, _, _| text.contains(SPLIT_TOKEN))
            .times(1)
            .returning(|_, _, _, _| Ok("merged ### into two".to_string()));
        endpoint
            .expect_translate()
            .withf(|text, _, _, _| !text.contains(SPLIT_TOKEN))
            .times(3)
            .returning(|text, _, _, _| Ok(format!("t({})", text)));

        let batcher = TranslationBatcher::new(Arc::new(endpoint), config(10));
        let result = batcher.translate(&texts(&["x", "y", "z"]), "en", "ja").await;
        assert_eq!(result.texts, vec!["t(x)", "t(y)", "t(z)"]);
    }

    #[tokio::test]
    async fn test_blank_line_is_not_sent_individually() {
        let mut endpoint = MockTranslationEndpoint::new();
        endpoint
            .expect_translate()
            .withf(|text, _, _, _| text.contains(SPLIT_TOKEN))
            .returning(|_, _, _, _| Err(BisubError::Translation("down".to_string())));
        endpoint
            .expect_translate()
            .withf(|text, _, _, _| text == "hi")
            .times(1)
            .returning(|_, _, _, _| Ok("やあ".to_string()));

        let batcher = TranslationBatcher::new(Arc::new(endpoint), config(10));
        let result = batcher.translate(&texts(&["hi", "  "]), "en", "ja").await;
        assert_eq!(result.texts, vec!["やあ", "  "]);
        assert_eq!(result.stats.untranslated, 0);
    }

    #[tokio::test]
    async fn test_empty_input_sends_nothing() {
        let endpoint = MockTranslationEndpoint::new();
        let batcher = TranslationBatcher::new(Arc::new(endpoint), config(10));
        let result = batcher.translate(&[], "en", "zh-CN").await;
        assert!(result.texts.is_empty());
        assert_eq!(result.stats.batches, 0);
    }

    /// Fails requests according to a fixed pattern of request numbers
    struct PatternEndpoint {
        calls: AtomicUsize,
        fail_every: usize,
        misalign_every: usize,
    }

    #[async_trait]
    impl TranslationEndpoint for PatternEndpoint {
        async fn translate(&self, text: &str, _: &str, _: &str, _: Duration) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call % self.fail_every == 0 {
                return Err(BisubError::Translation(format!("request {} failed", call)));
            }
            if text.contains(SPLIT_TOKEN) && call % self.misalign_every == 0 {
                return Ok("only one line".to_string());
            }
            Ok(fake_translate(text))
        }
    }

    #[tokio::test]
    async fn test_output_always_aligned_with_input() {
        let input: Vec<String> = (0..37).map(|i| format!("line {}", i)).collect();

        for batch_size in [1, 3, 10] {
            for fail_every in [2, 3, 5, 1000] {
                for misalign_every in [2, 7, 1000] {
                    let endpoint = PatternEndpoint { calls: AtomicUsize::new(0), fail_every, misalign_every };
                    let batcher = TranslationBatcher::new(Arc::new(endpoint), config(batch_size));
                    let result = batcher.translate(&input, "en", "zh-CN").await;

                    assert_eq!(result.texts.len(), input.len());
                    for (source, line) in input.iter().zip(&result.texts) {
                        assert!(line == source || *line == format!("t({})", source));
                    }
                }
            }
        }
    }

    /// Fails exactly the batch requests listed in `failing`
    struct FailingBatches {
        failing: Vec<String>,
    }

    #[async_trait]
    impl TranslationEndpoint for FailingBatches {
        async fn translate(&self, text: &str, _: &str, _: &str, _: Duration) -> Result<String> {
            if self.failing.iter().any(|batch| batch == text) {
                return Err(BisubError::Translation("HTTP 429".to_string()));
            }
            Ok(fake_translate(text))
        }
    }

    async fn timed_run(failing: &[&str]) -> (Duration, TranslationStats) {
        let config = TranslateConfig {
            batch_size: 3,
            batch_delay_ms: 1000,
            item_delay_ms: 100,
            ..TranslateConfig::default()
        };
        let endpoint = FailingBatches { failing: texts(failing) };
        let batcher = TranslationBatcher::new(Arc::new(endpoint), config);

        let started = tokio::time::Instant::now();
        let result = batcher.translate(&texts(&["a", "b", "c", "d", "e", "f"]), "en", "zh-CN").await;
        assert_eq!(result.texts, vec!["t(a)", "t(b)", "t(c)", "t(d)", "t(e)", "t(f)"]);
        (started.elapsed(), result.stats)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_only_follow_degraded_work() {
        // Healthy batches go back to back
        let (elapsed, stats) = timed_run(&[]).await;
        assert_eq!(elapsed, Duration::ZERO);
        assert_eq!(stats.degraded_batches, 0);

        // Degraded first batch: two item gaps, then the batch delay before batch two
        let (elapsed, stats) = timed_run(&["a\n###\nb\n###\nc"]).await;
        assert_eq!(elapsed, Duration::from_millis(2 * 100 + 1000));
        assert_eq!(stats.degraded_batches, 1);

        // Degraded last batch: item gaps only, nothing follows it
        let (elapsed, stats) = timed_run(&["d\n###\ne\n###\nf"]).await;
        assert_eq!(elapsed, Duration::from_millis(2 * 100));
        assert_eq!(stats.degraded_batches, 1);
    }
}
