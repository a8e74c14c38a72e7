//! Chunked document summarization.
//!
//! Long documents are sliced into fixed-size chunks on char boundaries, the
//! chunks are summarized by a small pool of cooperative workers, and a final
//! merge pass condenses the partials into a short bullet list. Every backend
//! call is deadline-bounded; a failed chunk yields an empty partial rather
//! than failing the document.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::capability::{CapabilityHost, Summarizer, SummarizerOptions};
use crate::config::PipelineConfig;
use crate::deadline::with_deadline;

/// Returned instead of an empty string when nothing could be summarized.
pub const NO_SUMMARY: &str = "Summary unavailable.";

/// Emitted as each chunk is picked up. `index` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub index: usize,
    pub total: usize,
}

pub struct ChunkedSummarizer {
    host: Arc<dyn CapabilityHost>,
    config: PipelineConfig,
}

impl ChunkedSummarizer {
    pub fn new(host: Arc<dyn CapabilityHost>, config: PipelineConfig) -> Self {
        Self { host, config }
    }

    /// Summarize a document into the target language.
    ///
    /// Never returns an empty string: if the capability is absent or every
    /// chunk fails, the result is the `NO_SUMMARY` sentinel. A failed merge
    /// degrades to the joined partials, which is the best value available.
    pub async fn summarize(
        &self,
        document: &str,
        target_lang: &str,
        progress: Option<mpsc::UnboundedSender<ChunkProgress>>,
    ) -> String {
        let chunks = split_chunks(document, self.config.chunk_size, self.config.max_chunks);
        if chunks.is_empty() {
            return NO_SUMMARY.to_string();
        }

        let created = with_deadline(
            self.host
                .create_summarizer(&SummarizerOptions::key_points(target_lang)),
            self.config.prompt_deadline,
            "summarizer creation",
        )
        .await;
        let summarizer = match created {
            Ok(summarizer) => summarizer,
            Err(err) => {
                tracing::debug!(error = %err, "summarizer unavailable");
                return NO_SUMMARY.to_string();
            }
        };

        if chunks.len() == 1 {
            if let Some(tx) = &progress {
                let _ = tx.send(ChunkProgress { index: 1, total: 1 });
            }
            let result = with_deadline(
                summarizer.summarize(&chunks[0], "full document", target_lang),
                self.config.prompt_deadline,
                "summarization",
            )
            .await;
            return match result {
                Ok(summary) if !summary.trim().is_empty() => summary,
                _ => NO_SUMMARY.to_string(),
            };
        }

        let partials = self
            .summarize_chunks(&chunks, Arc::clone(&summarizer), target_lang, progress)
            .await;
        let non_empty: Vec<&str> = partials
            .iter()
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
            .collect();
        if non_empty.is_empty() {
            tracing::debug!(chunks = chunks.len(), "every chunk summary failed");
            return NO_SUMMARY.to_string();
        }

        let combined = non_empty.join("\n\n");
        let merge_context = format!(
            "Condense these partial summaries into at most {} bullet points, \
             removing duplicates.",
            self.config.merge_bullets
        );
        let merged = with_deadline(
            summarizer.summarize(&combined, &merge_context, target_lang),
            self.config.prompt_deadline,
            "summary merge",
        )
        .await;
        match merged {
            Ok(summary) if !summary.trim().is_empty() => summary,
            _ => {
                tracing::debug!("merge pass failed; returning joined partials");
                combined
            }
        }
    }

    /// Summarize all chunks with a fixed-size worker pool.
    ///
    /// Workers race for the next unprocessed index over a shared cursor, so
    /// at most `chunk_concurrency` backend calls are in flight. Returns one
    /// partial per chunk in chunk order; failures are empty strings.
    async fn summarize_chunks(
        &self,
        chunks: &[String],
        summarizer: Arc<dyn Summarizer>,
        target_lang: &str,
        progress: Option<mpsc::UnboundedSender<ChunkProgress>>,
    ) -> Vec<String> {
        let total = chunks.len();
        let cursor = AtomicUsize::new(0);
        let cursor = &cursor;

        let workers = (0..self.config.chunk_concurrency.max(1)).map(|worker| {
            let summarizer = Arc::clone(&summarizer);
            let progress = progress.clone();
            async move {
                let mut done: Vec<(usize, String)> = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= total {
                        break;
                    }
                    if let Some(tx) = &progress {
                        let _ = tx.send(ChunkProgress {
                            index: index + 1,
                            total,
                        });
                    }
                    let context = format!("segment {} of {}", index + 1, total);
                    let partial = with_deadline(
                        summarizer.summarize(&chunks[index], &context, target_lang),
                        self.config.prompt_deadline,
                        "chunk summarization",
                    )
                    .await
                    .unwrap_or_else(|err| {
                        tracing::debug!(worker, chunk = index + 1, error = %err, "chunk summary failed");
                        String::new()
                    });
                    done.push((index, partial));
                }
                done
            }
        });

        let mut partials = vec![String::new(); total];
        for batch in futures_util::future::join_all(workers).await {
            for (index, partial) in batch {
                partials[index] = partial;
            }
        }
        partials
    }
}

/// Slice text into up to `max_chunks` chunks of `chunk_size` chars each.
/// Text beyond the window is dropped.
fn split_chunks(text: &str, chunk_size: usize, max_chunks: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || chunk_size == 0 || max_chunks == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut chunks = Vec::new();
    for slab in chars.chunks(chunk_size) {
        if chunks.len() == max_chunks {
            tracing::debug!(
                dropped_chars = chars.len() - max_chunks * chunk_size,
                "document exceeds summarization window; excess dropped"
            );
            break;
        }
        chunks.push(slab.iter().collect::<String>());
    }
    chunks
}
