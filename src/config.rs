//! Pipeline tuning knobs.
//!
//! Defaults mirror values tuned against a local Ollama backend's latency
//! profile. Nothing in the pipeline depends on the exact numbers, so every
//! knob is overridable per instance.

use std::time::Duration;

/// Configuration shared by the orchestration stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hard budget for a single generative call (session creation and each
    /// prompt get this budget independently).
    pub prompt_deadline: Duration,
    /// Total budget for the diagnostics pass, split across its probes.
    pub diag_deadline: Duration,
    /// Maximum characters per summarization chunk.
    pub chunk_size: usize,
    /// Upper bound on chunks per document; text past
    /// `chunk_size * max_chunks` is dropped.
    pub max_chunks: usize,
    /// Chunk summarization calls in flight at once.
    pub chunk_concurrency: usize,
    /// Bullet budget for the summarization merge pass.
    pub merge_bullets: usize,
    /// How long to wait for the offloaded scorer before computing inline.
    pub scorer_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt_deadline: Duration::from_secs(25),
            diag_deadline: Duration::from_secs(30),
            chunk_size: 6500,
            max_chunks: 4,
            chunk_concurrency: 2,
            merge_bullets: 8,
            scorer_deadline: Duration::from_millis(800),
        }
    }
}
