//! Candidate suggestion scoring.
//!
//! One scoring rule, two conforming executors: `InlineScorer` computes
//! in-process, `OffloadScorer` ships the job to a dedicated background task
//! and waits under a short deadline, falling back inline on timeout or
//! worker absence. Both variants must produce identical ordered results for
//! identical inputs; `score_corpus` is the single shared implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::config::PipelineConfig;
use crate::dataset::CandidateRecord;
use crate::deadline::with_deadline;
use crate::tokens::expand_tokens;

/// How many suggestions a query yields at most.
const MAX_SUGGESTIONS: usize = 5;

/// A candidate ranked against a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate {
    pub code: String,
    pub description: String,
    pub category: String,
    pub score: u32,
}

/// One scoring job: expanded tokens plus the raw (lowercased) query text.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub tokens: Vec<String>,
    pub query: String,
}

impl ScoreRequest {
    /// Build a request from raw query text (token expansion included).
    pub fn from_query(query: &str) -> Self {
        Self {
            tokens: expand_tokens(query),
            query: query.to_lowercase(),
        }
    }
}

/// The shared scoring rule.
///
/// Per candidate: +2 for each token contained in the description, +1 for
/// each token contained in the category (both case-insensitive substring
/// matches), and +3 once if the raw query contains the candidate's own code
/// literally. Only scores > 0 survive; ties keep corpus order (stable sort);
/// at most five results.
pub fn score_corpus(corpus: &[CandidateRecord], request: &ScoreRequest) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = corpus
        .iter()
        .filter_map(|record| {
            let description = record.description.to_lowercase();
            let category = record.category.to_lowercase();
            let mut score = 0u32;
            for token in &request.tokens {
                if description.contains(token.as_str()) {
                    score += 2;
                }
                if category.contains(token.as_str()) {
                    score += 1;
                }
            }
            if request.query.contains(&record.code) {
                score += 3;
            }
            (score > 0).then(|| ScoredCandidate {
                code: record.code.clone(),
                description: record.description.clone(),
                category: record.category.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score)); // stable: ties keep corpus order
    scored.truncate(MAX_SUGGESTIONS);
    scored
}

/// A scoring executor. Every variant must match `score_corpus` exactly.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(
        &self,
        corpus: Arc<Vec<CandidateRecord>>,
        request: ScoreRequest,
    ) -> Vec<ScoredCandidate>;
}

/// Synchronous in-process scoring.
pub struct InlineScorer;

#[async_trait]
impl Scorer for InlineScorer {
    async fn score(
        &self,
        corpus: Arc<Vec<CandidateRecord>>,
        request: ScoreRequest,
    ) -> Vec<ScoredCandidate> {
        score_corpus(&corpus, &request)
    }
}

struct ScoreJob {
    corpus: Arc<Vec<CandidateRecord>>,
    request: ScoreRequest,
    reply: oneshot::Sender<Vec<ScoredCandidate>>,
}

/// Scoring offloaded to a dedicated background task.
///
/// Jobs go over an mpsc channel; each reply comes back on its own oneshot,
/// which is dropped on both success and timeout — a late worker reply finds
/// a closed channel instead of a stale listener. Timeout or a dead worker
/// degrades transparently to inline scoring.
pub struct OffloadScorer {
    tx: mpsc::Sender<ScoreJob>,
    deadline: std::time::Duration,
}

impl OffloadScorer {
    /// Spawn the worker task and return the handle.
    pub fn spawn(config: &PipelineConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<ScoreJob>(8);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let results = score_corpus(&job.corpus, &job.request);
                // Receiver may have timed out and gone away; nothing to do.
                let _ = job.reply.send(results);
            }
            tracing::debug!("score worker channel closed; task exiting");
        });
        Self {
            tx,
            deadline: config.scorer_deadline,
        }
    }
}

#[async_trait]
impl Scorer for OffloadScorer {
    async fn score(
        &self,
        corpus: Arc<Vec<CandidateRecord>>,
        request: ScoreRequest,
    ) -> Vec<ScoredCandidate> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = ScoreJob {
            corpus: Arc::clone(&corpus),
            request: request.clone(),
            reply: reply_tx,
        };

        if self.tx.send(job).await.is_err() {
            tracing::debug!("score worker gone; scoring inline");
            return score_corpus(&corpus, &request);
        }

        let waited = with_deadline(
            async {
                reply_rx.await.map_err(|_| {
                    crate::error::AiError::CapabilityFailure("score worker dropped reply".into())
                })
            },
            self.deadline,
            "suggestion scoring",
        )
        .await;

        match waited {
            Ok(results) => results,
            Err(err) => {
                tracing::debug!(error = %err, "offloaded scoring degraded to inline");
                score_corpus(&corpus, &request)
            }
        }
    }
}

/// Imaging-query backstop: when a query that looks like imaging yields fewer
/// than three suggestions, pad with imaging candidates at score 1, deduped,
/// up to the result cap.
pub fn pad_imaging_suggestions(
    suggestions: &mut Vec<ScoredCandidate>,
    corpus: &[CandidateRecord],
    query: &str,
) {
    use std::sync::LazyLock;
    static IMAGING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"(?i)\b(ct|mri|x[- ]?ray|ultrasound|sonogram|fluoro|nuclear|pet)\b")
            .expect("valid regex")
    });

    if suggestions.len() >= 3 || !IMAGING_RE.is_match(query) {
        return;
    }

    let seen: Vec<String> = suggestions.iter().map(|s| s.code.clone()).collect();
    let room = MAX_SUGGESTIONS - suggestions.len();
    let extras = corpus
        .iter()
        .filter(|r| {
            r.category.to_lowercase().contains("imaging") || IMAGING_RE.is_match(&r.description)
        })
        .filter(|r| !seen.contains(&r.code))
        .take(room)
        .map(|r| ScoredCandidate {
            code: r.code.clone(),
            description: r.description.clone(),
            category: r.category.clone(),
            score: 1,
        });
    suggestions.extend(extras);
}

/// Full suggestion flow: expand the query, score it with the given executor,
/// then apply the imaging backstop.
pub async fn suggest(
    scorer: &dyn Scorer,
    corpus: Arc<Vec<CandidateRecord>>,
    query: &str,
) -> Vec<ScoredCandidate> {
    let request = ScoreRequest::from_query(query);
    let mut suggestions = scorer.score(Arc::clone(&corpus), request).await;
    pad_imaging_suggestions(&mut suggestions, &corpus, query);
    suggestions
}
