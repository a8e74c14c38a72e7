//! Host capability self-test.
//!
//! Four probes run in sequence: reference data, the scoring worker, the
//! generative capability, and the translator. Each is bounded by its own
//! deadline and reduced to a status plus a short message; backend errors
//! never propagate out of a probe.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::capability::{CapabilityHost, GenerativeOptions};
use crate::config::PipelineConfig;
use crate::dataset::{CandidateRecord, ReferenceDataSource};
use crate::deadline::with_deadline;
use crate::error::AiError;
use crate::score::{score_corpus, OffloadScorer, ScoreRequest, Scorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeStatus {
    Ok,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub name: &'static str,
    pub status: ProbeStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub probes: Vec<ProbeResult>,
    pub elapsed: Duration,
}

impl DiagnosticsReport {
    pub fn all_ok(&self) -> bool {
        self.probes.iter().all(|p| p.status == ProbeStatus::Ok)
    }
}

/// Probe every collaborator the pipeline depends on.
pub async fn run_diagnostics(
    source: &dyn ReferenceDataSource,
    host: Arc<dyn CapabilityHost>,
    config: &PipelineConfig,
) -> DiagnosticsReport {
    let started = Instant::now();
    let budget = config.diag_deadline / 4;

    let probes = vec![
        probe_reference_data(source),
        probe_score_worker(config, budget).await,
        probe_generative(Arc::clone(&host), budget).await,
        probe_translator(host, budget).await,
    ];

    let report = DiagnosticsReport {
        probes,
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        ok = report.all_ok(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "diagnostics finished"
    );
    report
}

fn probe_reference_data(source: &dyn ReferenceDataSource) -> ProbeResult {
    match source.load() {
        Ok(data) => ProbeResult {
            name: "reference data",
            status: ProbeStatus::Ok,
            message: format!(
                "{} candidates, {} rule codes",
                data.candidates.len(),
                data.rules.len()
            ),
        },
        Err(err) => ProbeResult {
            name: "reference data",
            status: ProbeStatus::Failed,
            message: err.to_string(),
        },
    }
}

/// Round-trip a tiny corpus through the background scorer and check the
/// reply against the inline rule.
async fn probe_score_worker(config: &PipelineConfig, budget: Duration) -> ProbeResult {
    let corpus = Arc::new(vec![CandidateRecord {
        code: "00000".to_string(),
        description: "probe record".to_string(),
        category: "Probe".to_string(),
    }]);
    let request = ScoreRequest {
        tokens: vec!["probe".to_string()],
        query: "probe".to_string(),
    };
    let expected = score_corpus(&corpus, &request);

    let scorer = OffloadScorer::spawn(config);
    let outcome = with_deadline(
        async {
            Ok::<_, AiError>(scorer.score(Arc::clone(&corpus), request.clone()).await)
        },
        budget,
        "score worker probe",
    )
    .await;

    match outcome {
        Ok(results) if results == expected => ProbeResult {
            name: "score worker",
            status: ProbeStatus::Ok,
            message: "worker round-trip matched inline scoring".to_string(),
        },
        Ok(_) => ProbeResult {
            name: "score worker",
            status: ProbeStatus::Failed,
            message: "worker results diverged from inline scoring".to_string(),
        },
        Err(err) => ProbeResult {
            name: "score worker",
            status: ProbeStatus::Degraded,
            message: err.to_string(),
        },
    }
}

async fn probe_generative(host: Arc<dyn CapabilityHost>, budget: Duration) -> ProbeResult {
    let outcome = with_deadline(
        async {
            let session = host
                .create_generative(&GenerativeOptions::monolingual("en"))
                .await?;
            session.prompt("Reply with OK.", None).await
        },
        budget,
        "generative probe",
    )
    .await;

    match outcome {
        Ok(output) => {
            if output.into_text().trim().is_empty() {
                ProbeResult {
                    name: "generative",
                    status: ProbeStatus::Degraded,
                    message: "prompt returned empty output".to_string(),
                }
            } else {
                ProbeResult {
                    name: "generative",
                    status: ProbeStatus::Ok,
                    message: "prompt round-trip succeeded".to_string(),
                }
            }
        }
        Err(err @ AiError::CapabilityUnavailable(_)) => ProbeResult {
            name: "generative",
            status: ProbeStatus::Failed,
            message: err.to_string(),
        },
        Err(err) => ProbeResult {
            name: "generative",
            status: ProbeStatus::Degraded,
            message: err.to_string(),
        },
    }
}

/// Translation is an enhancement, so even an absent translator is only a
/// degradation.
async fn probe_translator(host: Arc<dyn CapabilityHost>, budget: Duration) -> ProbeResult {
    let outcome = with_deadline(
        async {
            let translator = host.create_translator("en", "es").await?;
            translator.translate("hello").await
        },
        budget,
        "translator probe",
    )
    .await;

    match outcome {
        Ok(translated) if !translated.trim().is_empty() => ProbeResult {
            name: "translator",
            status: ProbeStatus::Ok,
            message: "translation round-trip succeeded".to_string(),
        },
        Ok(_) => ProbeResult {
            name: "translator",
            status: ProbeStatus::Degraded,
            message: "translation returned empty output".to_string(),
        },
        Err(err) => ProbeResult {
            name: "translator",
            status: ProbeStatus::Degraded,
            message: err.to_string(),
        },
    }
}
