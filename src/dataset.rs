//! Reference corpus: candidate codes and the payer rule book.
//!
//! Owned by the data-loading collaborator, read-only to everything else.
//! Records load once and never mutate; the scoring engine and the validator
//! borrow them for the process lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The 5-digit code shape all candidate codes must match.
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}$").expect("valid regex"));

/// Whether a string has the 5-digit candidate-code shape.
pub fn is_candidate_code(s: &str) -> bool {
    CODE_RE.is_match(s)
}

/// One candidate record from the reference corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub code: String,
    pub description: String,
    pub category: String,
}

/// code -> payer name -> rule text.
pub type RuleBook = HashMap<String, HashMap<String, String>>;

/// Loaded reference data: the candidate corpus plus the payer rule book.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub candidates: Vec<CandidateRecord>,
    pub rules: RuleBook,
}

impl ReferenceData {
    /// Look up a candidate by exact code.
    pub fn find(&self, code: &str) -> Option<&CandidateRecord> {
        self.candidates.iter().find(|r| r.code == code)
    }

    /// Raw rule text for a code under a payer, if any.
    pub fn rule_for(&self, code: &str, payer: &str) -> Option<&str> {
        self.rules
            .get(code)
            .and_then(|per_payer| per_payer.get(payer))
            .map(String::as_str)
    }
}

/// Errors from loading reference data.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reference corpus is empty")]
    EmptyCorpus,
}

/// Anything that can produce the reference corpus.
pub trait ReferenceDataSource {
    fn load(&self) -> Result<ReferenceData, DatasetError>;
}

/// Loads candidates and rules from two JSON files on disk.
pub struct JsonFileSource {
    codes_path: PathBuf,
    rules_path: PathBuf,
}

impl JsonFileSource {
    pub fn new(codes_path: impl Into<PathBuf>, rules_path: impl Into<PathBuf>) -> Self {
        Self {
            codes_path: codes_path.into(),
            rules_path: rules_path.into(),
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl ReferenceDataSource for JsonFileSource {
    fn load(&self) -> Result<ReferenceData, DatasetError> {
        let candidates: Vec<CandidateRecord> = Self::read_json(&self.codes_path)?;
        let rules: RuleBook = Self::read_json(&self.rules_path)?;

        if candidates.is_empty() {
            return Err(DatasetError::EmptyCorpus);
        }

        tracing::info!(
            codes = candidates.len(),
            rule_entries = rules.len(),
            "reference data loaded"
        );
        Ok(ReferenceData { candidates, rules })
    }
}

/// In-memory source for tests and diagnostics fixtures.
pub struct InMemorySource(pub ReferenceData);

impl ReferenceDataSource for InMemorySource {
    fn load(&self) -> Result<ReferenceData, DatasetError> {
        if self.0.candidates.is_empty() {
            return Err(DatasetError::EmptyCorpus);
        }
        Ok(self.0.clone())
    }
}
