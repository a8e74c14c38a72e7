//! Code validation against the reference corpus and payer rule book.

use std::sync::Arc;

use serde::Serialize;

use crate::dataset::{is_candidate_code, ReferenceData};
use crate::sanitize::normalize_rule_text;
use crate::translate::{Intent, LanguageRegistry};

/// Appended to a not-found line when the queried code is not even shaped
/// like a code.
pub const SHAPE_HINT: &str = "Codes are 5 digits.";

/// Rule phrasings that signal approval is likely not needed.
const NO_PA_MARKERS: &[&str] = &["not required", "no pa", "no prior"];

/// Outcome for one queried code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationLine {
    pub code: String,
    pub found: bool,
    pub description: Option<String>,
    pub rule: Option<String>,
    pub payer: String,
    /// The payer rule suggests no prior authorization is needed.
    pub approval_likely: bool,
    /// Shape hint, only set when the code fails the 5-digit shape.
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub lines: Vec<ValidationLine>,
}

pub struct CodeValidator {
    data: Arc<ReferenceData>,
    registry: Arc<LanguageRegistry>,
}

impl CodeValidator {
    pub fn new(data: Arc<ReferenceData>, registry: Arc<LanguageRegistry>) -> Self {
        Self { data, registry }
    }

    /// Validate every code in a free-text query.
    ///
    /// Codes are split on commas and whitespace. A found code yields its
    /// description and the payer's normalized rule; a missing code yields a
    /// not-found line, with the shape hint only when the query itself is not
    /// a plausible code. Descriptions, rules, and the payer name are
    /// best-effort translated per line.
    pub async fn validate_codes(&self, input: &str, payer: &str, lang: &str) -> ValidationReport {
        let codes: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        let mut lines = Vec::with_capacity(codes.len());
        for code in codes {
            lines.push(self.validate_one(code, payer, lang).await);
        }
        tracing::debug!(
            codes = lines.len(),
            found = lines.iter().filter(|l| l.found).count(),
            "validated code query"
        );
        ValidationReport { lines }
    }

    async fn validate_one(&self, code: &str, payer: &str, lang: &str) -> ValidationLine {
        let translated_payer = self
            .registry
            .translate(payer, "en", lang, Intent::UserInitiated)
            .await;

        match self.data.find(code) {
            Some(record) => {
                let rule = self.data.rule_for(code, payer).map(normalize_rule_text);
                let approval_likely = rule
                    .as_deref()
                    .map(|r| {
                        let lowered = r.to_lowercase();
                        NO_PA_MARKERS.iter().any(|m| lowered.contains(m))
                    })
                    .unwrap_or(false);

                let description = self
                    .registry
                    .translate(&record.description, "en", lang, Intent::UserInitiated)
                    .await;
                let rule = match rule {
                    Some(r) => Some(
                        self.registry
                            .translate(&r, "en", lang, Intent::UserInitiated)
                            .await,
                    ),
                    None => None,
                };

                ValidationLine {
                    code: code.to_string(),
                    found: true,
                    description: Some(description),
                    rule,
                    payer: translated_payer,
                    approval_likely,
                    hint: None,
                }
            }
            None => ValidationLine {
                code: code.to_string(),
                found: false,
                description: None,
                rule: None,
                payer: translated_payer,
                approval_likely: false,
                hint: (!is_candidate_code(code)).then(|| SHAPE_HINT.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::MockHost;
    use crate::config::PipelineConfig;
    use crate::dataset::CandidateRecord;
    use std::collections::HashMap;

    fn reference_data() -> ReferenceData {
        let mut rules = HashMap::new();
        let mut per_payer = HashMap::new();
        per_payer.insert(
            "Medicare".to_string(),
            "PA not required for outpatient setting.".to_string(),
        );
        rules.insert("10001".to_string(), per_payer);

        let mut strict = HashMap::new();
        strict.insert(
            "Medicare".to_string(),
            "Approval required. Approval required. Submit imaging history.".to_string(),
        );
        rules.insert("10002".to_string(), strict);

        ReferenceData {
            candidates: vec![
                CandidateRecord {
                    code: "10001".to_string(),
                    description: "CT chest".to_string(),
                    category: "Imaging".to_string(),
                },
                CandidateRecord {
                    code: "10002".to_string(),
                    description: "MRI brain".to_string(),
                    category: "Imaging".to_string(),
                },
            ],
            rules,
        }
    }

    fn validator(host: &MockHost) -> CodeValidator {
        CodeValidator::new(
            Arc::new(reference_data()),
            Arc::new(LanguageRegistry::new(
                Arc::new(host.clone()),
                PipelineConfig::default(),
            )),
        )
    }

    #[tokio::test]
    async fn found_and_missing_codes_each_get_a_line() {
        let host = MockHost::new();
        let report = validator(&host)
            .validate_codes("10001, 99999", "Medicare", "en")
            .await;

        assert_eq!(report.lines.len(), 2);

        let found = &report.lines[0];
        assert_eq!(found.code, "10001");
        assert!(found.found);
        assert_eq!(found.description.as_deref(), Some("CT chest"));
        assert!(found.approval_likely);

        let missing = &report.lines[1];
        assert_eq!(missing.code, "99999");
        assert!(!missing.found);
        // 99999 is shaped like a code, so no hint.
        assert_eq!(missing.hint, None);
    }

    #[tokio::test]
    async fn malformed_code_gets_shape_hint() {
        let host = MockHost::new();
        let report = validator(&host).validate_codes("123", "Medicare", "en").await;

        let line = &report.lines[0];
        assert!(!line.found);
        assert_eq!(line.hint.as_deref(), Some(SHAPE_HINT));
    }

    #[tokio::test]
    async fn splits_on_commas_and_whitespace() {
        let host = MockHost::new();
        let report = validator(&host)
            .validate_codes("10001 10002,99999", "Medicare", "en")
            .await;
        let codes: Vec<&str> = report.lines.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["10001", "10002", "99999"]);
    }

    #[tokio::test]
    async fn rule_text_is_normalized() {
        let host = MockHost::new();
        let report = validator(&host)
            .validate_codes("10002", "Medicare", "en")
            .await;

        let line = &report.lines[0];
        // Duplicate adjacent sentence collapsed.
        assert_eq!(
            line.rule.as_deref(),
            Some("Approval required. Submit imaging history.")
        );
        assert!(!line.approval_likely);
    }

    #[tokio::test]
    async fn unknown_payer_means_no_rule() {
        let host = MockHost::new();
        let report = validator(&host).validate_codes("10001", "Acme", "en").await;

        let line = &report.lines[0];
        assert!(line.found);
        assert_eq!(line.rule, None);
        assert!(!line.approval_likely);
    }

    #[tokio::test]
    async fn lines_are_translated_per_language() {
        let host = MockHost::new();
        let report = validator(&host)
            .validate_codes("10001", "Medicare", "es")
            .await;

        let line = &report.lines[0];
        assert_eq!(line.description.as_deref(), Some("[es] CT chest"));
        assert_eq!(line.payer, "[es] Medicare");
        assert!(line.rule.as_deref().unwrap().starts_with("[es] "));
    }

    #[tokio::test]
    async fn english_report_touches_no_translator() {
        let host = MockHost::new();
        validator(&host)
            .validate_codes("10001, 99999", "Medicare", "en")
            .await;
        assert_eq!(host.translator_creates(), 0);
    }
}
