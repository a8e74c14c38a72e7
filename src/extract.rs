//! Structured attribute extraction from free-text request lines.
//!
//! One schema-constrained prompt per line, then field-local repair of the
//! reply: a malformed field is dropped or coerced without invalidating the
//! rest. There is no retry; an unusable reply is a validation failure.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::capability::{CapabilityHost, GenerativeOptions, PromptOutput};
use crate::config::PipelineConfig;
use crate::dataset::is_candidate_code;
use crate::deadline::with_deadline;
use crate::error::AiError;

/// Attributes pulled from one request line. Every field is optional; absence
/// means the model saw no evidence for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedAttributes {
    pub candidate_code: Option<String>,
    pub modifiers: Vec<String>,
    pub modality: Option<String>,
    pub body_part: Option<String>,
    pub contrast: Option<String>,
    pub laterality: Option<String>,
    pub setting: Option<String>,
    pub reason: Option<String>,
}

pub struct ExtractionSession {
    host: Arc<dyn CapabilityHost>,
    config: PipelineConfig,
}

impl ExtractionSession {
    pub fn new(host: Arc<dyn CapabilityHost>, config: PipelineConfig) -> Self {
        Self { host, config }
    }

    /// Extract attributes from one line with a single constrained prompt.
    pub async fn extract(&self, line: &str) -> Result<ExtractedAttributes, AiError> {
        let session = with_deadline(
            self.host.create_generative(&GenerativeOptions::monolingual("en")),
            self.config.prompt_deadline,
            "extraction session creation",
        )
        .await?;

        let schema = extraction_schema();
        let prompt = format!(
            "Extract procedure attributes from this prior-authorization request \
             line. Use null for anything not present. Line:\n{line}"
        );
        let output = with_deadline(
            session.prompt(&prompt, Some(&schema)),
            self.config.prompt_deadline,
            "attribute extraction",
        )
        .await?;

        let value = match output {
            PromptOutput::Structured(value) => value,
            PromptOutput::Text(text) => serde_json::from_str(text.trim())
                .map_err(|_| AiError::ValidationFailure("no structured output".to_string()))?,
        };
        let object = value
            .as_object()
            .ok_or_else(|| AiError::ValidationFailure("no structured output".to_string()))?;

        let candidate_code = object
            .get("candidateCode")
            .and_then(coerce_string)
            .filter(|code| is_candidate_code(code));
        if candidate_code.is_none() && object.contains_key("candidateCode") {
            tracing::debug!("dropped candidate code with bad shape");
        }

        let modifiers = match object.get("modifiers") {
            Some(Value::Array(items)) => items.iter().filter_map(coerce_string).collect(),
            _ => Vec::new(),
        };

        Ok(ExtractedAttributes {
            candidate_code,
            modifiers,
            modality: object.get("modality").and_then(coerce_string),
            body_part: object.get("bodyPart").and_then(coerce_string),
            contrast: object.get("contrast").and_then(coerce_string),
            laterality: object.get("laterality").and_then(coerce_string),
            setting: object.get("setting").and_then(coerce_string),
            reason: object.get("reason").and_then(coerce_string),
        })
    }
}

/// JSON schema sent as the generation constraint.
fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "candidateCode": { "type": "string" },
            "modifiers": { "type": "array", "items": { "type": "string" } },
            "modality": { "type": "string" },
            "bodyPart": { "type": "string" },
            "contrast": { "type": "string" },
            "laterality": { "type": "string" },
            "setting": { "type": "string" },
            "reason": { "type": "string" }
        }
    })
}

/// Coerce a scalar to a non-empty string; numbers and bools stringify,
/// anything else is dropped.
fn coerce_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::MockHost;

    fn session(host: &MockHost) -> ExtractionSession {
        ExtractionSession::new(Arc::new(host.clone()), PipelineConfig::default())
    }

    fn scripted(reply: Value) -> MockHost {
        MockHost::new().generative_response(PromptOutput::Structured(reply))
    }

    #[tokio::test]
    async fn full_reply_maps_every_field() {
        let host = scripted(json!({
            "candidateCode": "70553",
            "modifiers": ["26", "LT"],
            "modality": "MRI",
            "bodyPart": "brain",
            "contrast": "with and without",
            "laterality": "left",
            "setting": "outpatient",
            "reason": "chronic headaches"
        }));
        let attrs = session(&host).extract("MRI brain w/wo, left").await.unwrap();

        assert_eq!(attrs.candidate_code.as_deref(), Some("70553"));
        assert_eq!(attrs.modifiers, vec!["26", "LT"]);
        assert_eq!(attrs.modality.as_deref(), Some("MRI"));
        assert_eq!(attrs.body_part.as_deref(), Some("brain"));
        assert_eq!(attrs.reason.as_deref(), Some("chronic headaches"));
    }

    #[tokio::test]
    async fn bad_code_shape_dropped_rest_kept() {
        let host = scripted(json!({
            "candidateCode": "7055",
            "modality": "MRI"
        }));
        let attrs = session(&host).extract("mri").await.unwrap();

        assert_eq!(attrs.candidate_code, None);
        assert_eq!(attrs.modality.as_deref(), Some("MRI"));
    }

    #[tokio::test]
    async fn numeric_code_is_stringified_then_validated() {
        let host = scripted(json!({ "candidateCode": 70553 }));
        let attrs = session(&host).extract("mri").await.unwrap();
        assert_eq!(attrs.candidate_code.as_deref(), Some("70553"));
    }

    #[tokio::test]
    async fn non_array_modifiers_coerced_to_empty() {
        let host = scripted(json!({ "modifiers": "26" }));
        let attrs = session(&host).extract("x").await.unwrap();
        assert!(attrs.modifiers.is_empty());
    }

    #[tokio::test]
    async fn non_string_modifier_entries_are_coerced_or_dropped() {
        let host = scripted(json!({ "modifiers": ["26", 59, null, {"a": 1}] }));
        let attrs = session(&host).extract("x").await.unwrap();
        assert_eq!(attrs.modifiers, vec!["26", "59"]);
    }

    #[tokio::test]
    async fn scalar_coercion_covers_numbers_and_bools() {
        let host = scripted(json!({ "contrast": true, "setting": 2 }));
        let attrs = session(&host).extract("x").await.unwrap();
        assert_eq!(attrs.contrast.as_deref(), Some("true"));
        assert_eq!(attrs.setting.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn text_reply_containing_json_is_parsed() {
        let host = MockHost::new().generative_response(PromptOutput::Text(
            "{\"modality\": \"CT\"}".to_string(),
        ));
        let attrs = session(&host).extract("ct chest").await.unwrap();
        assert_eq!(attrs.modality.as_deref(), Some("CT"));
    }

    #[tokio::test]
    async fn prose_reply_is_a_validation_failure() {
        let host = MockHost::new()
            .generative_response(PromptOutput::Text("I could not extract anything.".into()));
        let err = session(&host).extract("x").await.unwrap_err();
        assert!(matches!(err, AiError::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn non_object_json_is_a_validation_failure() {
        let host = scripted(json!(["not", "an", "object"]));
        let err = session(&host).extract("x").await.unwrap_err();
        assert!(matches!(err, AiError::ValidationFailure(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_session_creation_times_out() {
        // A backend that accepts the connection but never answers the
        // create call must not hang extraction past its deadline.
        let host = MockHost::new().create_delay(std::time::Duration::from_secs(300));
        let err = session(&host).extract("x").await.unwrap_err();
        match err {
            AiError::Timeout { label } => assert_eq!(label, "extraction session creation"),
            other => panic!("expected Timeout, got: {other}"),
        }
    }

    #[tokio::test]
    async fn absent_generative_surfaces_unavailable_without_prompting() {
        let host = MockHost::new().without_generative();
        let err = session(&host).extract("x").await.unwrap_err();
        assert!(matches!(err, AiError::CapabilityUnavailable(_)));
        assert!(host.prompts().is_empty());
    }

    #[tokio::test]
    async fn exactly_one_prompt_per_line() {
        let host = scripted(json!({ "modality": "CT" }));
        session(&host).extract("ct chest").await.unwrap();
        let prompts = host.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("ct chest"));
    }
}
