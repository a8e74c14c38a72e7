//! Capability-style collaborator interfaces.
//!
//! A capability is an optionally-present local backend (translation,
//! structured generation, summarization). A host may lack any of them:
//! absence surfaces as `AiError::CapabilityUnavailable` from the create
//! call, and every created instance can still fail per call. Callers decide
//! how far to degrade; the traits themselves promise nothing about latency.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AiError;

pub mod mock;
pub mod ollama;

/// Output of a generative prompt: plain text, or a value the backend
/// already decoded against the supplied schema.
#[derive(Debug, Clone)]
pub enum PromptOutput {
    Text(String),
    Structured(Value),
}

impl PromptOutput {
    /// Collapse to text; structured values render as compact JSON.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Structured(v) => match v {
                Value::String(s) => s,
                other => other.to_string(),
            },
        }
    }
}

/// A created translation instance for one fixed language pair.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, AiError>;
}

/// A created generative session.
#[async_trait]
pub trait GenerativeSession: Send + Sync {
    /// Issue one prompt. `constraint`, when present, is a JSON schema the
    /// output must match; the backend may reply structured or as a string.
    async fn prompt(&self, text: &str, constraint: Option<&Value>)
        -> Result<PromptOutput, AiError>;
}

/// A created summarization instance.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        context: &str,
        output_language: &str,
    ) -> Result<String, AiError>;
}

/// Options for creating a generative session.
#[derive(Debug, Clone)]
pub struct GenerativeOptions {
    pub input_languages: Vec<String>,
    pub output_languages: Vec<String>,
}

impl GenerativeOptions {
    /// English input, output in `lang` — the common pipeline shape.
    pub fn english_to(lang: &str) -> Self {
        Self {
            input_languages: vec!["en".to_string()],
            output_languages: vec![lang.to_string()],
        }
    }

    /// Same language in and out (polish/proofread sessions).
    pub fn monolingual(lang: &str) -> Self {
        Self {
            input_languages: vec![lang.to_string()],
            output_languages: vec![lang.to_string()],
        }
    }
}

/// Options for creating a summarizer.
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    pub style: String,
    pub format: String,
    pub length: String,
    pub output_language: String,
}

impl SummarizerOptions {
    pub fn key_points(output_language: &str) -> Self {
        Self {
            style: "key-points".to_string(),
            format: "markdown".to_string(),
            length: "medium".to_string(),
            output_language: output_language.to_string(),
        }
    }
}

/// Factory for capability instances.
///
/// Each create call is fallible: `CapabilityUnavailable` means the backend
/// is simply not present on this host and retrying is pointless.
#[async_trait]
pub trait CapabilityHost: Send + Sync {
    async fn create_translator(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Arc<dyn Translator>, AiError>;

    async fn create_generative(
        &self,
        options: &GenerativeOptions,
    ) -> Result<Arc<dyn GenerativeSession>, AiError>;

    async fn create_summarizer(
        &self,
        options: &SummarizerOptions,
    ) -> Result<Arc<dyn Summarizer>, AiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_output_text_passthrough() {
        let out = PromptOutput::Text("hola".to_string());
        assert_eq!(out.into_text(), "hola");
    }

    #[test]
    fn prompt_output_structured_string_unwraps() {
        let out = PromptOutput::Structured(json!("hola"));
        assert_eq!(out.into_text(), "hola");
    }

    #[test]
    fn prompt_output_structured_object_renders_json() {
        let out = PromptOutput::Structured(json!({"modality": "CT"}));
        assert_eq!(out.into_text(), r#"{"modality":"CT"}"#);
    }

    #[test]
    fn english_to_sets_languages() {
        let opts = GenerativeOptions::english_to("es");
        assert_eq!(opts.input_languages, vec!["en"]);
        assert_eq!(opts.output_languages, vec!["es"]);
    }

    #[test]
    fn key_points_defaults() {
        let opts = SummarizerOptions::key_points("ja");
        assert_eq!(opts.style, "key-points");
        assert_eq!(opts.output_language, "ja");
    }
}
