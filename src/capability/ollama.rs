//! Ollama-backed capability host.
//!
//! One async HTTP client against a local Ollama instance backs all three
//! capabilities through `/api/generate`. Model availability is probed via
//! `/api/tags` at creation time, so an unreachable daemon or a missing model
//! reports the same way an absent platform capability would.
//!
//! The client sets a connect timeout but no request timeout — call duration
//! is bounded by the pipeline's deadline guard, not by the transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    CapabilityHost, GenerativeOptions, GenerativeSession, PromptOutput, Summarizer,
    SummarizerOptions, Translator,
};
use crate::error::AiError;

/// Preferred local models in order of preference.
const PREFERRED_MODELS: &[&str] = &["gemma3", "llama3.2", "llama3", "mistral"];

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

struct Inner {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

/// Capability host backed by a local Ollama instance.
pub struct OllamaHost {
    inner: Arc<Inner>,
}

impl OllamaHost {
    /// Point at an Ollama instance with an explicit model name.
    pub fn new(base_url: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(Inner {
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.to_string(),
                client,
            }),
        }
    }

    /// Probe the default local instance and pick the best available model.
    ///
    /// Fails with `CapabilityUnavailable` when the daemon is unreachable or
    /// none of the preferred models is installed.
    pub async fn probe() -> Result<Self, AiError> {
        Self::probe_at(DEFAULT_BASE_URL).await
    }

    /// Probe a specific instance and pick the best available model.
    pub async fn probe_at(base_url: &str) -> Result<Self, AiError> {
        let host = Self::new(base_url, "");
        let available = host.list_models().await?;
        for preferred in PREFERRED_MODELS {
            if available.iter().any(|m| m.starts_with(preferred)) {
                tracing::info!(model = preferred, "Ollama host: model confirmed");
                return Ok(Self::new(base_url, preferred));
            }
        }
        tracing::debug!(installed = available.len(), "Ollama host: no preferred model");
        Err(AiError::CapabilityUnavailable("generative"))
    }

    /// The model name in use.
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// List models installed on the instance.
    pub async fn list_models(&self) -> Result<Vec<String>, AiError> {
        self.inner.list_models().await
    }

    /// Whether a model (by name prefix) is installed.
    pub async fn is_model_available(&self, model: &str) -> Result<bool, AiError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    async fn ensure_model(&self, capability: &'static str) -> Result<(), AiError> {
        match self.is_model_available(&self.inner.model).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::debug!(
                    model = %self.inner.model,
                    capability,
                    "model not installed; capability unavailable"
                );
                Err(AiError::CapabilityUnavailable(capability))
            }
            Err(AiError::CapabilityUnavailable(_)) => {
                Err(AiError::CapabilityUnavailable(capability))
            }
            Err(other) => Err(other),
        }
    }
}

/// Request body for Ollama `/api/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
}

/// Response body from Ollama `/api/generate`.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response body from Ollama `/api/tags`.
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TaggedModel>,
}

#[derive(Deserialize)]
struct TaggedModel {
    name: String,
}

impl Inner {
    fn map_transport(&self, err: reqwest::Error) -> AiError {
        if err.is_connect() {
            tracing::debug!(base_url = %self.base_url, "Ollama unreachable");
            AiError::CapabilityUnavailable("generative")
        } else {
            AiError::CapabilityFailure(err.to_string())
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        format: Option<&Value>,
    ) -> Result<String, AiError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            format,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::CapabilityFailure(format!(
                "Ollama returned status {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::CapabilityFailure(format!("response parsing: {e}")))?;

        Ok(parsed.response)
    }

    async fn list_models(&self) -> Result<Vec<String>, AiError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::CapabilityFailure(format!(
                "Ollama returned status {status}: {body}"
            )));
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(|e| AiError::CapabilityFailure(format!("response parsing: {e}")))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

struct OllamaTranslator {
    inner: Arc<Inner>,
    system: String,
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str) -> Result<String, AiError> {
        let out = self.inner.generate(text, &self.system, None).await?;
        Ok(out.trim().to_string())
    }
}

struct OllamaGenerative {
    inner: Arc<Inner>,
    system: String,
}

#[async_trait]
impl GenerativeSession for OllamaGenerative {
    async fn prompt(
        &self,
        text: &str,
        constraint: Option<&Value>,
    ) -> Result<PromptOutput, AiError> {
        let raw = self.inner.generate(text, &self.system, constraint).await?;
        if constraint.is_some() {
            // Schema-constrained generation replies with a JSON document;
            // fall back to text when the backend ignored the constraint.
            if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
                return Ok(PromptOutput::Structured(value));
            }
        }
        Ok(PromptOutput::Text(raw))
    }
}

struct OllamaSummarizer {
    inner: Arc<Inner>,
    options: SummarizerOptions,
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(
        &self,
        text: &str,
        context: &str,
        output_language: &str,
    ) -> Result<String, AiError> {
        let system = format!(
            "You summarize medical administrative documents. Style: {}. Format: {}. \
             Length: {}. Write the summary in {}. {}",
            self.options.style,
            self.options.format,
            self.options.length,
            output_language.to_uppercase(),
            context,
        );
        let out = self.inner.generate(text, &system, None).await?;
        Ok(out.trim().to_string())
    }
}

#[async_trait]
impl CapabilityHost for OllamaHost {
    async fn create_translator(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Arc<dyn Translator>, AiError> {
        self.ensure_model("translation").await?;
        let system = format!(
            "Translate the user's text from {} to {}. Output only the translation, nothing else.",
            source.to_uppercase(),
            target.to_uppercase(),
        );
        Ok(Arc::new(OllamaTranslator {
            inner: Arc::clone(&self.inner),
            system,
        }))
    }

    async fn create_generative(
        &self,
        options: &GenerativeOptions,
    ) -> Result<Arc<dyn GenerativeSession>, AiError> {
        self.ensure_model("generative").await?;
        let output = options.output_languages.join(", ");
        let system = format!("Respond in: {}.", output.to_uppercase());
        Ok(Arc::new(OllamaGenerative {
            inner: Arc::clone(&self.inner),
            system,
        }))
    }

    async fn create_summarizer(
        &self,
        options: &SummarizerOptions,
    ) -> Result<Arc<dyn Summarizer>, AiError> {
        self.ensure_model("summarization").await?;
        Ok(Arc::new(OllamaSummarizer {
            inner: Arc::clone(&self.inner),
            options: options.clone(),
        }))
    }
}
