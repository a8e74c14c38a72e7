//! Prior-authorization note drafting.
//!
//! Drafting is a single schema-constrained prompt that fills three note
//! fields; polishing and rule explanation are silent enhancement passes.
//! Every generative output goes through the sanitizer, and every failure
//! degrades to a usable value: placeholder guidance for drafting, the
//! original text for polishing, an empty string for explanation.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::capability::{CapabilityHost, GenerativeOptions, PromptOutput};
use crate::config::PipelineConfig;
use crate::deadline::with_deadline;
use crate::error::AiError;
use crate::sanitize::sanitize_ai;

/// Rule explanations are capped to roughly tooltip length.
const EXPLANATION_CAP: usize = 220;

pub const NECESSITY_PLACEHOLDER: &str =
    "Describe the clinical indication and why this procedure is medically necessary.";
pub const HISTORY_PLACEHOLDER: &str =
    "List relevant history, prior imaging, and conservative treatment already tried.";
pub const SITE_PLACEHOLDER: &str =
    "State the site of service and any applicable modifiers.";

/// The three drafted sections of a PA note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteFields {
    pub medical_necessity: String,
    pub history_imaging: String,
    pub site_modifiers: String,
}

impl NoteFields {
    /// Placeholder guidance for every field.
    pub fn placeholders() -> Self {
        Self {
            medical_necessity: NECESSITY_PLACEHOLDER.to_string(),
            history_imaging: HISTORY_PLACEHOLDER.to_string(),
            site_modifiers: SITE_PLACEHOLDER.to_string(),
        }
    }
}

pub struct NoteDrafter {
    host: Arc<dyn CapabilityHost>,
    config: PipelineConfig,
}

impl NoteDrafter {
    pub fn new(host: Arc<dyn CapabilityHost>, config: PipelineConfig) -> Self {
        Self { host, config }
    }

    /// Draft the note fields from the request context with one constrained
    /// prompt. Any failure falls back to placeholder guidance; a field the
    /// model leaves blank gets its own placeholder.
    pub async fn draft_note_fields(&self, context: &str, lang: &str) -> NoteFields {
        let object = match self.draft_raw(context, lang).await {
            Ok(object) => object,
            Err(err) => {
                tracing::debug!(error = %err, "note drafting failed; using placeholders");
                return NoteFields::placeholders();
            }
        };

        NoteFields {
            medical_necessity: field_or(&object, "medicalNecessity", NECESSITY_PLACEHOLDER),
            history_imaging: field_or(&object, "historyImaging", HISTORY_PLACEHOLDER),
            site_modifiers: field_or(&object, "siteModifiers", SITE_PLACEHOLDER),
        }
    }

    async fn draft_raw(&self, context: &str, lang: &str) -> Result<Value, AiError> {
        let session = with_deadline(
            self.host.create_generative(&GenerativeOptions::english_to(lang)),
            self.config.prompt_deadline,
            "drafting session creation",
        )
        .await?;
        let schema = json!({
            "type": "object",
            "properties": {
                "medicalNecessity": { "type": "string" },
                "historyImaging": { "type": "string" },
                "siteModifiers": { "type": "string" }
            }
        });
        let prompt = format!(
            "Draft the three sections of a prior-authorization note for this \
             request. Be concrete and clinical.\n\nRequest context:\n{context}"
        );
        let output = with_deadline(
            session.prompt(&prompt, Some(&schema)),
            self.config.prompt_deadline,
            "note drafting",
        )
        .await?;

        let value = match output {
            PromptOutput::Structured(value) => value,
            PromptOutput::Text(text) => serde_json::from_str(text.trim())
                .map_err(|_| AiError::ValidationFailure("no structured output".to_string()))?,
        };
        if value.is_object() {
            Ok(value)
        } else {
            Err(AiError::ValidationFailure("no structured output".to_string()))
        }
    }

    /// Minimal proofread. Failure or an empty result returns the input
    /// unchanged; the caller cannot observe whether polishing happened.
    pub async fn polish_text(&self, text: &str, lang: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        let polished = self
            .prompt_plain(
                &format!(
                    "Proofread the following text. Fix grammar and spelling only; \
                     keep the meaning and tone.\n\n{text}"
                ),
                lang,
                "note polishing",
            )
            .await;
        match polished {
            Some(out) if !out.is_empty() => out,
            _ => text.to_string(),
        }
    }

    /// One-sentence plain-language rationale for a payer rule, capped for
    /// display. Failure yields an empty string.
    pub async fn explain_rule(&self, rule_text: &str, lang: &str) -> String {
        if rule_text.trim().is_empty() {
            return String::new();
        }
        let explained = self
            .prompt_plain(
                &format!(
                    "In one short sentence, explain in plain language what this \
                     prior-authorization rule asks for.\n\nRule:\n{rule_text}"
                ),
                lang,
                "rule explanation",
            )
            .await
            .unwrap_or_default();
        cap_chars(&collapse_whitespace(&explained), EXPLANATION_CAP)
    }

    async fn prompt_plain(&self, prompt: &str, lang: &str, label: &'static str) -> Option<String> {
        let session = with_deadline(
            self.host.create_generative(&GenerativeOptions::english_to(lang)),
            self.config.prompt_deadline,
            label,
        )
        .await
        .ok()?;
        let output = with_deadline(
            session.prompt(prompt, None),
            self.config.prompt_deadline,
            label,
        )
        .await;
        match output {
            Ok(out) => Some(sanitize_ai(&out.into_text())),
            Err(err) => {
                tracing::debug!(label, error = %err, "enhancement prompt failed");
                None
            }
        }
    }
}

/// Assemble the final note text. Blank fields fall back to placeholder
/// guidance so the note is always actionable.
pub fn assemble_note(fields: &NoteFields) -> String {
    let necessity = present_or(&fields.medical_necessity, NECESSITY_PLACEHOLDER);
    let history = present_or(&fields.history_imaging, HISTORY_PLACEHOLDER);
    let site = present_or(&fields.site_modifiers, SITE_PLACEHOLDER);
    format!(
        "Medical necessity: {necessity}\n\n\
         History and prior imaging: {history}\n\n\
         Site of service and modifiers: {site}"
    )
}

fn present_or(value: &str, placeholder: &str) -> String {
    let cleaned = sanitize_ai(value);
    if cleaned.trim().is_empty() {
        placeholder.to_string()
    } else {
        cleaned
    }
}

fn field_or(object: &Value, key: &str, placeholder: &str) -> String {
    let raw = object.get(key).and_then(Value::as_str).unwrap_or_default();
    let cleaned = sanitize_ai(raw);
    if cleaned.trim().is_empty() {
        placeholder.to_string()
    } else {
        cleaned
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cap_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut capped: String = text.chars().take(max.saturating_sub(1)).collect();
    capped.push('…');
    capped
}
