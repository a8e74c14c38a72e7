//! Language service registry.
//!
//! Translator instances are expensive to create and tied to a language pair,
//! so the registry caches one per (source, target) pair over an injected
//! `CapabilityHost`. Creation is single-flight: concurrent first requests for
//! a pair await the same creation, and a failed creation is cached as absent
//! for the registry's lifetime. Translation itself never errors to the
//! caller; every failure degrades to the original text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::capability::{CapabilityHost, GenerativeOptions, Translator};
use crate::config::PipelineConfig;
use crate::deadline::with_deadline;

/// Whether a request came from a direct user action.
///
/// The generative fallback can stall while a backend loads a model, which is
/// only acceptable when a user is actively waiting. Background requests skip
/// the fallback and degrade immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    UserInitiated,
    Background,
}

type PairKey = (String, String);
type PairCell = Arc<OnceCell<Option<Arc<dyn Translator>>>>;

pub struct LanguageRegistry {
    host: Arc<dyn CapabilityHost>,
    config: PipelineConfig,
    pairs: Mutex<HashMap<PairKey, PairCell>>,
}

impl LanguageRegistry {
    pub fn new(host: Arc<dyn CapabilityHost>, config: PipelineConfig) -> Self {
        Self {
            host,
            config,
            pairs: Mutex::new(HashMap::new()),
        }
    }

    /// The cached translator for a pair, creating it on first use.
    ///
    /// `None` means the pair is unavailable; that outcome is cached too, so a
    /// broken backend is probed once per pair, not once per call.
    async fn translator_for(&self, source: &str, target: &str) -> Option<Arc<dyn Translator>> {
        let cell = {
            let mut pairs = self.pairs.lock().expect("lock poisoned");
            Arc::clone(
                pairs
                    .entry((source.to_string(), target.to_string()))
                    .or_default(),
            )
        };

        cell.get_or_init(|| async {
            let created = with_deadline(
                self.host.create_translator(source, target),
                self.config.prompt_deadline,
                "translator creation",
            )
            .await;
            match created {
                Ok(translator) => Some(translator),
                Err(err) => {
                    tracing::debug!(
                        source = %source,
                        target = %target,
                        error = %err,
                        "translator unavailable for pair"
                    );
                    None
                }
            }
        })
        .await
        .clone()
    }

    /// Best-effort translation. Identity pairs short-circuit without touching
    /// any capability; every failure path returns the original text.
    pub async fn translate(&self, text: &str, source: &str, target: &str, intent: Intent) -> String {
        if text.trim().is_empty() || source.eq_ignore_ascii_case(target) {
            return text.to_string();
        }

        if let Some(translator) = self.translator_for(source, target).await {
            match with_deadline(
                translator.translate(text),
                self.config.prompt_deadline,
                "translation",
            )
            .await
            {
                Ok(translated) => return translated,
                Err(err) if err.is_degradation() => {
                    tracing::debug!(error = %err, "translator call failed; trying generative fallback");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "translator call failed; trying generative fallback");
                }
            }
        }

        self.generative_fallback(text, source, target, intent)
            .await
            .unwrap_or_else(|| text.to_string())
    }

    /// Translate each line independently; output order matches input order
    /// and a failed line falls back to its original text alone.
    pub async fn translate_lines(
        &self,
        lines: &[String],
        source: &str,
        target: &str,
        intent: Intent,
    ) -> Vec<String> {
        let mut translated = Vec::with_capacity(lines.len());
        for line in lines {
            translated.push(self.translate(line, source, target, intent).await);
        }
        translated
    }

    async fn generative_fallback(
        &self,
        text: &str,
        source: &str,
        target: &str,
        intent: Intent,
    ) -> Option<String> {
        if intent != Intent::UserInitiated {
            tracing::debug!("background request; skipping generative fallback");
            return None;
        }

        let options = GenerativeOptions {
            input_languages: vec![source.to_string()],
            output_languages: vec![target.to_string()],
        };
        let session = with_deadline(
            self.host.create_generative(&options),
            self.config.prompt_deadline,
            "fallback session creation",
        )
        .await
        .ok()?;
        let prompt = format!(
            "Translate the following text from {source} to {target}. \
             Output only the translation, nothing else.\n\n{text}"
        );
        let output = with_deadline(
            session.prompt(&prompt, None),
            self.config.prompt_deadline,
            "translation fallback",
        )
        .await
        .ok()?;

        let translated = output.into_text().trim().to_string();
        (!translated.is_empty()).then_some(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::MockHost;

    fn registry(host: &MockHost) -> LanguageRegistry {
        LanguageRegistry::new(Arc::new(host.clone()), PipelineConfig::default())
    }

    #[tokio::test]
    async fn identity_pair_touches_no_capability() {
        let host = MockHost::new();
        let reg = registry(&host);

        let out = reg.translate("hola", "es", "es", Intent::Background).await;
        assert_eq!(out, "hola");
        assert_eq!(host.translator_creates(), 0);
        assert_eq!(host.translate_calls(), 0);
    }

    #[tokio::test]
    async fn identity_pair_is_case_insensitive() {
        let host = MockHost::new();
        let reg = registry(&host);

        let out = reg.translate("text", "EN", "en", Intent::Background).await;
        assert_eq!(out, "text");
        assert_eq!(host.translator_creates(), 0);
    }

    #[tokio::test]
    async fn translator_is_created_once_per_pair() {
        let host = MockHost::new();
        let reg = registry(&host);

        let first = reg.translate("hello", "en", "es", Intent::Background).await;
        let second = reg.translate("world", "en", "es", Intent::Background).await;
        assert_eq!(first, "[es] hello");
        assert_eq!(second, "[es] world");
        assert_eq!(host.translator_creates(), 1);
        assert_eq!(host.translate_calls(), 2);
    }

    #[tokio::test]
    async fn distinct_pairs_get_distinct_translators() {
        let host = MockHost::new();
        let reg = registry(&host);

        reg.translate("hi", "en", "es", Intent::Background).await;
        reg.translate("hi", "en", "fr", Intent::Background).await;
        assert_eq!(host.translator_creates(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_requests_share_one_creation() {
        let host = MockHost::new().create_delay(std::time::Duration::from_millis(50));
        let reg = registry(&host);

        let (a, b, c) = tokio::join!(
            reg.translate("one", "en", "es", Intent::Background),
            reg.translate("two", "en", "es", Intent::Background),
            reg.translate("three", "en", "es", Intent::Background),
        );
        assert_eq!(a, "[es] one");
        assert_eq!(b, "[es] two");
        assert_eq!(c, "[es] three");
        assert_eq!(host.translator_creates(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_creation_degrades_instead_of_hanging() {
        // Creation that never settles is cut by the deadline and cached as
        // absent; the call still degrades to the original text.
        let host = MockHost::new().create_delay(std::time::Duration::from_secs(300));
        let reg = registry(&host);

        let out = reg.translate("hello", "en", "es", Intent::Background).await;
        assert_eq!(out, "hello");
        assert_eq!(host.translator_creates(), 0);
    }

    #[tokio::test]
    async fn failed_creation_is_cached_as_absent() {
        let host = MockHost::new().without_translator();
        let reg = registry(&host);

        assert!(reg.translator_for("en", "es").await.is_none());
        assert!(reg.translator_for("en", "es").await.is_none());

        let cell = {
            let pairs = reg.pairs.lock().expect("lock poisoned");
            Arc::clone(pairs.get(&("en".to_string(), "es".to_string())).unwrap())
        };
        // The negative outcome itself is cached, not re-probed.
        assert!(matches!(cell.get(), Some(None)));
    }

    #[tokio::test]
    async fn translator_failure_falls_back_to_generative() {
        let host = MockHost::new().failing_translator();
        let reg = registry(&host);

        let out = reg.translate("hello", "en", "es", Intent::UserInitiated).await;
        assert_eq!(out, "OK"); // mock generative default reply
        let prompts = host.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("hello"));
        assert!(prompts[0].contains("Output only the translation"));
    }

    #[tokio::test]
    async fn background_request_skips_generative_fallback() {
        let host = MockHost::new().failing_translator();
        let reg = registry(&host);

        let out = reg.translate("hello", "en", "es", Intent::Background).await;
        assert_eq!(out, "hello");
        assert!(host.prompts().is_empty());
    }

    #[tokio::test]
    async fn everything_absent_returns_original_text() {
        let host = MockHost::new().without_translator().without_generative();
        let reg = registry(&host);

        let out = reg.translate("hello", "en", "es", Intent::UserInitiated).await;
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn lines_keep_input_order() {
        let host = MockHost::new();
        let reg = registry(&host);

        let lines = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out = reg
            .translate_lines(&lines, "en", "es", Intent::Background)
            .await;
        assert_eq!(out, vec!["[es] a", "[es] b", "[es] c"]);
    }
}
