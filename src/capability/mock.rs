//! Scriptable in-memory capability host for tests and diagnostics fixtures.
//!
//! Mirrors the real host's surface: capabilities can be absent, slow, or
//! failing, and every call is recorded so orchestration tests can assert on
//! call counts and arguments.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    CapabilityHost, GenerativeOptions, GenerativeSession, PromptOutput, Summarizer,
    SummarizerOptions, Translator,
};
use crate::error::AiError;

#[derive(Default)]
struct MockState {
    translator_absent: bool,
    generative_absent: bool,
    summarizer_absent: bool,

    translator_fails: bool,
    create_delay: Option<Duration>,
    prompt_delay: Option<Duration>,
    summarize_delay: Option<Duration>,

    generative_response: Mutex<Option<PromptOutput>>,
    /// Summarizer calls fail when their context contains this needle.
    summarizer_fails_when: Mutex<Option<String>>,

    translator_creates: AtomicUsize,
    translate_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    summaries: Mutex<Vec<(String, String)>>,
    summarize_active: AtomicUsize,
    summarize_peak: AtomicUsize,
}

/// Scriptable capability host.
#[derive(Clone)]
pub struct MockHost {
    state: Arc<MockState>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// All capabilities present, echo-style behavior.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
        }
    }

    fn edit(self, f: impl FnOnce(&mut MockState)) -> Self {
        // Builder-time only: the Arc has a single owner until the host is shared.
        let mut state = Arc::try_unwrap(self.state).unwrap_or_default();
        f(&mut state);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn without_translator(self) -> Self {
        self.edit(|s| s.translator_absent = true)
    }

    pub fn without_generative(self) -> Self {
        self.edit(|s| s.generative_absent = true)
    }

    pub fn without_summarizer(self) -> Self {
        self.edit(|s| s.summarizer_absent = true)
    }

    /// Translator creates fine but every translate call fails.
    pub fn failing_translator(self) -> Self {
        self.edit(|s| s.translator_fails = true)
    }

    /// Delay every capability create call.
    pub fn create_delay(self, delay: Duration) -> Self {
        self.edit(|s| s.create_delay = Some(delay))
    }

    /// Delay every generative prompt.
    pub fn prompt_delay(self, delay: Duration) -> Self {
        self.edit(|s| s.prompt_delay = Some(delay))
    }

    /// Delay every summarize call, so overlapping calls can be observed.
    pub fn summarize_delay(self, delay: Duration) -> Self {
        self.edit(|s| s.summarize_delay = Some(delay))
    }

    /// Fixed output for every generative prompt.
    pub fn generative_response(self, output: PromptOutput) -> Self {
        self.edit(|s| s.generative_response = Mutex::new(Some(output)))
    }

    /// Summarizer calls whose context contains `needle` fail.
    pub fn summarizer_fails_when(self, needle: &str) -> Self {
        let needle = needle.to_string();
        self.edit(|s| s.summarizer_fails_when = Mutex::new(Some(needle)))
    }

    // ── Recorded activity ────────────────────────────────────

    pub fn translator_creates(&self) -> usize {
        self.state.translator_creates.load(Ordering::SeqCst)
    }

    pub fn translate_calls(&self) -> usize {
        self.state.translate_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.prompts.lock().expect("lock poisoned").clone()
    }

    /// Recorded (text, context) pairs of summarizer calls.
    pub fn summaries(&self) -> Vec<(String, String)> {
        self.state.summaries.lock().expect("lock poisoned").clone()
    }

    /// High-water mark of summarize calls in flight at once.
    pub fn summarize_peak(&self) -> usize {
        self.state.summarize_peak.load(Ordering::SeqCst)
    }
}

struct MockTranslator {
    state: Arc<MockState>,
    target: String,
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str) -> Result<String, AiError> {
        self.state.translate_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.translator_fails {
            return Err(AiError::CapabilityFailure("translator rejected input".into()));
        }
        Ok(format!("[{}] {}", self.target, text))
    }
}

struct MockGenerative {
    state: Arc<MockState>,
}

#[async_trait]
impl GenerativeSession for MockGenerative {
    async fn prompt(
        &self,
        text: &str,
        _constraint: Option<&Value>,
    ) -> Result<PromptOutput, AiError> {
        if let Some(delay) = self.state.prompt_delay {
            tokio::time::sleep(delay).await;
        }
        self.state
            .prompts
            .lock()
            .expect("lock poisoned")
            .push(text.to_string());
        let scripted = self
            .state
            .generative_response
            .lock()
            .expect("lock poisoned")
            .clone();
        Ok(scripted.unwrap_or_else(|| PromptOutput::Text("OK".to_string())))
    }
}

struct MockSummarizer {
    state: Arc<MockState>,
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        text: &str,
        context: &str,
        _output_language: &str,
    ) -> Result<String, AiError> {
        let active = self.state.summarize_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.summarize_peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.state.summarize_delay {
            tokio::time::sleep(delay).await;
        }
        self.state
            .summaries
            .lock()
            .expect("lock poisoned")
            .push((text.to_string(), context.to_string()));
        let failing = self
            .state
            .summarizer_fails_when
            .lock()
            .expect("lock poisoned")
            .clone();
        let outcome = match failing {
            Some(needle) if context.contains(&needle) => {
                Err(AiError::CapabilityFailure("summarizer backend error".into()))
            }
            _ => {
                let preview: String = text.chars().take(12).collect();
                Ok(format!("summary({preview})"))
            }
        };
        self.state.summarize_active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[async_trait]
impl CapabilityHost for MockHost {
    async fn create_translator(
        &self,
        _source: &str,
        target: &str,
    ) -> Result<Arc<dyn Translator>, AiError> {
        if let Some(delay) = self.state.create_delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.translator_absent {
            return Err(AiError::CapabilityUnavailable("translation"));
        }
        self.state.translator_creates.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockTranslator {
            state: Arc::clone(&self.state),
            target: target.to_string(),
        }))
    }

    async fn create_generative(
        &self,
        _options: &GenerativeOptions,
    ) -> Result<Arc<dyn GenerativeSession>, AiError> {
        if let Some(delay) = self.state.create_delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.generative_absent {
            return Err(AiError::CapabilityUnavailable("generative"));
        }
        Ok(Arc::new(MockGenerative {
            state: Arc::clone(&self.state),
        }))
    }

    async fn create_summarizer(
        &self,
        _options: &SummarizerOptions,
    ) -> Result<Arc<dyn Summarizer>, AiError> {
        if let Some(delay) = self.state.create_delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.summarizer_absent {
            return Err(AiError::CapabilityUnavailable("summarization"));
        }
        Ok(Arc::new(MockSummarizer {
            state: Arc::clone(&self.state),
        }))
    }
}
