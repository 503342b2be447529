//! Experience extraction: one prompt per matched CV, tolerant reply parsing

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::parser::parse_experience;
use crate::llm::prompts::PromptTemplates;
use crate::llm::provider::StructuredExtractionProvider;
use crate::llm::schema::ExperienceReport;
use crate::processing::keyword_matcher::MatchResult;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct ExperienceExtractor {
    provider: Arc<dyn StructuredExtractionProvider>,
    prompts: PromptTemplates,
    timeout: Duration,
    min_interval: Duration,
    /// Held across each provider call so only one request is in flight.
    last_call: Mutex<Option<Instant>>,
}

impl ExperienceExtractor {
    pub fn new(provider: Arc<dyn StructuredExtractionProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            prompts: PromptTemplates::default(),
            timeout,
            min_interval: Duration::ZERO,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_config(
        provider: Arc<dyn StructuredExtractionProvider>,
        config: &LlmConfig,
    ) -> crate::error::Result<Self> {
        Ok(Self::new(provider, config.timeout()?)
            .with_min_interval(Duration::from_millis(config.request_delay_ms)))
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the model for the work history in `text` and attach the keyword
    /// match that was already computed for the document.
    pub async fn extract(&self, text: &str, matches: &MatchResult) -> Result<ExperienceReport, LlmError> {
        let prompt = self.prompts.render_experience(text);
        let reply = self.call_serialized(&prompt).await?;
        let record = parse_experience(&reply)?;

        Ok(ExperienceReport {
            record,
            matched_keywords: matches.matched_keywords.clone(),
            match_score: matches.score,
        })
    }

    async fn call_serialized(&self, prompt: &str) -> Result<String, LlmError> {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let since = previous.elapsed();
            if since < self.min_interval {
                tokio::time::sleep(self.min_interval - since).await;
            }
        }

        debug!("Calling {} for structured extraction", self.provider.name());
        let result = match tokio::time::timeout(self.timeout, self.provider.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Transport(format!(
                "no reply within {:.0}s",
                self.timeout.as_secs_f64()
            ))),
        };
        *last_call = Some(Instant::now());

        result
    }
}
