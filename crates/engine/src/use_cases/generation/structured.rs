//! Structured model calls: rolling window, call logging and the repair loop.
//!
//! Transport faults are retried inside the [`LlmPort`] (see
//! `ResilientLlmClient`); this layer only deals with answers that arrived but
//! cannot be used. A repair call that times out is retried by the client, not
//! counted as a repair attempt.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use storyloom_domain::value_objects::{decode, extract_json_object};
use storyloom_domain::{ConversationHistory, DomainError, RollingContextWindow, StoryId};

use super::error::GenerationError;
use super::prompts;
use crate::infrastructure::ports::{
    CallKind, CallLogPort, CallRecord, ClockPort, FinishReason, LlmPort, LlmRequest,
};

/// A parsed answer together with the text it was parsed from.
#[derive(Debug, Clone)]
pub struct StructuredOutput<T> {
    pub raw: String,
    pub value: T,
}

pub struct StructuredGenerator {
    llm: Arc<dyn LlmPort>,
    call_log: Arc<dyn CallLogPort>,
    clock: Arc<dyn ClockPort>,
    max_repairs: u32,
}

impl StructuredGenerator {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        call_log: Arc<dyn CallLogPort>,
        clock: Arc<dyn ClockPort>,
        max_repairs: u32,
    ) -> Self {
        Self {
            llm,
            call_log,
            clock,
            max_repairs,
        }
    }

    pub fn model_name(&self) -> String {
        self.llm.model_name()
    }

    /// Answer the last user turn of `history` with a `T` that passes `validate`.
    ///
    /// Malformed or under-delivering answers get up to `max_repairs` repair
    /// round-trips. Structural problems with `history` fail immediately.
    pub async fn generate<T, V>(
        &self,
        story_id: StoryId,
        history: &ConversationHistory,
        validate: V,
    ) -> Result<StructuredOutput<T>, GenerationError>
    where
        T: DeserializeOwned + Send,
        V: Fn(&T) -> Result<(), DomainError> + Send + Sync,
    {
        let window = RollingContextWindow::new(self.llm.max_context_tokens());
        let rolled = window.apply(history, |text| self.llm.count_tokens(text))?;
        if rolled.was_trimmed() {
            tracing::debug!(
                story_id = %story_id,
                tokens_before = rolled.tokens_before,
                tokens_after = rolled.tokens_after,
                messages = rolled.history.len(),
                "Trimmed conversation history to fit context window"
            );
        }

        let mut raw = self
            .call(story_id, CallKind::Generation, rolled.history)
            .await?;
        let mut repairs = 0;

        loop {
            let error = match Self::parse(&raw, &validate) {
                Ok(value) => return Ok(StructuredOutput { raw, value }),
                Err(e) => e,
            };

            if !error.is_repairable() {
                return Err(error.into());
            }
            if repairs >= self.max_repairs {
                return Err(GenerationError::RepairExhausted {
                    attempts: repairs,
                    last_error: error.to_string(),
                });
            }

            repairs += 1;
            tracing::warn!(
                story_id = %story_id,
                attempt = repairs,
                max_repairs = self.max_repairs,
                error = %error,
                "Model output rejected, requesting repair"
            );

            let repair = prompts::repair_history(&error.to_string(), &raw);
            raw = self.call(story_id, CallKind::Repair, repair).await?;
        }
    }

    fn parse<T, V>(raw: &str, validate: &V) -> Result<T, DomainError>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> Result<(), DomainError>,
    {
        let value: T = decode(extract_json_object(raw)?)?;
        validate(&value)?;
        Ok(value)
    }

    async fn call(
        &self,
        story_id: StoryId,
        kind: CallKind,
        history: ConversationHistory,
    ) -> Result<String, GenerationError> {
        let response = self.llm.generate(LlmRequest::new(history.clone())).await?;

        if response.finish_reason == FinishReason::Length {
            tracing::warn!(
                story_id = %story_id,
                kind = ?kind,
                "Model stopped at the token limit; output may be truncated"
            );
        }

        let record = CallRecord {
            timestamp: self.clock.now(),
            story_id,
            kind,
            model: self.llm.model_name(),
            history,
            response: response.content.clone(),
            usage: response.usage,
        };
        self.call_log.append(&record).await?;

        Ok(response.content)
    }
}
