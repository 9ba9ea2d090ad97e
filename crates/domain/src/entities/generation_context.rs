//! GenerationContext - the root record of one generation run
//!
//! Owns the configuration, the story id, the initial history and the pending
//! frontier. It is the only state a run needs to resume; the engine persists
//! a full snapshot after every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{StoryChunkId, StoryId};
use crate::value_objects::{ConversationHistory, Frontier, GenerationConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    config: GenerationConfig,
    story_id: StoryId,
    /// `[plot prompt, plot response]`, set once the plot exists
    initial_history: Option<ConversationHistory>,
    frontier: Frontier,
    is_completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl GenerationContext {
    /// Start a run with the initial frontier; the opening chunk id is fixed here.
    pub fn new(config: GenerationConfig, story_id: StoryId, now: DateTime<Utc>) -> Self {
        Self {
            config,
            story_id,
            initial_history: None,
            frontier: Frontier::initial(StoryChunkId::new()),
            is_completed: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn story_id(&self) -> StoryId {
        self.story_id
    }

    pub fn initial_history(&self) -> Option<&ConversationHistory> {
        self.initial_history.as_ref()
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn ensure_open(&self, operation: &str) -> Result<(), DomainError> {
        if self.is_completed {
            return Err(DomainError::invalid_state_transition(format!(
                "cannot {} on completed run {}",
                operation, self.story_id
            )));
        }
        Ok(())
    }

    pub fn set_initial_history(
        &mut self,
        history: ConversationHistory,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_open("set initial history")?;
        if history.is_empty() {
            return Err(DomainError::structural("initial history must not be empty"));
        }
        self.initial_history = Some(history);
        self.updated_at = now;
        Ok(())
    }

    pub fn set_frontier(&mut self, frontier: Frontier, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_open("set frontier")?;
        self.frontier = frontier;
        self.updated_at = now;
        Ok(())
    }

    /// Mark the run finished. Only valid once the frontier is drained.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_open("complete")?;
        if !self.frontier.is_empty() {
            return Err(DomainError::invalid_state_transition(format!(
                "cannot complete run {} with {} pending units",
                self.story_id,
                self.frontier.len()
            )));
        }
        self.is_completed = true;
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }
}
