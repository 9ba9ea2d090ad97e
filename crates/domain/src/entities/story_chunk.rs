//! StoryChunk entity - one generated narrative beat
//!
//! # Graph Relationships
//!
//! - `STARTED_AT` ← StoryData: the first chunk of the story
//! - `BRANCHED_TO` → StoryChunk: the successor reached by a choice (edge
//!   carries the selecting StoryChoice, or nothing for chapter transitions)

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{StoryChunkId, StoryId};
use crate::value_objects::ConversationHistory;

/// Speaker id used for narration lines.
pub const NARRATOR_SPEAKER_ID: i64 = -1;

fn narrator_id() -> i64 {
    NARRATOR_SPEAKER_ID
}

/// A single line of the narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryNarrative {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub speaker: String,
    /// Character id, or [`NARRATOR_SPEAKER_ID`]
    #[serde(default = "narrator_id")]
    pub speaker_id: i64,
    #[serde(default)]
    pub scene_title: String,
    #[serde(default)]
    pub scene_id: Option<u32>,
    pub text: String,
}

impl StoryNarrative {
    pub fn is_narration(&self) -> bool {
        self.speaker_id == NARRATOR_SPEAKER_ID
    }
}

/// A branch option offered to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryChoice {
    pub id: u32,
    pub choice: String,
    #[serde(default)]
    pub description: String,
}

/// A chunk exactly as the model is asked to return it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDraft {
    #[serde(default)]
    pub story_so_far: String,
    pub story: Vec<StoryNarrative>,
    #[serde(default)]
    pub choices: Vec<StoryChoice>,
}

impl ChunkDraft {
    /// Check the draft before it becomes a chunk.
    ///
    /// `min_choices` is set when the unit will branch; the chunk must then
    /// offer at least that many options.
    pub fn validate(&self, min_choices: Option<u32>) -> Result<(), DomainError> {
        if self.story.is_empty() {
            return Err(DomainError::validation("story must contain at least one line"));
        }
        if let Some(idx) = self.story.iter().position(|line| line.text.trim().is_empty()) {
            return Err(DomainError::validation(format!(
                "story[{}].text must not be empty",
                idx
            )));
        }

        if let Some(min) = min_choices {
            if self.choices.len() < min as usize {
                return Err(DomainError::validation(format!(
                    "expected at least {} choices but got {}",
                    min,
                    self.choices.len()
                )));
            }
            if let Some(idx) = self.choices.iter().position(|c| c.choice.trim().is_empty()) {
                return Err(DomainError::validation(format!(
                    "choices[{}].choice must not be empty",
                    idx
                )));
            }
        }

        Ok(())
    }
}

/// A persisted narrative beat. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryChunk {
    id: StoryChunkId,
    story_id: StoryId,
    chapter: u32,
    num_opportunities: u32,
    story_so_far: String,
    story: Vec<StoryNarrative>,
    choices: Vec<StoryChoice>,
    /// The conversation that produced this chunk, ending on its assistant turn
    history: ConversationHistory,
}

impl StoryChunk {
    /// Build a chunk from a validated draft. A chunk without its producing
    /// history cannot be continued, so an empty history is a structural fault.
    pub fn new(
        id: StoryChunkId,
        story_id: StoryId,
        chapter: u32,
        num_opportunities: u32,
        draft: ChunkDraft,
        history: ConversationHistory,
    ) -> Result<Self, DomainError> {
        if history.is_empty() {
            return Err(DomainError::structural(format!(
                "story chunk {} has an empty history snapshot",
                id
            )));
        }
        Ok(Self {
            id,
            story_id,
            chapter,
            num_opportunities,
            story_so_far: draft.story_so_far,
            story: draft.story,
            choices: draft.choices,
            history,
        })
    }

    pub fn id(&self) -> StoryChunkId {
        self.id
    }

    pub fn story_id(&self) -> StoryId {
        self.story_id
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn num_opportunities(&self) -> u32 {
        self.num_opportunities
    }

    pub fn story_so_far(&self) -> &str {
        &self.story_so_far
    }

    pub fn story(&self) -> &[StoryNarrative] {
        &self.story
    }

    pub fn choices(&self) -> &[StoryChoice] {
        &self.choices
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}
