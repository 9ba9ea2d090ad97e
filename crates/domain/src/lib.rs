//! Storyloom domain: the story graph, the branching rules over the generation
//! frontier, and the conversation history sent to the generative model.
//!
//! Everything here is pure; I/O lives in `storyloom-engine`.

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{
    ChapterSynopsis, CharacterData, ChunkDraft, EndingData, GenerationContext, PlotDraft,
    SceneData, StoryChoice, StoryChunk, StoryData, StoryNarrative, NARRATOR_SPEAKER_ID,
};
pub use error::DomainError;
pub use ids::{StoryChunkId, StoryId};
pub use value_objects::{
    expand, BranchingLimits, BranchingState, ChatMessage, ConversationHistory, Frontier,
    FrontierItem, GenerationConfig, MessageRole, PromptKind, RolledHistory, RollingContextWindow,
    TokenCountMethod, TokenCounter, JSON_MAGIC_PHRASE,
};
