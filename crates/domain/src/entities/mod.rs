//! Domain entities

mod generation_context;
mod story_chunk;
mod story_data;

pub use generation_context::GenerationContext;
pub use story_chunk::{ChunkDraft, StoryChoice, StoryChunk, StoryNarrative, NARRATOR_SPEAKER_ID};
pub use story_data::{
    ChapterSynopsis, CharacterData, EndingData, PlotDraft, SceneData, StoryData,
};
