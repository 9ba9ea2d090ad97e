//! Value objects for the story generation domain

mod branching;
mod context_window;
mod conversation;
mod generation_config;
mod json_block;
mod token_counter;

pub use branching::{expand, BranchingLimits, BranchingState, Frontier, FrontierItem, PromptKind};
pub use context_window::{
    RolledHistory, RollingContextWindow, ANCHOR_MESSAGES, DEFAULT_TARGET_RATIO,
    DEFAULT_TRIGGER_RATIO,
};
pub use conversation::{ChatMessage, ConversationHistory, MessageRole};
pub use generation_config::GenerationConfig;
pub use json_block::{decode, extract_json_object, extract_json_text, JSON_MAGIC_PHRASE};
pub use token_counter::{TokenCountMethod, TokenCounter};
