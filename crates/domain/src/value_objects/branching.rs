//! Branching state machine over the generation frontier.
//!
//! The frontier is a FIFO queue of [`FrontierItem`]s. Every item is turned into
//! one story chunk, and [`expand`] decides which items that chunk spawns:
//!
//! | state         | condition                  | children                                   |
//! |---------------|----------------------------|--------------------------------------------|
//! | `Branching`   | `used < max_opportunity`   | one `Branching` per choice, `used + 1`     |
//! | `Branching`   | `used >= max_opportunity`  | `ChapterEnd` (or `GameEnd` in last chapter)|
//! | `ChapterEnd`  | `chapter < num_chapters`   | `Branching` at `chapter + 1`, `used = 0`   |
//! | `ChapterEnd`  | last chapter               | none                                       |
//! | `GameEnd`     |                            | none                                       |

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::entities::StoryChoice;
use crate::ids::StoryChunkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchingState {
    Branching,
    ChapterEnd,
    GameEnd,
}

impl std::fmt::Display for BranchingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Branching => "BRANCHING",
            Self::ChapterEnd => "CHAPTER_END",
            Self::GameEnd => "GAME_END",
        };
        f.write_str(name)
    }
}

/// Which prompt a frontier item needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind<'a> {
    ChapterStart,
    Continuation(&'a StoryChoice),
    ChapterEnd,
    GameEnd,
}

/// A pending unit of generation work. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierItem {
    /// Id of the chunk this unit produces. Fixed at enqueue time, so running
    /// the unit again overwrites the same node and edge.
    pub chunk_id: StoryChunkId,
    pub current_chapter: u32,
    pub used_choice_opportunity: u32,
    /// `None` only for the first unit of the story
    pub parent_chunk: Option<StoryChunkId>,
    /// The option selected to reach this unit
    pub choice: Option<StoryChoice>,
    pub state: BranchingState,
}

impl FrontierItem {
    /// The first unit of every story: chapter 1, nothing used, no parent.
    pub fn initial(chunk_id: StoryChunkId) -> Self {
        Self {
            chunk_id,
            current_chapter: 1,
            used_choice_opportunity: 0,
            parent_chunk: None,
            choice: None,
            state: BranchingState::Branching,
        }
    }

    pub fn prompt_kind(&self) -> PromptKind<'_> {
        match (self.state, &self.choice) {
            (BranchingState::Branching, None) => PromptKind::ChapterStart,
            (BranchingState::Branching, Some(choice)) => PromptKind::Continuation(choice),
            (BranchingState::ChapterEnd, _) => PromptKind::ChapterEnd,
            (BranchingState::GameEnd, _) => PromptKind::GameEnd,
        }
    }

    /// Whether the chunk generated for this item must offer choices.
    pub fn expects_choices(&self, max_opportunity: u32) -> bool {
        self.state == BranchingState::Branching && self.used_choice_opportunity < max_opportunity
    }
}

/// Bounds the transition function needs from the generation config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchingLimits {
    pub max_opportunity: u32,
    pub num_chapters: u32,
}

/// Children of `item` once its chunk has been generated with `choices`.
///
/// Each child takes its own chunk id from `next_id`.
pub fn expand(
    item: &FrontierItem,
    choices: &[StoryChoice],
    limits: BranchingLimits,
    mut next_id: impl FnMut() -> StoryChunkId,
) -> Vec<FrontierItem> {
    let chunk_id = item.chunk_id;
    match item.state {
        BranchingState::Branching if item.used_choice_opportunity < limits.max_opportunity => {
            choices
                .iter()
                .map(|choice| FrontierItem {
                    chunk_id: next_id(),
                    current_chapter: item.current_chapter,
                    used_choice_opportunity: item.used_choice_opportunity + 1,
                    parent_chunk: Some(chunk_id),
                    choice: Some(choice.clone()),
                    state: BranchingState::Branching,
                })
                .collect()
        }
        BranchingState::Branching => {
            let state = if item.current_chapter < limits.num_chapters {
                BranchingState::ChapterEnd
            } else {
                BranchingState::GameEnd
            };
            vec![FrontierItem {
                chunk_id: next_id(),
                current_chapter: item.current_chapter,
                used_choice_opportunity: item.used_choice_opportunity,
                parent_chunk: Some(chunk_id),
                choice: None,
                state,
            }]
        }
        BranchingState::ChapterEnd if item.current_chapter < limits.num_chapters => {
            vec![FrontierItem {
                chunk_id: next_id(),
                current_chapter: item.current_chapter + 1,
                used_choice_opportunity: 0,
                parent_chunk: Some(chunk_id),
                choice: None,
                state: BranchingState::Branching,
            }]
        }
        BranchingState::ChapterEnd | BranchingState::GameEnd => Vec::new(),
    }
}

/// FIFO queue of pending units with value semantics.
///
/// Operations consume the frontier and return the next one, so a snapshot
/// taken of one frontier can never observe later changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frontier(VecDeque<FrontierItem>);

impl Frontier {
    pub fn new() -> Self {
        Self(VecDeque::new())
    }

    /// A frontier holding only [`FrontierItem::initial`].
    pub fn initial(chunk_id: StoryChunkId) -> Self {
        Self(VecDeque::from([FrontierItem::initial(chunk_id)]))
    }

    pub fn from_items(items: impl IntoIterator<Item = FrontierItem>) -> Self {
        Self(items.into_iter().collect())
    }

    /// The oldest item and the frontier without it.
    pub fn pop_front(mut self) -> Option<(FrontierItem, Frontier)> {
        let item = self.0.pop_front()?;
        Some((item, self))
    }

    /// The frontier with `items` appended in order.
    pub fn pushed(mut self, items: impl IntoIterator<Item = FrontierItem>) -> Self {
        self.0.extend(items);
        self
    }

    pub fn front(&self) -> Option<&FrontierItem> {
        self.0.front()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrontierItem> {
        self.0.iter()
    }
}
