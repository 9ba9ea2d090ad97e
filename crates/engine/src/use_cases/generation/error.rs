use storyloom_domain::{BranchingState, DomainError, StoryChunkId};

use crate::infrastructure::ports::{LlmError, RepoError, SnapshotError};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Run file error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Output still invalid after {attempts} repair attempts: {last_error}")]
    RepairExhausted { attempts: u32, last_error: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(
        "Unit failed (chapter {chapter}, opportunity {opportunity}, state {state}, parent {}): {source}",
        parent.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string())
    )]
    Unit {
        chapter: u32,
        opportunity: u32,
        state: BranchingState,
        parent: Option<StoryChunkId>,
        #[source]
        source: Box<GenerationError>,
    },
}

impl GenerationError {
    /// Configuration errors are reported before any model call is made.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Domain(DomainError::Config(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_error_names_position() {
        let err = GenerationError::Unit {
            chapter: 2,
            opportunity: 1,
            state: BranchingState::ChapterEnd,
            parent: None,
            source: Box::new(GenerationError::RepairExhausted {
                attempts: 3,
                last_error: "missing field `story`".into(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("chapter 2"));
        assert!(text.contains("state CHAPTER_END"));
        assert!(text.contains("parent none"));
        assert!(text.contains("after 3 repair attempts"));
    }

    #[test]
    fn config_errors_are_recognized() {
        assert!(GenerationError::from(DomainError::config("min > max")).is_config());
        assert!(!GenerationError::NotFound("x".into()).is_config());
    }
}
