//! Batch generation: many stories from one config, then each story again
//! from its own plot.

use std::sync::Arc;

use storyloom_domain::GenerationConfig;

use super::error::GenerationError;
use super::{GenerateStory, GenerationOutcome};
use crate::infrastructure::ports::ContextSnapshotStore;

/// Runs of one batch, in the order they were made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Stories with a freshly generated plot
    pub generated: Vec<GenerationOutcome>,
    /// One story per entry of `generated`, reusing that story's `plot.json`
    pub replayed: Vec<GenerationOutcome>,
}

pub struct BatchGenerate {
    generate: Arc<GenerateStory>,
    snapshots: Arc<dyn ContextSnapshotStore>,
}

impl BatchGenerate {
    pub fn new(generate: Arc<GenerateStory>, snapshots: Arc<dyn ContextSnapshotStore>) -> Self {
        Self {
            generate,
            snapshots,
        }
    }

    /// Generate `num_stories` stories, then replay each one over its plot.
    ///
    /// Stops at the first failed run. That run keeps its snapshot and can be
    /// resumed on its own.
    pub async fn execute(
        &self,
        config: GenerationConfig,
        num_stories: u32,
    ) -> Result<BatchSummary, GenerationError> {
        config.validate()?;
        let config = GenerationConfig {
            existing_plot: None,
            ..config
        };

        tracing::info!(num_stories, "Starting batch generation");
        let mut summary = BatchSummary::default();
        for index in 1..=num_stories {
            let outcome = self.generate.execute(config.clone()).await?;
            tracing::info!(
                index,
                num_stories,
                story_id = %outcome.story_id,
                chunks = outcome.chunks_generated,
                "Batch story generated"
            );
            summary.generated.push(outcome);
        }

        tracing::info!(num_stories, "Replaying batch stories over their plots");
        for original in &summary.generated {
            let replay_config = GenerationConfig {
                existing_plot: Some(self.snapshots.plot_path(original.story_id)),
                ..config.clone()
            };
            let outcome = self.generate.execute(replay_config).await?;
            tracing::info!(
                source_story_id = %original.story_id,
                story_id = %outcome.story_id,
                chunks = outcome.chunks_generated,
                "Batch story replayed"
            );
            summary.replayed.push(outcome);
        }

        tracing::info!(
            generated = summary.generated.len(),
            replayed = summary.replayed.len(),
            "Batch generation completed"
        );
        Ok(summary)
    }
}
