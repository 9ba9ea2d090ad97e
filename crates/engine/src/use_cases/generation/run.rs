//! A generation context that is written to the run directory after every change.

use std::sync::Arc;

use storyloom_domain::{ConversationHistory, Frontier, GenerationContext, StoryId};

use super::error::GenerationError;
use crate::infrastructure::ports::{ClockPort, ContextSnapshotStore};

/// Sole owner of a run's [`GenerationContext`] while it is being processed.
///
/// Each mutation is applied, then snapshotted before the caller can move on,
/// so the latest `context.json` always reflects every persisted chunk.
pub struct GenerationRun {
    context: GenerationContext,
    snapshots: Arc<dyn ContextSnapshotStore>,
    clock: Arc<dyn ClockPort>,
}

impl GenerationRun {
    /// Wrap `context` and write its first snapshot.
    pub async fn start(
        context: GenerationContext,
        snapshots: Arc<dyn ContextSnapshotStore>,
        clock: Arc<dyn ClockPort>,
    ) -> Result<Self, GenerationError> {
        snapshots.save_context(&context).await?;
        Ok(Self::resume(context, snapshots, clock))
    }

    /// Wrap a context loaded from its own snapshot.
    pub fn resume(
        context: GenerationContext,
        snapshots: Arc<dyn ContextSnapshotStore>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            context,
            snapshots,
            clock,
        }
    }

    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    pub fn story_id(&self) -> StoryId {
        self.context.story_id()
    }

    pub async fn set_initial_history(
        &mut self,
        history: ConversationHistory,
    ) -> Result<(), GenerationError> {
        self.context
            .set_initial_history(history, self.clock.now())?;
        self.snapshot().await
    }

    pub async fn set_frontier(&mut self, frontier: Frontier) -> Result<(), GenerationError> {
        self.context.set_frontier(frontier, self.clock.now())?;
        self.snapshot().await
    }

    pub async fn complete(&mut self) -> Result<(), GenerationError> {
        self.context.complete(self.clock.now())?;
        self.snapshot().await?;
        tracing::info!(story_id = %self.story_id(), "Generation run completed");
        Ok(())
    }

    pub fn into_context(self) -> GenerationContext {
        self.context
    }

    async fn snapshot(&self) -> Result<(), GenerationError> {
        self.snapshots.save_context(&self.context).await?;
        Ok(())
    }
}
