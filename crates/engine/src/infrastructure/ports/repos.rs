//! Persistence port traits: the story graph and the run directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use storyloom_domain::{
    GenerationContext, StoryChoice, StoryChunk, StoryChunkId, StoryData, StoryId,
};

use super::error::{RepoError, SnapshotError};
use super::types::{CallRecord, PlotArtifact};

/// Durable store of the generated story graph.
///
/// Every write is a create-or-merge keyed by id, so re-delivering the same
/// node or edge leaves the graph unchanged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryGraphRepo: Send + Sync {
    /// Store the plot root together with its characters, scenes and endings.
    async fn save_story_data(&self, story: &StoryData) -> Result<(), RepoError>;

    async fn save_story_chunk(&self, chunk: &StoryChunk) -> Result<(), RepoError>;

    /// `(StoryData)-[:STARTED_AT]->(StoryChunk)`
    async fn link_start(&self, story_id: StoryId, chunk_id: StoryChunkId)
        -> Result<(), RepoError>;

    /// `(parent)-[:BRANCHED_TO]->(child)` carrying the selecting choice, if any.
    async fn link_branch(
        &self,
        parent: StoryChunkId,
        child: StoryChunkId,
        choice: Option<StoryChoice>,
    ) -> Result<(), RepoError>;

    async fn get_story_chunk(&self, id: StoryChunkId) -> Result<Option<StoryChunk>, RepoError>;
}

/// The run directory: context snapshots and the plot artifact.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextSnapshotStore: Send + Sync {
    /// Replace the snapshot atomically; a reader sees the old or the new one.
    async fn save_context(&self, context: &GenerationContext) -> Result<(), SnapshotError>;

    async fn load_context(
        &self,
        story_id: StoryId,
    ) -> Result<Option<GenerationContext>, SnapshotError>;

    async fn save_plot(
        &self,
        story_id: StoryId,
        artifact: &PlotArtifact,
    ) -> Result<(), SnapshotError>;

    async fn load_plot(&self, story_id: StoryId) -> Result<Option<PlotArtifact>, SnapshotError>;

    /// Where [`save_plot`](Self::save_plot) puts the plot of `story_id`.
    fn plot_path(&self, story_id: StoryId) -> PathBuf;

    /// Read a `plot.json` from anywhere, e.g. an earlier run.
    async fn read_plot_file(&self, path: &Path) -> Result<PlotArtifact, SnapshotError>;
}

/// Append-only audit log of model calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallLogPort: Send + Sync {
    async fn append(&self, record: &CallRecord) -> Result<(), SnapshotError>;

    async fn read_all(&self, story_id: StoryId) -> Result<Vec<CallRecord>, SnapshotError>;
}
