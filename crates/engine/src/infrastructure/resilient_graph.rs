//! Story graph wrapper with bounded retry
//!
//! Repeats a store call after a backoff when the driver reports a lost
//! connection or a transient server error. Every write is a merge keyed by
//! id, so a repeated write cannot duplicate nodes or edges.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use storyloom_domain::{StoryChoice, StoryChunk, StoryChunkId, StoryData, StoryId};

use crate::infrastructure::ports::{RepoError, StoryGraphRepo};
use crate::infrastructure::resilient_llm::RetryConfig;

pub struct ResilientStoryGraph {
    inner: Arc<dyn StoryGraphRepo>,
    config: RetryConfig,
}

impl ResilientStoryGraph {
    pub fn new(inner: Arc<dyn StoryGraphRepo>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, RepoError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, RepoError>> + Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            operation,
                            attempt = attempt + 1,
                            "Graph call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() || attempt >= self.config.max_retries => {
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    let delay = self.config.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay,
                        error = %e,
                        "Graph call failed, retrying..."
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}

#[async_trait]
impl StoryGraphRepo for ResilientStoryGraph {
    async fn save_story_data(&self, story: &StoryData) -> Result<(), RepoError> {
        self.with_retry("save_story_data", || self.inner.save_story_data(story))
            .await
    }

    async fn save_story_chunk(&self, chunk: &StoryChunk) -> Result<(), RepoError> {
        self.with_retry("save_story_chunk", || self.inner.save_story_chunk(chunk))
            .await
    }

    async fn link_start(&self, story_id: StoryId, chunk_id: StoryChunkId) -> Result<(), RepoError> {
        self.with_retry("link_start", || self.inner.link_start(story_id, chunk_id))
            .await
    }

    async fn link_branch(
        &self,
        parent: StoryChunkId,
        child: StoryChunkId,
        choice: Option<StoryChoice>,
    ) -> Result<(), RepoError> {
        self.with_retry("link_branch", || {
            self.inner.link_branch(parent, child, choice.clone())
        })
        .await
    }

    async fn get_story_chunk(&self, id: StoryChunkId) -> Result<Option<StoryChunk>, RepoError> {
        self.with_retry("get_story_chunk", || self.inner.get_story_chunk(id))
            .await
    }
}
