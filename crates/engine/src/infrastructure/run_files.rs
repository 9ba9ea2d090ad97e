//! Run directory on the local filesystem.
//!
//! Every run owns `<root>/<story_id>/` with:
//! - `context.json`: the latest [`GenerationContext`] snapshot
//! - `plot.json`: the plot artifact `{raw, parsed}`
//! - `calls.jsonl`: one [`CallRecord`] per successful model call

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use storyloom_domain::{GenerationContext, StoryId};
use tokio::io::AsyncWriteExt;

use crate::infrastructure::ports::{
    CallLogPort, CallRecord, ContextSnapshotStore, PlotArtifact, SnapshotError,
};

const CONTEXT_FILE: &str = "context.json";
const PLOT_FILE: &str = "plot.json";
const CALL_LOG_FILE: &str = "calls.jsonl";

fn run_dir(root: &Path, story_id: StoryId) -> PathBuf {
    root.join(story_id.to_string())
}

/// Write `value` as pretty JSON to `path` through a sibling temp file and a
/// rename, so a crash leaves either the old or the new file.
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let json =
        serde_json::to_vec_pretty(value).map_err(|e| SnapshotError::serialization(path, e))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SnapshotError::io(parent, e))?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| SnapshotError::io(&tmp, e))?;
    file.write_all(&json)
        .await
        .map_err(|e| SnapshotError::io(&tmp, e))?;
    file.sync_all()
        .await
        .map_err(|e| SnapshotError::io(&tmp, e))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| SnapshotError::io(path, e))
}

async fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SnapshotError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SnapshotError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| SnapshotError::serialization(path, e))
}

/// Context snapshots and plot artifacts under an output root.
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, story_id: StoryId) -> PathBuf {
        run_dir(&self.root, story_id)
    }
}

#[async_trait]
impl ContextSnapshotStore for FileSnapshotStore {
    async fn save_context(&self, context: &GenerationContext) -> Result<(), SnapshotError> {
        let path = self.run_dir(context.story_id()).join(CONTEXT_FILE);
        write_json_atomic(&path, context).await?;
        tracing::debug!(
            story_id = %context.story_id(),
            pending = context.frontier().len(),
            completed = context.is_completed(),
            "Saved generation context"
        );
        Ok(())
    }

    async fn load_context(
        &self,
        story_id: StoryId,
    ) -> Result<Option<GenerationContext>, SnapshotError> {
        read_json_if_exists(&self.run_dir(story_id).join(CONTEXT_FILE)).await
    }

    async fn save_plot(
        &self,
        story_id: StoryId,
        artifact: &PlotArtifact,
    ) -> Result<(), SnapshotError> {
        write_json_atomic(&self.plot_path(story_id), artifact).await
    }

    async fn load_plot(&self, story_id: StoryId) -> Result<Option<PlotArtifact>, SnapshotError> {
        read_json_if_exists(&self.plot_path(story_id)).await
    }

    fn plot_path(&self, story_id: StoryId) -> PathBuf {
        self.run_dir(story_id).join(PLOT_FILE)
    }

    async fn read_plot_file(&self, path: &Path) -> Result<PlotArtifact, SnapshotError> {
        read_json_if_exists(path)
            .await?
            .ok_or_else(|| SnapshotError::io(path, "plot file not found"))
    }
}

/// Append-only `calls.jsonl` per run.
pub struct FileCallLog {
    root: PathBuf,
}

impl FileCallLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, story_id: StoryId) -> PathBuf {
        run_dir(&self.root, story_id).join(CALL_LOG_FILE)
    }
}

#[async_trait]
impl CallLogPort for FileCallLog {
    async fn append(&self, record: &CallRecord) -> Result<(), SnapshotError> {
        let path = self.path(record.story_id);
        let mut line =
            serde_json::to_vec(record).map_err(|e| SnapshotError::serialization(&path, e))?;
        line.push(b'\n');

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SnapshotError::io(parent, e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| SnapshotError::io(&path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| SnapshotError::io(&path, e))?;
        file.flush().await.map_err(|e| SnapshotError::io(&path, e))
    }

    async fn read_all(&self, story_id: StoryId) -> Result<Vec<CallRecord>, SnapshotError> {
        let path = self.path(story_id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SnapshotError::io(&path, e)),
        };

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| SnapshotError::serialization(&path, e)))
            .collect()
    }
}
