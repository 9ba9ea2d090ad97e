//! Hand-written fakes for exercising the generation loop end to end.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use storyloom_domain::{
    GenerationConfig, GenerationContext, StoryChoice, StoryChunk, StoryChunkId, StoryData,
    StoryId,
};

use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::ports::{
    CallLogPort, CallRecord, ClockPort, ContextSnapshotStore, FinishReason, LlmError, LlmPort,
    LlmRequest, LlmResponse, PlotArtifact, RepoError, SnapshotError, StoryGraphRepo, TokenUsage,
};

pub(crate) fn fixed_clock() -> Arc<dyn ClockPort> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ))
}

/// A plot answer satisfying `config`, wrapped in a Markdown fence.
pub(crate) fn plot_json(config: &GenerationConfig) -> String {
    let characters: Vec<_> = (1..=config.num_main_characters)
        .map(|id| {
            serde_json::json!({
                "id": id,
                "first_name": format!("Hero{}", id),
                "last_name": "Vale",
                "species": "human",
                "age": 20 + id,
                "gender": "female",
                "role": "wanderer",
                "background": "grew up by the sea",
                "place_of_birth": "Port Vell",
                "physical_appearance": ["short hair", "green coat"]
            })
        })
        .collect();
    let scenes: Vec<_> = (1..=config.num_main_scenes)
        .map(|id| {
            serde_json::json!({
                "id": id,
                "title": format!("Scene {}", id),
                "location": "Port Vell",
                "description": "foggy docks"
            })
        })
        .collect();
    let chapters: Vec<_> = (1..=config.num_chapters)
        .map(|chapter| {
            serde_json::json!({
                "chapter": chapter,
                "synopsis": format!("Chapter {} events", chapter),
                "character_ids": [1],
                "scene_ids": [1]
            })
        })
        .collect();
    let endings: Vec<_> = (1..=config.num_endings)
        .map(|id| serde_json::json!({"id": id, "ending": format!("Ending {}", id)}))
        .collect();

    let plot = serde_json::json!({
        "title": "The Tide Clock",
        "genre": config.game_genre,
        "themes": config.themes,
        "main_scenes": scenes,
        "main_characters": characters,
        "synopsis": "The tides have stopped.",
        "chapter_synopses": chapters,
        "beginning": "Fog rolls in.",
        "endings": endings
    });
    format!("Here is the plot.\n```json\n{}\n```", plot)
}

/// A chunk answer, with `choices` options when set.
pub(crate) fn chunk_json(choices: Option<u32>) -> String {
    let mut chunk = serde_json::json!({
        "story_so_far": "Things happened.",
        "story": [
            {"id": 1, "speaker": "Narrator", "text": "The bell is silent."},
            {"id": 2, "speaker": "Hero1 Vale", "speaker_id": 1, "scene_id": 1, "text": "Someone stopped it."}
        ]
    });
    if let Some(n) = choices {
        chunk["choices"] = (1..=n)
            .map(|id| serde_json::json!({"id": id, "choice": format!("Option {}", id), "description": "a path"}))
            .collect();
    }
    format!("```json\n{}\n```", chunk)
}

/// The choice count a narrative prompt asks for, if any.
fn requested_choices(prompt: &str) -> Option<u32> {
    let rest = prompt.split("exactly ").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Model fake: scripted answers first, then a well-formed answer derived
/// from the prompt. A `None` script entry also takes the derived answer.
#[derive(Default)]
pub(crate) struct ScriptedLlm {
    script: Mutex<VecDeque<Option<Result<String, LlmError>>>>,
    requests: Mutex<Vec<LlmRequest>>,
    plot_config: Mutex<Option<GenerationConfig>>,
}

impl ScriptedLlm {
    pub fn for_config(config: &GenerationConfig) -> Self {
        let llm = Self::default();
        *llm.plot_config.lock().unwrap() = Some(config.clone());
        llm
    }

    pub fn push(&self, answer: Result<String, LlmError>) {
        self.script.lock().unwrap().push_back(Some(answer));
    }

    pub fn push_auto(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn auto_answer(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.contains("Write a game story synopsis") {
            return self
                .plot_config
                .lock()
                .unwrap()
                .as_ref()
                .map(plot_json)
                .ok_or_else(|| LlmError::InvalidResponse("no plot configured".into()));
        }
        Ok(chunk_json(requested_choices(prompt)))
    }
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());

        let scripted = self.script.lock().unwrap().pop_front().flatten();
        let content = match scripted {
            Some(answer) => answer?,
            None => {
                let prompt = request
                    .history
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                self.auto_answer(&prompt)?
            }
        };

        Ok(LlmResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: Some(TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
            }),
        })
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn max_context_tokens(&self) -> usize {
        100_000
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Branch {
    pub parent: StoryChunkId,
    pub child: StoryChunkId,
    pub choice: Option<StoryChoice>,
}

/// Story graph fake keeping insertion order. Writes merge by id like the
/// Neo4j store does.
#[derive(Default)]
pub(crate) struct InMemoryGraph {
    stories: Mutex<Vec<StoryData>>,
    chunks: Mutex<Vec<StoryChunk>>,
    starts: Mutex<Vec<(StoryId, StoryChunkId)>>,
    branches: Mutex<Vec<Branch>>,
    dropped_chunk_saves: Mutex<u32>,
}

impl InMemoryGraph {
    /// The next `n` chunk saves fail with a dropped connection.
    pub fn drop_chunk_saves(&self, n: u32) {
        *self.dropped_chunk_saves.lock().unwrap() = n;
    }

    pub fn stories(&self) -> Vec<StoryData> {
        self.stories.lock().unwrap().clone()
    }

    pub fn chunks(&self) -> Vec<StoryChunk> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn starts(&self) -> Vec<(StoryId, StoryChunkId)> {
        self.starts.lock().unwrap().clone()
    }

    pub fn branches(&self) -> Vec<Branch> {
        self.branches.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoryGraphRepo for InMemoryGraph {
    async fn save_story_data(&self, story: &StoryData) -> Result<(), RepoError> {
        let mut stories = self.stories.lock().unwrap();
        stories.retain(|s| s.id != story.id);
        stories.push(story.clone());
        Ok(())
    }

    async fn save_story_chunk(&self, chunk: &StoryChunk) -> Result<(), RepoError> {
        {
            let mut dropped = self.dropped_chunk_saves.lock().unwrap();
            if *dropped > 0 {
                *dropped -= 1;
                return Err(RepoError::connection("save_story_chunk", "connection reset"));
            }
        }
        let mut chunks = self.chunks.lock().unwrap();
        chunks.retain(|c| c.id() != chunk.id());
        chunks.push(chunk.clone());
        Ok(())
    }

    async fn link_start(&self, story_id: StoryId, chunk_id: StoryChunkId) -> Result<(), RepoError> {
        let mut starts = self.starts.lock().unwrap();
        if !starts.contains(&(story_id, chunk_id)) {
            starts.push((story_id, chunk_id));
        }
        Ok(())
    }

    async fn link_branch(
        &self,
        parent: StoryChunkId,
        child: StoryChunkId,
        choice: Option<StoryChoice>,
    ) -> Result<(), RepoError> {
        let mut branches = self.branches.lock().unwrap();
        match branches
            .iter_mut()
            .find(|b| b.parent == parent && b.child == child)
        {
            Some(existing) => existing.choice = choice,
            None => branches.push(Branch {
                parent,
                child,
                choice,
            }),
        }
        Ok(())
    }

    async fn get_story_chunk(&self, id: StoryChunkId) -> Result<Option<StoryChunk>, RepoError> {
        Ok(self
            .chunks
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id() == id)
            .cloned())
    }
}

/// Run-file fake; remembers every snapshot written.
#[derive(Default)]
pub(crate) struct InMemorySnapshots {
    contexts: Mutex<Vec<GenerationContext>>,
    plots: Mutex<HashMap<StoryId, PlotArtifact>>,
    files: Mutex<HashMap<PathBuf, PlotArtifact>>,
    context_saves: Mutex<usize>,
    failing_save: Mutex<Option<usize>>,
}

impl InMemorySnapshots {
    /// Fail the `nth` context save (1-based) without writing it.
    pub fn fail_context_save(&self, nth: usize) {
        *self.failing_save.lock().unwrap() = Some(nth);
    }

    pub fn history(&self) -> Vec<GenerationContext> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Option<GenerationContext> {
        self.contexts.lock().unwrap().last().cloned()
    }

    pub fn plot(&self, story_id: StoryId) -> Option<PlotArtifact> {
        self.plots.lock().unwrap().get(&story_id).cloned()
    }

    pub fn put_file(&self, path: impl Into<PathBuf>, artifact: PlotArtifact) {
        self.files.lock().unwrap().insert(path.into(), artifact);
    }
}

#[async_trait]
impl ContextSnapshotStore for InMemorySnapshots {
    async fn save_context(&self, context: &GenerationContext) -> Result<(), SnapshotError> {
        let mut saves = self.context_saves.lock().unwrap();
        *saves += 1;
        if *self.failing_save.lock().unwrap() == Some(*saves) {
            return Err(SnapshotError::io("context.json", "disk full"));
        }
        self.contexts.lock().unwrap().push(context.clone());
        Ok(())
    }

    async fn load_context(
        &self,
        story_id: StoryId,
    ) -> Result<Option<GenerationContext>, SnapshotError> {
        Ok(self
            .contexts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.story_id() == story_id)
            .cloned())
    }

    async fn save_plot(
        &self,
        story_id: StoryId,
        artifact: &PlotArtifact,
    ) -> Result<(), SnapshotError> {
        self.plots.lock().unwrap().insert(story_id, artifact.clone());
        Ok(())
    }

    async fn load_plot(&self, story_id: StoryId) -> Result<Option<PlotArtifact>, SnapshotError> {
        Ok(self.plot(story_id))
    }

    fn plot_path(&self, story_id: StoryId) -> PathBuf {
        Path::new(&story_id.to_string()).join("plot.json")
    }

    async fn read_plot_file(&self, path: &Path) -> Result<PlotArtifact, SnapshotError> {
        if let Some(artifact) = self.files.lock().unwrap().get(path).cloned() {
            return Ok(artifact);
        }
        self.plots
            .lock()
            .unwrap()
            .iter()
            .find(|(story_id, _)| self.plot_path(**story_id) == path)
            .map(|(_, artifact)| artifact.clone())
            .ok_or_else(|| SnapshotError::io(path, "plot file not found"))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryCallLog {
    records: Mutex<Vec<CallRecord>>,
}

impl InMemoryCallLog {
    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallLogPort for InMemoryCallLog {
    async fn append(&self, record: &CallRecord) -> Result<(), SnapshotError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn read_all(&self, story_id: StoryId) -> Result<Vec<CallRecord>, SnapshotError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.story_id == story_id)
            .collect())
    }
}
