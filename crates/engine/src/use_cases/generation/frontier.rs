//! The frontier loop: one story chunk per pending unit, breadth first.

use std::collections::HashMap;
use std::sync::Arc;

use storyloom_domain::{
    expand, BranchingLimits, ChunkDraft, ConversationHistory, DomainError, FrontierItem,
    GenerationConfig, StoryChunk, StoryChunkId, StoryData, StoryId,
};

use super::error::GenerationError;
use super::prompts;
use super::run::GenerationRun;
use super::structured::StructuredGenerator;
use crate::infrastructure::ports::{RandomPort, StoryGraphRepo};

/// Outcome of draining a frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierSummary {
    pub chunks_generated: u32,
}

/// Everything one unit needs that does not change during a run.
struct UnitInputs<'a> {
    story_id: StoryId,
    config: &'a GenerationConfig,
    story: &'a StoryData,
    initial_history: &'a ConversationHistory,
}

pub struct ProcessFrontier {
    generator: Arc<StructuredGenerator>,
    graph: Arc<dyn StoryGraphRepo>,
    random: Arc<dyn RandomPort>,
}

impl ProcessFrontier {
    pub fn new(
        generator: Arc<StructuredGenerator>,
        graph: Arc<dyn StoryGraphRepo>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            generator,
            graph,
            random,
        }
    }

    /// Process units in FIFO order until the frontier is empty, then mark
    /// the run completed.
    ///
    /// The first unit that cannot be generated stops the run; the snapshot
    /// still holds that unit, so a resume retries it under the same chunk id.
    pub async fn execute(
        &self,
        run: &mut GenerationRun,
        story: &StoryData,
    ) -> Result<FrontierSummary, GenerationError> {
        let config = run.context().config().clone();
        let initial_history = run
            .context()
            .initial_history()
            .cloned()
            .ok_or_else(|| DomainError::structural("frontier processing requires an initial history"))?;
        let inputs = UnitInputs {
            story_id: run.story_id(),
            config: &config,
            story,
            initial_history: &initial_history,
        };
        let limits = BranchingLimits {
            max_opportunity: config.max_num_choices_opportunity,
            num_chapters: config.num_chapters,
        };

        // Chunks that still have pending children; anything else is in the graph.
        let mut parents: HashMap<StoryChunkId, StoryChunk> = HashMap::new();
        let mut chunks_generated = 0;

        loop {
            let Some((item, rest)) = run.context().frontier().clone().pop_front() else {
                break;
            };
            let chunk = match self.process_unit(&inputs, &item, &mut parents).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!(
                        story_id = %inputs.story_id,
                        chapter = item.current_chapter,
                        opportunity = item.used_choice_opportunity,
                        state = %item.state,
                        parent = ?item.parent_chunk,
                        choice_id = ?item.choice.as_ref().map(|c| c.id),
                        error = %e,
                        "Frontier unit failed, stopping run"
                    );
                    return Err(GenerationError::Unit {
                        chapter: item.current_chapter,
                        opportunity: item.used_choice_opportunity,
                        state: item.state,
                        parent: item.parent_chunk,
                        source: Box::new(e),
                    });
                }
            };

            let children = expand(&item, chunk.choices(), limits, || {
                StoryChunkId::from_uuid(self.random.gen_uuid())
            });
            let num_children = children.len();
            let next = rest.pushed(children);

            if let Some(parent) = item.parent_chunk {
                if !next.iter().any(|pending| pending.parent_chunk == Some(parent)) {
                    parents.remove(&parent);
                }
            }

            tracing::info!(
                story_id = %inputs.story_id,
                chunk_id = %chunk.id(),
                chapter = item.current_chapter,
                opportunity = item.used_choice_opportunity,
                state = %item.state,
                children = num_children,
                pending = next.len(),
                "Generated story chunk"
            );

            if num_children > 0 {
                parents.insert(chunk.id(), chunk);
            }
            run.set_frontier(next).await?;
            chunks_generated += 1;
        }

        run.complete().await?;
        Ok(FrontierSummary { chunks_generated })
    }

    async fn process_unit(
        &self,
        inputs: &UnitInputs<'_>,
        item: &FrontierItem,
        parents: &mut HashMap<StoryChunkId, StoryChunk>,
    ) -> Result<StoryChunk, GenerationError> {
        let config = inputs.config;
        let branching = item.expects_choices(config.max_num_choices_opportunity);
        let num_choices =
            branching.then(|| self.random.gen_range(config.min_num_choices, config.max_num_choices));

        let base = match item.parent_chunk {
            None => inputs.initial_history.clone(),
            Some(parent_id) => self.parent(parent_id, parents).await?.history().clone(),
        };
        let history = base.with_user(prompts::narrative_prompt(
            config,
            inputs.story,
            item,
            num_choices,
        ));

        let min_choices = branching.then_some(config.min_num_choices);
        let output = self
            .generator
            .generate(inputs.story_id, &history, |draft: &ChunkDraft| {
                draft.validate(min_choices)
            })
            .await?;

        let mut draft = output.value;
        match num_choices {
            Some(requested) if draft.choices.len() != requested as usize => {
                tracing::warn!(
                    story_id = %inputs.story_id,
                    requested,
                    received = draft.choices.len(),
                    "Model returned a different number of choices than requested"
                );
            }
            None if !draft.choices.is_empty() => {
                tracing::debug!(
                    received = draft.choices.len(),
                    "Dropping choices from a non-branching unit"
                );
                draft.choices.clear();
            }
            _ => {}
        }

        let chunk = StoryChunk::new(
            item.chunk_id,
            inputs.story_id,
            item.current_chapter,
            item.used_choice_opportunity,
            draft,
            history.with_assistant(output.raw),
        )?;

        self.graph.save_story_chunk(&chunk).await?;
        match item.parent_chunk {
            None => self.graph.link_start(inputs.story_id, chunk.id()).await?,
            Some(parent) => {
                self.graph
                    .link_branch(parent, chunk.id(), item.choice.clone())
                    .await?
            }
        }

        Ok(chunk)
    }

    /// A parent from this run, or from the graph when resuming.
    async fn parent<'a>(
        &self,
        id: StoryChunkId,
        parents: &'a mut HashMap<StoryChunkId, StoryChunk>,
    ) -> Result<&'a StoryChunk, GenerationError> {
        if !parents.contains_key(&id) {
            let chunk = self.graph.get_story_chunk(id).await?.ok_or_else(|| {
                DomainError::structural(format!("parent chunk {} is not in the story graph", id))
            })?;
            tracing::debug!(chunk_id = %id, "Rehydrated parent chunk from story graph");
            parents.insert(id, chunk);
        }
        parents
            .get(&id)
            .ok_or_else(|| GenerationError::NotFound(format!("parent chunk {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{CallKind, LlmError, LlmPort};
    use crate::infrastructure::resilient_llm::{ResilientLlmClient, RetryConfig};
    use crate::infrastructure::clock::FixedRandom;
    use crate::use_cases::generation::test_support::{
        chunk_json, fixed_clock, plot_json, InMemoryCallLog, InMemoryGraph, InMemorySnapshots,
        ScriptedLlm,
    };
    use storyloom_domain::value_objects::extract_json_text;
    use storyloom_domain::{BranchingState, GenerationContext, PlotDraft};

    fn one_chapter() -> GenerationConfig {
        GenerationConfig {
            num_chapters: 1,
            num_endings: 1,
            min_num_choices: 2,
            max_num_choices: 2,
            min_num_choices_opportunity: 1,
            max_num_choices_opportunity: 1,
            ..GenerationConfig::default()
        }
    }

    struct Harness {
        llm: Arc<ScriptedLlm>,
        graph: Arc<InMemoryGraph>,
        snapshots: Arc<InMemorySnapshots>,
        log: Arc<InMemoryCallLog>,
        story: StoryData,
        config: GenerationConfig,
    }

    impl Harness {
        fn new(config: GenerationConfig) -> Self {
            let draft: PlotDraft =
                serde_json::from_str(extract_json_text(&plot_json(&config)).unwrap()).unwrap();
            Self {
                llm: Arc::new(ScriptedLlm::for_config(&config)),
                graph: Arc::new(InMemoryGraph::default()),
                snapshots: Arc::new(InMemorySnapshots::default()),
                log: Arc::new(InMemoryCallLog::default()),
                story: StoryData::from_draft(StoryId::new(), "scripted", draft),
                config,
            }
        }

        fn use_case(&self, llm: Arc<dyn LlmPort>) -> ProcessFrontier {
            let generator = Arc::new(StructuredGenerator::new(
                llm,
                self.log.clone(),
                fixed_clock(),
                2,
            ));
            ProcessFrontier::new(generator, self.graph.clone(), Arc::new(FixedRandom(2)))
        }

        async fn run(&self) -> GenerationRun {
            let clock = fixed_clock();
            let context = GenerationContext::new(self.config.clone(), self.story.id, clock.now());
            let mut run = GenerationRun::start(context, self.snapshots.clone(), clock)
                .await
                .unwrap();
            run.set_initial_history(
                ConversationHistory::new()
                    .with_user("plot prompt")
                    .with_assistant(plot_json(&self.config)),
            )
            .await
            .unwrap();
            run
        }
    }

    #[tokio::test]
    async fn single_chapter_run_branches_once_then_ends() {
        let h = Harness::new(one_chapter());
        let mut run = h.run().await;

        let summary = h
            .use_case(h.llm.clone())
            .execute(&mut run, &h.story)
            .await
            .unwrap();

        assert_eq!(summary.chunks_generated, 5);
        assert!(run.context().is_completed());
        assert!(h.snapshots.latest().unwrap().is_completed());

        let chunks = h.graph.chunks();
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].choices().len(), 2);
        assert!(chunks[1..].iter().all(|c| c.choices().is_empty()));

        let starts = h.graph.starts();
        assert_eq!(starts, vec![(h.story.id, chunks[0].id())]);

        // FIFO: both continuations before either game ending.
        let branches = h.graph.branches();
        assert_eq!(branches.len(), 4);
        assert_eq!(branches[0].parent, chunks[0].id());
        assert_eq!(branches[1].parent, chunks[0].id());
        assert_eq!(branches[0].choice.as_ref().unwrap().id, 1);
        assert_eq!(branches[1].choice.as_ref().unwrap().id, 2);
        assert_eq!(branches[2].parent, chunks[1].id());
        assert_eq!(branches[3].parent, chunks[2].id());
        assert!(branches[2].choice.is_none());

        let prompts: Vec<String> = h
            .llm
            .requests()
            .iter()
            .map(|r| r.history.last().unwrap().content.clone())
            .collect();
        assert!(prompts[3].contains("end of the game"));
        assert!(prompts[4].contains("end of the game"));
    }

    #[tokio::test]
    async fn chunk_history_extends_parent_history() {
        let h = Harness::new(one_chapter());
        let mut run = h.run().await;

        h.use_case(h.llm.clone())
            .execute(&mut run, &h.story)
            .await
            .unwrap();

        let chunks = h.graph.chunks();
        let root = chunks[0].history();
        assert_eq!(root.len(), 4);
        let child = chunks[1].history();
        assert_eq!(child.len(), 6);
        assert_eq!(&child.messages()[..4], root.messages());
        assert!(child.messages()[4].content.contains("# The selected choice\nOption 1"));
    }

    #[tokio::test]
    async fn two_timeouts_then_success_persists_one_chunk() {
        let h = Harness::new(one_chapter());
        h.llm.push(Err(LlmError::Timeout("slow".into())));
        h.llm.push(Err(LlmError::Timeout("slow".into())));
        let resilient = Arc::new(ResilientLlmClient::new(
            h.llm.clone(),
            RetryConfig {
                max_retries: 3,
                base_delay_ms: 0,
                max_delay_ms: 0,
                ..RetryConfig::default()
            },
        ));
        let mut run = h.run().await;

        h.use_case(resilient).execute(&mut run, &h.story).await.unwrap();

        // Three attempts for the first unit, one for each of the other four.
        assert_eq!(h.llm.requests().len(), 7);
        assert_eq!(h.graph.chunks().len(), 5);
        assert_eq!(h.graph.starts().len(), 1);
        assert_eq!(h.log.records().len(), 5);
    }

    #[tokio::test]
    async fn repaired_unit_logs_one_repair() {
        let h = Harness::new(one_chapter());
        h.llm.push(Ok("```json\n{\"story\": []}\n```".to_string()));
        h.llm.push(Ok(chunk_json(Some(2))));
        let mut run = h.run().await;

        h.use_case(h.llm.clone())
            .execute(&mut run, &h.story)
            .await
            .unwrap();

        let repairs = h
            .log
            .records()
            .iter()
            .filter(|r| r.kind == CallKind::Repair)
            .count();
        assert_eq!(repairs, 1);
        assert_eq!(h.graph.chunks().len(), 5);
        assert_eq!(h.graph.starts().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_unit_stops_run_and_keeps_it_pending() {
        let h = Harness::new(one_chapter());
        for _ in 0..3 {
            h.llm.push(Ok("I cannot do that.".to_string()));
        }
        let mut run = h.run().await;

        let err = h
            .use_case(h.llm.clone())
            .execute(&mut run, &h.story)
            .await
            .unwrap_err();

        match err {
            GenerationError::Unit {
                chapter,
                state,
                parent,
                source,
                ..
            } => {
                assert_eq!(chapter, 1);
                assert_eq!(state, BranchingState::Branching);
                assert_eq!(parent, None);
                assert!(matches!(*source, GenerationError::RepairExhausted { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.graph.chunks().is_empty());
        assert!(!run.context().is_completed());
        assert_eq!(run.context().frontier().len(), 1);
    }

    #[tokio::test]
    async fn missing_parent_is_structural() {
        let h = Harness::new(one_chapter());
        let mut run = h.run().await;
        let orphan = FrontierItem {
            chunk_id: StoryChunkId::new(),
            current_chapter: 1,
            used_choice_opportunity: 1,
            parent_chunk: Some(StoryChunkId::new()),
            choice: None,
            state: BranchingState::GameEnd,
        };
        run.set_frontier(storyloom_domain::Frontier::from_items([orphan]))
            .await
            .unwrap();

        let err = h
            .use_case(h.llm.clone())
            .execute(&mut run, &h.story)
            .await
            .unwrap_err();

        let GenerationError::Unit { source, .. } = err else {
            panic!("expected unit error");
        };
        assert!(matches!(
            *source,
            GenerationError::Domain(DomainError::Structural(_))
        ));
        assert!(h.llm.requests().is_empty());
    }
}
