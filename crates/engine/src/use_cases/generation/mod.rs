//! Story generation use cases.
//!
//! A run starts from a [`GenerationConfig`], generates the plot, then walks
//! the branching frontier until every branch has reached the end of the game:
//!
//! 1. [`InitializePlot`] -> `StoryData` in the graph, `plot.json`, initial history
//! 2. [`ProcessFrontier`] -> one `StoryChunk` per frontier unit, FIFO
//!
//! The run's [`GenerationContext`] is snapshotted after every step, so an
//! interrupted run can be picked up again with [`ResumeStory`].
//! [`BatchGenerate`] chains many runs from one config.

mod batch;
mod error;
mod frontier;
mod plot;
pub mod prompts;
mod run;
mod structured;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use storyloom_domain::{GenerationConfig, GenerationContext, StoryData, StoryId};

pub use batch::{BatchGenerate, BatchSummary};
pub use error::GenerationError;
pub use frontier::{FrontierSummary, ProcessFrontier};
pub use plot::InitializePlot;
pub use run::GenerationRun;
pub use structured::{StructuredGenerator, StructuredOutput};

use crate::infrastructure::ports::{
    CallLogPort, ClockPort, ContextSnapshotStore, RandomPort, UsageSummary,
};

/// Container for generation use cases.
pub struct GenerationUseCases {
    pub generate: Arc<GenerateStory>,
    pub resume: Arc<ResumeStory>,
    pub batch: Arc<BatchGenerate>,
}

impl GenerationUseCases {
    pub fn new(
        generate: Arc<GenerateStory>,
        resume: Arc<ResumeStory>,
        batch: Arc<BatchGenerate>,
    ) -> Self {
        Self {
            generate,
            resume,
            batch,
        }
    }
}

/// What a finished (or already finished) run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub story_id: StoryId,
    /// Chunks generated by this invocation
    pub chunks_generated: u32,
    /// Model usage over the whole run, rebuilt from its call log
    pub usage: UsageSummary,
}

/// Collaborators shared by both entry points.
pub struct RunServices {
    pub snapshots: Arc<dyn ContextSnapshotStore>,
    pub call_log: Arc<dyn CallLogPort>,
    pub clock: Arc<dyn ClockPort>,
}

impl RunServices {
    async fn outcome(
        &self,
        story_id: StoryId,
        chunks_generated: u32,
    ) -> Result<GenerationOutcome, GenerationError> {
        let mut usage = UsageSummary::default();
        for record in self.call_log.read_all(story_id).await? {
            usage.add(&record);
        }
        Ok(GenerationOutcome {
            story_id,
            chunks_generated,
            usage,
        })
    }
}

/// Start a new run.
pub struct GenerateStory {
    services: Arc<RunServices>,
    random: Arc<dyn RandomPort>,
    initialize_plot: Arc<InitializePlot>,
    process_frontier: Arc<ProcessFrontier>,
}

impl GenerateStory {
    pub fn new(
        services: Arc<RunServices>,
        random: Arc<dyn RandomPort>,
        initialize_plot: Arc<InitializePlot>,
        process_frontier: Arc<ProcessFrontier>,
    ) -> Self {
        Self {
            services,
            random,
            initialize_plot,
            process_frontier,
        }
    }

    pub async fn execute(
        &self,
        config: GenerationConfig,
    ) -> Result<GenerationOutcome, GenerationError> {
        config.validate()?;

        let story_id = StoryId::from_uuid(self.random.gen_uuid());
        tracing::info!(
            story_id = %story_id,
            genre = %config.game_genre,
            chapters = config.num_chapters,
            endings = config.num_endings,
            "Starting generation run"
        );

        let context = GenerationContext::new(config, story_id, self.services.clock.now());
        let mut run = GenerationRun::start(
            context,
            self.services.snapshots.clone(),
            self.services.clock.clone(),
        )
        .await?;

        let story = self.initialize_plot.execute(&mut run).await?;
        let summary = self.process_frontier.execute(&mut run, &story).await?;

        self.services
            .outcome(story_id, summary.chunks_generated)
            .await
    }
}

/// Continue a run from its last snapshot.
pub struct ResumeStory {
    services: Arc<RunServices>,
    initialize_plot: Arc<InitializePlot>,
    process_frontier: Arc<ProcessFrontier>,
}

impl ResumeStory {
    pub fn new(
        services: Arc<RunServices>,
        initialize_plot: Arc<InitializePlot>,
        process_frontier: Arc<ProcessFrontier>,
    ) -> Self {
        Self {
            services,
            initialize_plot,
            process_frontier,
        }
    }

    pub async fn execute(&self, story_id: StoryId) -> Result<GenerationOutcome, GenerationError> {
        let context = self
            .services
            .snapshots
            .load_context(story_id)
            .await?
            .ok_or_else(|| GenerationError::NotFound(format!("generation context for {}", story_id)))?;

        if context.is_completed() {
            tracing::info!(story_id = %story_id, "Run already completed, nothing to resume");
            return self.services.outcome(story_id, 0).await;
        }
        context.config().validate()?;

        tracing::info!(
            story_id = %story_id,
            pending = context.frontier().len(),
            has_plot = context.initial_history().is_some(),
            "Resuming generation run"
        );

        let mut run = GenerationRun::resume(
            context,
            self.services.snapshots.clone(),
            self.services.clock.clone(),
        );

        let story = match run.context().initial_history() {
            None => self.initialize_plot.execute(&mut run).await?,
            Some(_) => self.load_story(story_id).await?,
        };
        let summary = self.process_frontier.execute(&mut run, &story).await?;

        self.services
            .outcome(story_id, summary.chunks_generated)
            .await
    }

    async fn load_story(&self, story_id: StoryId) -> Result<StoryData, GenerationError> {
        self.services
            .snapshots
            .load_plot(story_id)
            .await?
            .map(|artifact| artifact.parsed)
            .ok_or_else(|| GenerationError::NotFound(format!("plot for {}", story_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedRandom;
    use crate::infrastructure::ports::{
        LlmError, MockBackgroundRemovalPort, MockImageGenPort, StoryGraphRepo,
    };
    use crate::infrastructure::resilient_graph::ResilientStoryGraph;
    use crate::infrastructure::resilient_llm::RetryConfig;
    use super::test_support::{
        fixed_clock, InMemoryCallLog, InMemoryGraph, InMemorySnapshots, ScriptedLlm,
    };

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
    }

    impl Harness {
        fn new(config: &GenerationConfig) -> Self {
            Self {
                llm: Arc::new(ScriptedLlm::for_config(config)),
                graph: Arc::new(InMemoryGraph::default()),
                snapshots: Arc::new(InMemorySnapshots::default()),
                log: Arc::new(InMemoryCallLog::default()),
            }
        }

        /// Fresh use cases over the same fakes, as after a process restart.
        fn use_cases(&self) -> GenerationUseCases {
            self.use_cases_with_graph(self.graph.clone())
        }

        fn use_cases_with_graph(&self, graph: Arc<dyn StoryGraphRepo>) -> GenerationUseCases {
            let clock = fixed_clock();
            let random = Arc::new(FixedRandom(2));
            let generator = Arc::new(StructuredGenerator::new(
                self.llm.clone(),
                self.log.clone(),
                clock.clone(),
                2,
            ));
            let services = Arc::new(RunServices {
                snapshots: self.snapshots.clone(),
                call_log: self.log.clone(),
                clock,
            });
            let initialize_plot = Arc::new(InitializePlot::new(
                generator.clone(),
                graph.clone(),
                self.snapshots.clone(),
                Arc::new(MockImageGenPort::new()),
                Arc::new(MockBackgroundRemovalPort::new()),
            ));
            let process_frontier =
                Arc::new(ProcessFrontier::new(generator, graph, random.clone()));
            let generate = Arc::new(GenerateStory::new(
                services.clone(),
                random,
                initialize_plot.clone(),
                process_frontier.clone(),
            ));
            GenerationUseCases::new(
                generate.clone(),
                Arc::new(ResumeStory::new(services, initialize_plot, process_frontier)),
                Arc::new(BatchGenerate::new(generate, self.snapshots.clone())),
            )
        }
    }

    #[tokio::test]
    async fn full_run_completes_and_reports_usage() {
        let config = one_chapter();
        let h = Harness::new(&config);

        let outcome = h.use_cases().generate.execute(config).await.unwrap();

        assert_eq!(outcome.chunks_generated, 5);
        assert_eq!(outcome.usage.calls, 6);
        assert_eq!(outcome.usage.repairs, 0);
        assert_eq!(outcome.usage.total_tokens(), 6 * 150);

        let latest = h.snapshots.latest().unwrap();
        assert_eq!(latest.story_id(), outcome.story_id);
        assert!(latest.is_completed());
        assert!(latest.completed_at().is_some());
        assert_eq!(h.graph.stories().len(), 1);
        assert_eq!(h.graph.chunks().len(), 5);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_call() {
        let config = GenerationConfig {
            min_num_choices: 4,
            max_num_choices: 2,
            ..GenerationConfig::default()
        };
        let h = Harness::new(&config);

        let err = h.use_cases().generate.execute(config).await.unwrap_err();

        assert!(err.is_config());
        assert!(h.llm.requests().is_empty());
        assert!(h.snapshots.history().is_empty());
    }

    #[tokio::test]
    async fn resume_of_completed_run_is_a_noop() {
        let config = one_chapter();
        let h = Harness::new(&config);
        let use_cases = h.use_cases();
        let first = use_cases.generate.execute(config).await.unwrap();
        let calls = h.llm.requests().len();
        let snapshots = h.snapshots.history().len();

        let outcome = use_cases.resume.execute(first.story_id).await.unwrap();

        assert_eq!(outcome.chunks_generated, 0);
        assert_eq!(h.llm.requests().len(), calls);
        assert_eq!(h.snapshots.history().len(), snapshots);
    }

    #[tokio::test]
    async fn resume_continues_from_snapshot_and_rehydrates_parent() {
        let config = one_chapter();
        let h = Harness::new(&config);
        h.llm.push_auto(); // plot
        h.llm.push_auto(); // first chunk
        h.llm
            .push(Err(LlmError::RequestFailed("invalid api key".into())));

        let err = h.use_cases().generate.execute(config).await.unwrap_err();
        assert!(matches!(err, GenerationError::Unit { .. }));

        let interrupted = h.snapshots.latest().unwrap();
        assert!(!interrupted.is_completed());
        assert_eq!(interrupted.frontier().len(), 2);
        let root = h.graph.chunks()[0].id();

        let outcome = h
            .use_cases()
            .resume
            .execute(interrupted.story_id())
            .await
            .unwrap();

        assert_eq!(outcome.chunks_generated, 4);
        assert!(h.snapshots.latest().unwrap().is_completed());
        assert_eq!(h.graph.chunks().len(), 5);

        let resumed_from_root = h
            .graph
            .branches()
            .into_iter()
            .filter(|b| b.parent == root)
            .count();
        assert_eq!(resumed_from_root, 2);
        assert_eq!(h.graph.stories().len(), 1);
    }

    #[tokio::test]
    async fn dropped_graph_connection_is_retried() {
        let config = one_chapter();
        let h = Harness::new(&config);
        h.graph.drop_chunk_saves(1);
        let graph = Arc::new(ResilientStoryGraph::new(
            h.graph.clone(),
            RetryConfig {
                max_retries: 3,
                base_delay_ms: 0,
                max_delay_ms: 0,
                ..RetryConfig::default()
            },
        ));

        let outcome = h
            .use_cases_with_graph(graph)
            .generate
            .execute(config)
            .await
            .unwrap();

        assert_eq!(outcome.chunks_generated, 5);
        assert_eq!(outcome.usage.calls, 6);
        assert_eq!(h.graph.chunks().len(), 5);
        assert!(h.snapshots.latest().unwrap().is_completed());
    }

    #[tokio::test]
    async fn crash_before_frontier_snapshot_does_not_duplicate_chunks() {
        let config = one_chapter();
        let h = Harness::new(&config);
        // 1: start, 2: initial history, 3: frontier after the opening chunk
        h.snapshots.fail_context_save(3);

        let err = h.use_cases().generate.execute(config).await.unwrap_err();
        assert!(matches!(err, GenerationError::Snapshot(_)));
        assert_eq!(h.graph.chunks().len(), 1);
        let interrupted = h.snapshots.latest().unwrap();
        let opening = interrupted.frontier().front().unwrap().chunk_id;
        assert_eq!(h.graph.chunks()[0].id(), opening);

        let outcome = h
            .use_cases()
            .resume
            .execute(interrupted.story_id())
            .await
            .unwrap();

        assert_eq!(outcome.chunks_generated, 5);
        assert_eq!(h.graph.chunks().len(), 5);
        assert_eq!(h.graph.starts(), vec![(interrupted.story_id(), opening)]);
        assert_eq!(h.graph.branches().len(), 4);
        assert!(h.snapshots.latest().unwrap().is_completed());
    }

    #[tokio::test]
    async fn resume_rejects_corrupted_config() {
        let config = GenerationConfig {
            min_num_choices: 4,
            max_num_choices: 2,
            ..one_chapter()
        };
        let h = Harness::new(&config);
        let context = GenerationContext::new(config, StoryId::new(), fixed_clock().now());
        h.snapshots.save_context(&context).await.unwrap();

        let err = h
            .use_cases()
            .resume
            .execute(context.story_id())
            .await
            .unwrap_err();

        assert!(err.is_config());
        assert!(h.llm.requests().is_empty());
    }

    #[tokio::test]
    async fn resume_without_plot_initializes_it() {
        let config = one_chapter();
        let h = Harness::new(&config);
        let context = GenerationContext::new(config, StoryId::new(), fixed_clock().now());
        h.snapshots.save_context(&context).await.unwrap();

        let outcome = h
            .use_cases()
            .resume
            .execute(context.story_id())
            .await
            .unwrap();

        assert_eq!(outcome.chunks_generated, 5);
        assert!(h.snapshots.plot(context.story_id()).is_some());
        assert_eq!(h.graph.stories()[0].id, context.story_id());
    }

    #[tokio::test]
    async fn batch_replays_each_story_over_its_plot() {
        let config = one_chapter();
        let h = Harness::new(&config);

        let summary = h.use_cases().batch.execute(config, 2).await.unwrap();

        assert_eq!(summary.generated.len(), 2);
        assert_eq!(summary.replayed.len(), 2);
        let plot_calls = h
            .llm
            .requests()
            .iter()
            .filter(|r| {
                r.history
                    .last()
                    .is_some_and(|m| m.content.contains("Write a game story synopsis"))
            })
            .count();
        assert_eq!(plot_calls, 2);

        for (original, replay) in summary.generated.iter().zip(&summary.replayed) {
            assert_ne!(original.story_id, replay.story_id);
            assert_eq!(replay.chunks_generated, 5);
            let original_plot = h.snapshots.plot(original.story_id).unwrap();
            let replay_plot = h.snapshots.plot(replay.story_id).unwrap();
            assert_eq!(replay_plot.raw, original_plot.raw);
            assert_eq!(replay_plot.parsed.title, original_plot.parsed.title);
        }
        assert_eq!(h.graph.stories().len(), 4);
    }

    #[tokio::test]
    async fn batch_rejects_invalid_config() {
        let config = GenerationConfig {
            num_chapters: 0,
            ..one_chapter()
        };
        let h = Harness::new(&config);

        let err = h.use_cases().batch.execute(config, 3).await.unwrap_err();

        assert!(err.is_config());
        assert!(h.llm.requests().is_empty());
    }

    #[tokio::test]
    async fn resume_of_unknown_run_is_not_found() {
        let h = Harness::new(&one_chapter());
        let err = h
            .use_cases()
            .resume
            .execute(StoryId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotFound(_)));
    }
}
