//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::{
    clock::{SystemClock, SystemRandom},
    image_gen::{HttpBackgroundRemover, OpenAiImageClient},
    neo4j::Neo4jStoryGraphRepo,
    openai_compat::OpenAiCompatClient,
    ports::{
        BackgroundRemovalPort, CallLogPort, ClockPort, ContextSnapshotStore, ImageGenPort,
        LlmPort, RandomPort, StoryGraphRepo,
    },
    resilient_graph::ResilientStoryGraph,
    resilient_llm::ResilientLlmClient,
    run_files::{FileCallLog, FileSnapshotStore},
    settings::EngineSettings,
};
use crate::use_cases::generation::{
    BatchGenerate, GenerateStory, GenerationUseCases, InitializePlot, ProcessFrontier,
    ResumeStory, RunServices, StructuredGenerator,
};

/// Main application state.
///
/// Holds the adapters behind every port and the use cases built on them.
pub struct App {
    pub adapters: Adapters,
    pub use_cases: UseCases,
}

/// Port implementations, injected as trait objects.
pub struct Adapters {
    pub llm: Arc<dyn LlmPort>,
    pub image_gen: Arc<dyn ImageGenPort>,
    pub background_removal: Arc<dyn BackgroundRemovalPort>,
    pub graph: Arc<dyn StoryGraphRepo>,
    pub snapshots: Arc<dyn ContextSnapshotStore>,
    pub call_log: Arc<dyn CallLogPort>,
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
}

impl Adapters {
    /// Production adapters: the configured chat model and Neo4j, both behind
    /// transport retries, and the run directory on disk.
    pub fn from_settings(settings: &EngineSettings, graph: neo4rs::Graph) -> Self {
        let llm_settings = &settings.llm;
        let chat = OpenAiCompatClient::new(
            &llm_settings.base_url,
            &llm_settings.model,
            llm_settings.timeout,
        )
        .with_api_key(llm_settings.api_key.clone())
        .with_max_context_tokens(llm_settings.max_context_tokens)
        .with_token_counter(llm_settings.provider.token_counter());

        let retry_config = llm_settings.retry_config();
        tracing::info!(
            provider = ?llm_settings.provider,
            model = %llm_settings.model,
            max_retries = retry_config.max_retries,
            base_delay_ms = retry_config.base_delay_ms,
            "LLM client configured"
        );
        let llm = Arc::new(ResilientLlmClient::new(Arc::new(chat), retry_config));

        let images = &settings.images;
        Self {
            llm,
            image_gen: Arc::new(OpenAiImageClient::new(
                &images.base_url,
                &images.model,
                images.api_key.clone(),
            )),
            background_removal: Arc::new(HttpBackgroundRemover::new(
                &images.background_removal_url,
            )),
            graph: Arc::new(ResilientStoryGraph::new(
                Arc::new(Neo4jStoryGraphRepo::new(graph)),
                settings.graph_retry_config(),
            )),
            snapshots: Arc::new(FileSnapshotStore::new(&settings.output_dir)),
            call_log: Arc::new(FileCallLog::new(&settings.output_dir)),
            clock: Arc::new(SystemClock::new()),
            random: Arc::new(SystemRandom::new()),
        }
    }
}

/// Container for all use cases.
pub struct UseCases {
    pub generation: GenerationUseCases,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(adapters: Adapters, max_repairs: u32) -> Self {
        let generator = Arc::new(StructuredGenerator::new(
            adapters.llm.clone(),
            adapters.call_log.clone(),
            adapters.clock.clone(),
            max_repairs,
        ));

        let services = Arc::new(RunServices {
            snapshots: adapters.snapshots.clone(),
            call_log: adapters.call_log.clone(),
            clock: adapters.clock.clone(),
        });

        let initialize_plot = Arc::new(InitializePlot::new(
            generator.clone(),
            adapters.graph.clone(),
            adapters.snapshots.clone(),
            adapters.image_gen.clone(),
            adapters.background_removal.clone(),
        ));
        let process_frontier = Arc::new(ProcessFrontier::new(
            generator,
            adapters.graph.clone(),
            adapters.random.clone(),
        ));

        let generate = Arc::new(GenerateStory::new(
            services.clone(),
            adapters.random.clone(),
            initialize_plot.clone(),
            process_frontier.clone(),
        ));
        let generation = GenerationUseCases::new(
            generate.clone(),
            Arc::new(ResumeStory::new(services, initialize_plot, process_frontier)),
            Arc::new(BatchGenerate::new(generate, adapters.snapshots.clone())),
        );

        Self {
            adapters,
            use_cases: UseCases { generation },
        }
    }
}
