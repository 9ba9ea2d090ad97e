//! Plot initialization: the first exchange of every story.

use std::sync::Arc;

use storyloom_domain::{ConversationHistory, DomainError, PlotDraft, StoryData};

use super::error::GenerationError;
use super::prompts;
use super::run::GenerationRun;
use super::structured::StructuredGenerator;
use crate::infrastructure::ports::{
    BackgroundRemovalPort, ContextSnapshotStore, ImageGenPort, ImageRequest, ImageShape,
    PlotArtifact, StoryGraphRepo,
};

/// Generate (or load) the plot, persist it, and seed the run's initial history.
pub struct InitializePlot {
    generator: Arc<StructuredGenerator>,
    graph: Arc<dyn StoryGraphRepo>,
    snapshots: Arc<dyn ContextSnapshotStore>,
    image_gen: Arc<dyn ImageGenPort>,
    background_removal: Arc<dyn BackgroundRemovalPort>,
}

impl InitializePlot {
    pub fn new(
        generator: Arc<StructuredGenerator>,
        graph: Arc<dyn StoryGraphRepo>,
        snapshots: Arc<dyn ContextSnapshotStore>,
        image_gen: Arc<dyn ImageGenPort>,
        background_removal: Arc<dyn BackgroundRemovalPort>,
    ) -> Self {
        Self {
            generator,
            graph,
            snapshots,
            image_gen,
            background_removal,
        }
    }

    pub async fn execute(&self, run: &mut GenerationRun) -> Result<StoryData, GenerationError> {
        let config = run.context().config().clone();
        let story_id = run.story_id();
        let prompt = prompts::plot_prompt(&config);

        let (raw, mut story) = match &config.existing_plot {
            Some(path) => {
                let artifact = self.snapshots.read_plot_file(path).await?;
                let draft = artifact.parsed.to_draft();
                draft.validate_against(&config)?;
                tracing::info!(
                    story_id = %story_id,
                    path = %path.display(),
                    title = %draft.title,
                    "Loaded existing plot"
                );

                let raw = if artifact.raw.trim().is_empty() {
                    serde_json::to_string_pretty(&draft)
                        .map_err(|e| DomainError::parse(format!("existing plot: {}", e)))?
                } else {
                    artifact.raw
                };
                let story = StoryData::from_draft(story_id, artifact.parsed.generated_by, draft);
                (raw, story)
            }
            None => {
                let history = ConversationHistory::new().with_user(prompt.clone());
                let output = self
                    .generator
                    .generate(story_id, &history, |draft: &PlotDraft| {
                        draft.validate_against(&config)
                    })
                    .await?;
                let story =
                    StoryData::from_draft(story_id, self.generator.model_name(), output.value);
                tracing::info!(
                    story_id = %story_id,
                    title = %story.title,
                    chapters = story.chapter_synopses.len(),
                    "Generated plot"
                );
                (output.raw, story)
            }
        };

        if config.enable_image_generation {
            self.generate_images(&mut story).await;
        }

        self.graph.save_story_data(&story).await?;
        self.snapshots
            .save_plot(
                story_id,
                &PlotArtifact {
                    raw: raw.clone(),
                    parsed: story.clone(),
                },
            )
            .await?;

        run.set_initial_history(ConversationHistory::new().with_user(prompt).with_assistant(raw))
            .await?;

        Ok(story)
    }

    /// Best effort: a failed image leaves the field empty.
    async fn generate_images(&self, story: &mut StoryData) {
        for character in story.main_characters.iter_mut().filter(|c| c.image.is_none()) {
            let request = ImageRequest {
                prompt: prompts::character_image_prompt(character),
                shape: ImageShape::Portrait,
            };
            let original = match self.image_gen.generate(request).await {
                Ok(result) => result.image_b64,
                Err(e) => {
                    tracing::warn!(character_id = character.id, error = %e, "Character image generation failed");
                    continue;
                }
            };

            match self.background_removal.remove_background(original.clone()).await {
                Ok(cutout) => character.image = Some(cutout),
                Err(e) => {
                    tracing::warn!(character_id = character.id, error = %e, "Background removal failed");
                    character.image = Some(original.clone());
                }
            }
            character.original_image = Some(original);
        }

        for scene in story.main_scenes.iter_mut().filter(|s| s.image.is_none()) {
            let request = ImageRequest {
                prompt: prompts::scene_image_prompt(scene),
                shape: ImageShape::Landscape,
            };
            match self.image_gen.generate(request).await {
                Ok(result) => scene.image = Some(result.image_b64),
                Err(e) => {
                    tracing::warn!(scene_id = scene.id, error = %e, "Scene image generation failed")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        ImageGenError, ImageResult, MockBackgroundRemovalPort, MockImageGenPort,
    };
    use crate::use_cases::generation::test_support::{
        fixed_clock, plot_json, InMemoryCallLog, InMemoryGraph, InMemorySnapshots, ScriptedLlm,
    };
    use storyloom_domain::{GenerationConfig, GenerationContext, MessageRole, StoryId};

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

        fn use_case(
            &self,
            image_gen: MockImageGenPort,
            background_removal: MockBackgroundRemovalPort,
        ) -> InitializePlot {
            let generator = Arc::new(StructuredGenerator::new(
                self.llm.clone(),
                self.log.clone(),
                fixed_clock(),
                2,
            ));
            InitializePlot::new(
                generator,
                self.graph.clone(),
                self.snapshots.clone(),
                Arc::new(image_gen),
                Arc::new(background_removal),
            )
        }

        async fn run(&self, config: GenerationConfig) -> GenerationRun {
            let clock = fixed_clock();
            let context = GenerationContext::new(config, StoryId::new(), clock.now());
            GenerationRun::start(context, self.snapshots.clone(), clock)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn generated_plot_seeds_initial_history() {
        let config = GenerationConfig::default();
        let h = Harness::new(&config);
        let mut run = h.run(config.clone()).await;

        let story = h
            .use_case(MockImageGenPort::new(), MockBackgroundRemovalPort::new())
            .execute(&mut run)
            .await
            .unwrap();

        assert_eq!(story.id, run.story_id());
        assert_eq!(story.generated_by, "scripted");
        assert_eq!(story.endings.len(), 3);
        assert_eq!(h.graph.stories(), vec![story.clone()]);

        let plot = h.snapshots.plot(run.story_id()).unwrap();
        assert_eq!(plot.raw, plot_json(&config));

        let initial = run.context().initial_history().unwrap();
        assert_eq!(initial.len(), 2);
        assert_eq!(initial.messages()[0].role, MessageRole::User);
        assert_eq!(initial.messages()[1].content, plot.raw);
        assert!(h.snapshots.latest().unwrap().initial_history().is_some());
    }

    #[tokio::test]
    async fn under_delivering_plot_is_repaired() {
        let config = GenerationConfig::default();
        let h = Harness::new(&config);
        let short = GenerationConfig {
            num_endings: 1,
            ..config.clone()
        };
        h.llm.push(Ok(plot_json(&short)));
        let mut run = h.run(config).await;

        let story = h
            .use_case(MockImageGenPort::new(), MockBackgroundRemovalPort::new())
            .execute(&mut run)
            .await
            .unwrap();

        assert_eq!(story.endings.len(), 3);
        assert_eq!(h.log.records().len(), 2);
    }

    #[tokio::test]
    async fn existing_plot_skips_the_model() {
        let config = GenerationConfig::default();
        let h = Harness::new(&config);
        let draft: PlotDraft = serde_json::from_str(
            storyloom_domain::value_objects::extract_json_text(&plot_json(&config)).unwrap(),
        )
        .unwrap();
        let old = StoryData::from_draft(StoryId::new(), "gpt-4o-mini", draft);
        h.snapshots.put_file(
            "old/plot.json",
            PlotArtifact {
                raw: "raw plot".into(),
                parsed: old.clone(),
            },
        );
        let mut run = h
            .run(GenerationConfig {
                existing_plot: Some("old/plot.json".into()),
                ..config
            })
            .await;

        let story = h
            .use_case(MockImageGenPort::new(), MockBackgroundRemovalPort::new())
            .execute(&mut run)
            .await
            .unwrap();

        assert!(h.llm.requests().is_empty());
        assert_eq!(story.id, run.story_id());
        assert_ne!(story.id, old.id);
        assert_eq!(story.generated_by, "gpt-4o-mini");
        assert_eq!(story.title, old.title);
        assert_eq!(
            run.context().initial_history().unwrap().messages()[1].content,
            "raw plot"
        );
    }

    #[tokio::test]
    async fn existing_plot_without_raw_text_uses_serialized_plot() {
        let config = GenerationConfig::default();
        let h = Harness::new(&config);
        let draft: PlotDraft = serde_json::from_str(
            storyloom_domain::value_objects::extract_json_text(&plot_json(&config)).unwrap(),
        )
        .unwrap();
        h.snapshots.put_file(
            "old/plot.json",
            PlotArtifact {
                raw: "  ".into(),
                parsed: StoryData::from_draft(StoryId::new(), "gpt-4o-mini", draft),
            },
        );
        let mut run = h
            .run(GenerationConfig {
                existing_plot: Some("old/plot.json".into()),
                ..config
            })
            .await;

        let story = h
            .use_case(MockImageGenPort::new(), MockBackgroundRemovalPort::new())
            .execute(&mut run)
            .await
            .unwrap();

        let raw = &run.context().initial_history().unwrap().messages()[1].content;
        let reparsed: PlotDraft = serde_json::from_str(raw).unwrap();
        assert_eq!(reparsed.title, story.title);
        assert_eq!(h.snapshots.plot(run.story_id()).unwrap().raw, *raw);
    }

    #[tokio::test]
    async fn image_failures_leave_fields_empty() {
        let config = GenerationConfig {
            num_main_characters: 2,
            num_main_scenes: 1,
            enable_image_generation: true,
            ..GenerationConfig::default()
        };
        let h = Harness::new(&config);
        let mut run = h.run(config).await;

        let mut image_gen = MockImageGenPort::new();
        image_gen
            .expect_generate()
            .withf(|r| r.shape == ImageShape::Portrait)
            .times(2)
            .returning(|_| {
                Ok(ImageResult {
                    image_b64: "cG9ydHJhaXQ=".into(),
                })
            });
        image_gen
            .expect_generate()
            .withf(|r| r.shape == ImageShape::Landscape)
            .times(1)
            .returning(|_| Err(ImageGenError::Unavailable));
        let mut background_removal = MockBackgroundRemovalPort::new();
        background_removal
            .expect_remove_background()
            .times(2)
            .returning(|_| Ok("Y3V0b3V0".into()));

        let story = h
            .use_case(image_gen, background_removal)
            .execute(&mut run)
            .await
            .unwrap();

        for character in &story.main_characters {
            assert_eq!(character.image.as_deref(), Some("Y3V0b3V0"));
            assert_eq!(character.original_image.as_deref(), Some("cG9ydHJhaXQ="));
        }
        assert_eq!(story.main_scenes[0].image, None);
        assert_eq!(h.graph.stories().len(), 1);
    }
}
