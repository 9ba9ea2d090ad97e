//! Storyloom Engine - Main entry point.
//!
//! ```text
//! storyloom-engine [generate]
//! storyloom-engine resume <story-id>
//! storyloom-engine batch <num-stories>
//! ```

use anyhow::{bail, Context};
use storyloom_domain::StoryId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyloom_engine::app::{Adapters, App};
use storyloom_engine::infrastructure::{neo4j::ensure_schema, settings::EngineSettings};
use storyloom_engine::use_cases::generation::GenerationOutcome;

enum Command {
    Generate,
    Resume(StoryId),
    Batch(u32),
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    match args {
        [] => Ok(Command::Generate),
        [cmd] if cmd == "generate" => Ok(Command::Generate),
        [cmd, id] if cmd == "resume" => {
            let story_id = id
                .parse::<StoryId>()
                .with_context(|| format!("'{}' is not a story id", id))?;
            Ok(Command::Resume(story_id))
        }
        [cmd, n] if cmd == "batch" => match n.parse::<u32>() {
            Ok(num_stories) if num_stories > 0 => Ok(Command::Batch(num_stories)),
            _ => bail!("'{}' is not a positive number of stories", n),
        },
        _ => bail!("usage: storyloom-engine [generate | resume <story-id> | batch <num-stories>]"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may be run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyloom_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    // Load configuration; a bad generation config never reaches the model
    let settings = EngineSettings::from_env()?;
    match command {
        Command::Generate => {
            settings.generation.validate()?;
            if let Some(path) = &settings.generation.existing_plot {
                if !path.exists() {
                    bail!("existing plot {} does not exist", path.display());
                }
            }
        }
        Command::Batch(_) => settings.generation.validate()?,
        Command::Resume(_) => {}
    }

    tracing::info!(
        output_dir = %settings.output_dir.display(),
        "Starting Storyloom Engine"
    );

    // Connect to Neo4j
    tracing::info!("Connecting to Neo4j at {}", settings.neo4j_uri);
    let graph = neo4rs::Graph::new(
        &settings.neo4j_uri,
        &settings.neo4j_user,
        &settings.neo4j_password,
    )
    .await?;

    // Ensure database schema (constraints and indexes)
    ensure_schema(&graph).await?;

    let app = App::new(
        Adapters::from_settings(&settings, graph),
        settings.llm.max_repairs,
    );

    let generation = &app.use_cases.generation;
    let outcomes = match command {
        Command::Generate => generation
            .generate
            .execute(settings.generation.clone())
            .await
            .map(|outcome| vec![outcome]),
        Command::Resume(story_id) => generation
            .resume
            .execute(story_id)
            .await
            .map(|outcome| vec![outcome]),
        Command::Batch(num_stories) => generation
            .batch
            .execute(settings.generation.clone(), num_stories)
            .await
            .map(|summary| summary.generated.into_iter().chain(summary.replayed).collect()),
    };

    match outcomes {
        Ok(outcomes) => {
            outcomes.iter().for_each(report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Generation run failed");
            Err(e.into())
        }
    }
}

fn report(outcome: &GenerationOutcome) {
    tracing::info!(
        story_id = %outcome.story_id,
        chunks = outcome.chunks_generated,
        calls = outcome.usage.calls,
        repairs = outcome.usage.repairs,
        prompt_tokens = outcome.usage.prompt_tokens,
        completion_tokens = outcome.usage.completion_tokens,
        total_tokens = outcome.usage.total_tokens(),
        "Generation run finished"
    );
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
