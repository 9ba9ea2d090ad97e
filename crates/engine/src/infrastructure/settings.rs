//! Engine settings read from the environment.
//!
//! Connection settings fall back to local-development defaults. Generation
//! parameters come from `STORY_*` variables; a value that is present but does
//! not parse is an error rather than a silent default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use storyloom_domain::{GenerationConfig, TokenCounter};

use crate::infrastructure::image_gen::DEFAULT_IMAGE_MODEL;
use crate::infrastructure::openai_compat::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OPENAI_BASE_URL};
use crate::infrastructure::resilient_llm::{BackoffStrategy, RetryConfig};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Supported chat model providers; both speak the OpenAI chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => DEFAULT_OLLAMA_BASE_URL,
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "llama3.2",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_max_context_tokens(&self) -> usize {
        match self {
            Self::Ollama => 8192,
            Self::OpenAi => 128_000,
        }
    }

    pub fn token_counter(&self) -> TokenCounter {
        match self {
            Self::Ollama => TokenCounter::llama_tuned(),
            Self::OpenAi => TokenCounter::default(),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown provider '{}', expected ollama or openai", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_context_tokens: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
    /// Repair round-trips allowed per structured call
    pub max_repairs: u32,
}

impl LlmSettings {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay_ms: self.retry_delay_ms,
            strategy: if self.exponential_backoff {
                BackoffStrategy::Exponential
            } else {
                BackoffStrategy::Fixed
            },
            ..RetryConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub background_removal_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_max_retries: u32,
    pub neo4j_retry_delay_ms: u64,
    pub output_dir: PathBuf,
    pub llm: LlmSettings,
    pub images: ImageSettings,
    pub generation: GenerationConfig,
}

impl EngineSettings {
    /// Backoff for graph store calls; doubles from the base delay.
    pub fn graph_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.neo4j_max_retries,
            base_delay_ms: self.neo4j_retry_delay_ms,
            max_delay_ms: 10_000,
            strategy: BackoffStrategy::Exponential,
            ..RetryConfig::default()
        }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let provider: LlmProvider = env.parsed("LLM_PROVIDER", LlmProvider::Ollama)?;
        let llm = LlmSettings {
            provider,
            base_url: env.string("LLM_BASE_URL", provider.default_base_url()),
            model: env.string("LLM_MODEL", provider.default_model()),
            api_key: env.optional("LLM_API_KEY"),
            max_context_tokens: env.parsed(
                "LLM_MAX_CONTEXT_TOKENS",
                provider.default_max_context_tokens(),
            )?,
            timeout: Duration::from_secs(env.parsed("LLM_TIMEOUT_SECS", 300u64)?),
            max_retries: env.parsed("LLM_MAX_RETRIES", 3u32)?,
            retry_delay_ms: env.parsed("LLM_RETRY_DELAY_MS", 3000u64)?,
            exponential_backoff: env.flag("LLM_EXPONENTIAL_BACKOFF", false)?,
            max_repairs: env.parsed("LLM_MAX_REPAIRS", 3u32)?,
        };

        let images = ImageSettings {
            base_url: env.string("IMAGE_GEN_URL", DEFAULT_OPENAI_BASE_URL),
            model: env.string("IMAGE_GEN_MODEL", DEFAULT_IMAGE_MODEL),
            api_key: env.optional("IMAGE_GEN_API_KEY").or_else(|| llm.api_key.clone()),
            background_removal_url: env
                .string("BG_REMOVAL_URL", "http://localhost:7000/api/remove"),
        };

        let defaults = GenerationConfig::default();
        let themes = env
            .optional("STORY_THEMES")
            .map(|raw| raw.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        let generation = GenerationConfig {
            min_num_choices: env.parsed("STORY_MIN_CHOICES", defaults.min_num_choices)?,
            max_num_choices: env.parsed("STORY_MAX_CHOICES", defaults.max_num_choices)?,
            min_num_choices_opportunity: env
                .parsed("STORY_MIN_OPPORTUNITIES", defaults.min_num_choices_opportunity)?,
            max_num_choices_opportunity: env
                .parsed("STORY_MAX_OPPORTUNITIES", defaults.max_num_choices_opportunity)?,
            game_genre: env.string("STORY_GENRE", &defaults.game_genre),
            num_chapters: env.parsed("STORY_NUM_CHAPTERS", defaults.num_chapters)?,
            num_endings: env.parsed("STORY_NUM_ENDINGS", defaults.num_endings)?,
            num_main_characters: env
                .parsed("STORY_NUM_MAIN_CHARACTERS", defaults.num_main_characters)?,
            num_main_scenes: env.parsed("STORY_NUM_MAIN_SCENES", defaults.num_main_scenes)?,
            enable_image_generation: env.flag("STORY_ENABLE_IMAGES", false)?,
            existing_plot: env.optional("STORY_EXISTING_PLOT").map(PathBuf::from),
            ..defaults
        }
        .with_themes(themes);

        Ok(Self {
            neo4j_uri: env.string("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: env.string("NEO4J_USER", "neo4j"),
            neo4j_password: env.string("NEO4J_PASSWORD", "password"),
            neo4j_max_retries: env.parsed("NEO4J_MAX_RETRIES", 3u32)?,
            neo4j_retry_delay_ms: env.parsed("NEO4J_RETRY_DELAY_MS", 500u64)?,
            output_dir: PathBuf::from(env.string("OUTPUT_DIR", "outputs")),
            llm,
            images,
            generation,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, var: &'static str, default: T) -> Result<T, SettingsError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(var) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| SettingsError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn flag(&self, var: &'static str, default: bool) -> Result<bool, SettingsError> {
        match self.optional(var).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(value) => Err(SettingsError::Invalid {
                var,
                value,
                reason: "expected true or false".to_string(),
            }),
        }
    }
}
