//! External service port traits (generative model, image generation).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyloom_domain::ConversationHistory;

use super::error::{ImageGenError, LlmError};

// =============================================================================
// LLM Types
// =============================================================================

/// A chat completion request over a full conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// The conversation, ending on the user turn to answer
    pub history: ConversationHistory,
    /// Temperature for response generation (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(history: ConversationHistory) -> Self {
        Self {
            history,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Response from the LLM
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    /// The generated text content
    pub content: String,
    /// Finish reason
    pub finish_reason: FinishReason,
    /// Token usage
    pub usage: Option<TokenUsage>,
}

/// Reason the generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    #[serde(other)]
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Generative model port.
///
/// Besides the call itself, a model exposes the tokenizer and the context
/// budget the rolling window works against.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Token cost of `text` for this model.
    fn count_tokens(&self, text: &str) -> usize;

    /// Maximum context length in tokens.
    fn max_context_tokens(&self) -> usize;

    /// Model identifier recorded on generated content and call logs.
    fn model_name(&self) -> String;
}

// =============================================================================
// Image Generation Types
// =============================================================================

/// Aspect of a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageShape {
    Square,
    Portrait,
    Landscape,
}

impl ImageShape {
    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Square => (1024, 1024),
            Self::Portrait => (1024, 1792),
            Self::Landscape => (1792, 1024),
        }
    }

    /// `WIDTHxHEIGHT`, the size format of the images API.
    pub fn size(&self) -> String {
        let (width, height) = self.dimensions();
        format!("{}x{}", width, height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub shape: ImageShape,
}

/// Base64-encoded PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResult {
    pub image_b64: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenPort: Send + Sync {
    async fn generate(&self, request: ImageRequest) -> Result<ImageResult, ImageGenError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackgroundRemovalPort: Send + Sync {
    /// Cut the subject out of a base64 PNG, returning a base64 PNG.
    async fn remove_background(&self, image_b64: String) -> Result<String, ImageGenError>;
}
