//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - The story graph (Neo4j today)
//! - The run directory and call log (files today)
//! - LLM calls (any OpenAI-compatible provider)
//! - Image generation and background removal
//! - Clock/Random (for testing)

mod error;
mod external;
mod repos;
mod testing;
mod types;

// =============================================================================
// Persistence Ports
// =============================================================================
pub use repos::{CallLogPort, ContextSnapshotStore, StoryGraphRepo};
pub use types::{CallKind, CallRecord, PlotArtifact, UsageSummary};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    BackgroundRemovalPort, FinishReason, ImageGenPort, ImageRequest, ImageResult, ImageShape,
    LlmPort, LlmRequest, LlmResponse, TokenUsage,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::{MockBackgroundRemovalPort, MockImageGenPort, MockLlmPort};
#[cfg(test)]
pub use repos::{MockCallLogPort, MockContextSnapshotStore, MockStoryGraphRepo};
#[cfg(test)]
pub use testing::{MockClockPort, MockRandomPort};

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{ImageGenError, LlmError, RepoError, SnapshotError};
