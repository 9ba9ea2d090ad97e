//! Records exchanged with the run-file ports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyloom_domain::{ConversationHistory, StoryData, StoryId};

use super::external::TokenUsage;

/// Contents of `plot.json`: the model's raw answer and the plot parsed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotArtifact {
    pub raw: String,
    pub parsed: StoryData,
}

/// Why a model call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Generation,
    Repair,
}

/// One line of `calls.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub timestamp: DateTime<Utc>,
    pub story_id: StoryId,
    pub kind: CallKind,
    pub model: String,
    /// The history actually sent, after the rolling window
    pub history: ConversationHistory,
    pub response: String,
    pub usage: Option<TokenUsage>,
}

/// Token totals per model, rebuilt from a call log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub calls: u32,
    pub repairs: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageSummary {
    pub fn add(&mut self, record: &CallRecord) {
        self.calls += 1;
        if record.kind == CallKind::Repair {
            self.repairs += 1;
        }
        if let Some(usage) = record.usage {
            self.prompt_tokens += u64::from(usage.prompt_tokens);
            self.completion_tokens += u64::from(usage.completion_tokens);
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}
