//! Rolling context window for the generative model.
//!
//! Keeps a [`ConversationHistory`] under a model's token budget without
//! breaking turn-taking. The first [`ANCHOR_MESSAGES`] messages (the plot
//! exchange and the first chunk exchange) are always kept; they anchor every
//! later prompt. Below them, the most recent turns are kept as a contiguous
//! suffix that always ends on the pending user turn.
//!
//! Trimming only starts once the history exceeds `trigger_ratio` of the budget
//! and then shrinks it towards `target_ratio`, so a trimmed history has room
//! to grow for a while before it is trimmed again.

use crate::error::DomainError;
use crate::value_objects::conversation::{ConversationHistory, MessageRole};

/// Number of leading messages that are never dropped.
pub const ANCHOR_MESSAGES: usize = 4;

pub const DEFAULT_TRIGGER_RATIO: f64 = 0.8;
pub const DEFAULT_TARGET_RATIO: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingContextWindow {
    max_tokens: usize,
    trigger_ratio: f64,
    target_ratio: f64,
}

/// Result of applying the window, with the counts used to decide.
#[derive(Debug, Clone, PartialEq)]
pub struct RolledHistory {
    pub history: ConversationHistory,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

impl RolledHistory {
    pub fn was_trimmed(&self) -> bool {
        self.tokens_after < self.tokens_before
    }
}

impl RollingContextWindow {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            trigger_ratio: DEFAULT_TRIGGER_RATIO,
            target_ratio: DEFAULT_TARGET_RATIO,
        }
    }

    /// Override the fraction of the budget the trimmed history aims for.
    /// Clamped to `(0, trigger_ratio]`.
    pub fn with_target_ratio(mut self, ratio: f64) -> Self {
        self.target_ratio = ratio.clamp(f64::EPSILON, self.trigger_ratio);
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn trigger_tokens(&self) -> f64 {
        self.max_tokens as f64 * self.trigger_ratio
    }

    fn target_tokens(&self) -> f64 {
        self.max_tokens as f64 * self.target_ratio
    }

    /// Fit `history` into the budget using `count_tokens` for per-message cost.
    ///
    /// Fails with [`DomainError::Structural`] when the history does not follow
    /// `system?, (user, assistant)*, user`.
    pub fn apply<F>(
        &self,
        history: &ConversationHistory,
        count_tokens: F,
    ) -> Result<RolledHistory, DomainError>
    where
        F: Fn(&str) -> usize,
    {
        history.validate_turn_order()?;

        let messages = history.messages();
        let costs: Vec<usize> = messages.iter().map(|m| count_tokens(&m.content)).collect();
        let total: usize = costs.iter().sum();

        let unchanged = RolledHistory {
            history: history.clone(),
            tokens_before: total,
            tokens_after: total,
        };

        if (total as f64) <= self.trigger_tokens() || messages.len() <= ANCHOR_MESSAGES {
            return Ok(unchanged);
        }

        let n = messages.len();
        // The suffix must continue the alternation where the anchor stops.
        let mut start = match messages[ANCHOR_MESSAGES - 1].role {
            MessageRole::Assistant => n - 1,
            _ => n.saturating_sub(2),
        };
        if start < ANCHOR_MESSAGES {
            return Ok(unchanged);
        }

        let anchor_tokens: usize = costs[..ANCHOR_MESSAGES].iter().sum();
        let mut kept_tokens = anchor_tokens + costs[start..].iter().sum::<usize>();

        while start >= ANCHOR_MESSAGES + 2 {
            let pair = costs[start - 2] + costs[start - 1];
            if (kept_tokens + pair) as f64 > self.target_tokens() {
                break;
            }
            kept_tokens += pair;
            start -= 2;
        }

        let trimmed: Vec<_> = messages[..ANCHOR_MESSAGES]
            .iter()
            .chain(messages[start..].iter())
            .cloned()
            .collect();

        Ok(RolledHistory {
            history: ConversationHistory::from_messages(trimmed),
            tokens_before: total,
            tokens_after: kept_tokens,
        })
    }
}
