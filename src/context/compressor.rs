// ABOUTME: Compression strategies that shrink a message list to a token budget
// ABOUTME: Importance trimming, summarization with hard-truncation fallback, and ordered escalation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Compression strategies
//!
//! Strategies never fail: a strategy that cannot reach the budget returns its
//! best effort and leaves the decision to escalate to the caller.

use super::scorer::{score_messages, ScoredMessage};
use super::tokenizer::Tokenizer;
use crate::constants::tokens::{
    IMPORTANCE_WEIGHT, KEEP_RECENT_MESSAGES, REPLY_PRIMING_TOKENS, SUMMARY_MAX_TOKENS,
    TOKENS_PER_MESSAGE,
};
use crate::llm::SummarizationService;
use crate::models::{Message, MessageRole};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

/// Heading placed before a synopsis of older messages
pub const SYNOPSIS_HEADING: &str = "Summary of earlier conversation:\n";

/// Result of running a compression strategy
#[derive(Debug, Clone)]
pub struct Compressed {
    /// Messages in chronological order
    pub messages: Vec<Message>,
    /// Chat-format token cost of `messages`
    pub tokens: usize,
    /// A synopsis produced by the summarization service was spliced in
    pub summary_used: bool,
    /// Content was hard-truncated instead of summarized
    pub degraded: bool,
}

impl Compressed {
    fn counted(messages: Vec<Message>, tokenizer: &Tokenizer) -> Self {
        let tokens = tokenizer.count_messages(&messages);
        Self {
            messages,
            tokens,
            summary_used: false,
            degraded: false,
        }
    }

    /// Whether the result fits the budget
    #[must_use]
    pub const fn fits(&self, budget: usize) -> bool {
        self.tokens <= budget
    }
}

/// A way of reducing a message list towards a token budget
#[async_trait]
pub trait CompressionStrategy: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Reduce `messages` towards `budget` tokens
    async fn compress(&self, messages: Vec<Message>, budget: usize) -> Compressed;
}

// ============================================================================
// Importance trimming
// ============================================================================

/// Keeps the highest-ranked messages that fit, ranked by importance and recency
///
/// System messages and the most recent `continuity` non-system messages are
/// always kept, even when they alone exceed the budget.
#[derive(Debug, Clone, Copy)]
pub struct ImportanceTrimming {
    tokenizer: Tokenizer,
    continuity: usize,
}

impl ImportanceTrimming {
    /// Create a trimming strategy that pins only the most recent message
    #[must_use]
    pub const fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            continuity: 1,
        }
    }

    /// Pin the most recent `continuity` non-system messages
    #[must_use]
    pub const fn with_continuity(mut self, continuity: usize) -> Self {
        self.continuity = continuity;
        self
    }

    fn rank(scored: &ScoredMessage, count: usize) -> f64 {
        let recency = (scored.index + 1) as f64 / count as f64;
        scored
            .importance
            .mul_add(IMPORTANCE_WEIGHT, recency * (1.0 - IMPORTANCE_WEIGHT))
    }
}

#[async_trait]
impl CompressionStrategy for ImportanceTrimming {
    fn name(&self) -> &'static str {
        "importance_trimming"
    }

    async fn compress(&self, messages: Vec<Message>, budget: usize) -> Compressed {
        let count = messages.len();
        if count == 0 {
            return Compressed::counted(messages, &self.tokenizer);
        }

        let scored = score_messages(&messages, &self.tokenizer);
        let mut keep = vec![false; count];
        let mut used = REPLY_PRIMING_TOKENS;

        let recent_from = scored
            .iter()
            .rev()
            .filter(|s| s.role != MessageRole::System)
            .take(self.continuity.max(1))
            .last()
            .map_or(count, |s| s.index);
        let (pinned, mut candidates): (Vec<&ScoredMessage>, Vec<&ScoredMessage>) = scored
            .iter()
            .partition(|s| s.role == MessageRole::System || s.index >= recent_from);
        for message in pinned {
            keep[message.index] = true;
            used += message.tokens;
        }

        candidates.sort_by(|a, b| {
            Self::rank(b, count)
                .partial_cmp(&Self::rank(a, count))
                .unwrap_or(Ordering::Equal)
                .then(b.index.cmp(&a.index))
        });
        for candidate in candidates {
            if used + candidate.tokens > budget {
                break;
            }
            keep[candidate.index] = true;
            used += candidate.tokens;
        }

        let kept: Vec<Message> = messages
            .into_iter()
            .zip(keep)
            .filter_map(|(message, keep)| keep.then_some(message))
            .collect();
        debug!(
            strategy = self.name(),
            original = count,
            kept = kept.len(),
            budget,
            "Trimmed messages by importance"
        );
        Compressed::counted(kept, &self.tokenizer)
    }
}

// ============================================================================
// Summarization
// ============================================================================

/// Replaces older messages with one synopsis message
///
/// System messages and the most recent `keep_recent` non-system messages are
/// kept verbatim. When the summarization service is absent, refused, or fails,
/// the older messages are hard-truncated to the remaining budget instead.
#[derive(Clone)]
pub struct SummarizationCompression {
    tokenizer: Tokenizer,
    summarizer: Option<Arc<dyn SummarizationService>>,
    keep_recent: usize,
    summary_max_tokens: usize,
    allow_summarization: bool,
}

impl SummarizationCompression {
    /// Create a summarization strategy with default limits
    #[must_use]
    pub fn new(tokenizer: Tokenizer, summarizer: Option<Arc<dyn SummarizationService>>) -> Self {
        Self {
            tokenizer,
            summarizer,
            keep_recent: KEEP_RECENT_MESSAGES,
            summary_max_tokens: SUMMARY_MAX_TOKENS,
            allow_summarization: true,
        }
    }

    /// Number of recent non-system messages kept verbatim
    #[must_use]
    pub fn with_keep_recent(mut self, keep_recent: usize) -> Self {
        self.keep_recent = keep_recent;
        self
    }

    /// Output cap requested from the summarization service
    #[must_use]
    pub fn with_summary_max_tokens(mut self, summary_max_tokens: usize) -> Self {
        self.summary_max_tokens = summary_max_tokens;
        self
    }

    /// Whether the summarization service may be called at all
    #[must_use]
    pub fn with_summarization_allowed(mut self, allowed: bool) -> Self {
        self.allow_summarization = allowed;
        self
    }

    fn transcript(messages: &[Message]) -> String {
        let mut transcript = String::new();
        for message in messages {
            if !transcript.is_empty() {
                transcript.push('\n');
            }
            let _ = write!(transcript, "{}: {}", message.role, message.content);
        }
        transcript
    }

    /// Wrap `body` in a system message costing at most `allowed` tokens
    fn fit_synopsis(&self, mut body: String, allowed: usize) -> Option<Message> {
        loop {
            if body.trim().is_empty() {
                return None;
            }
            let synopsis = Message::system(format!("{SYNOPSIS_HEADING}{body}"));
            let cost = self.tokenizer.count_message(&synopsis);
            if cost <= allowed {
                return Some(synopsis);
            }
            let keep = self.tokenizer.count(&body).saturating_sub(cost - allowed);
            body = self.tokenizer.truncate(&body, keep);
        }
    }

    /// Ask the service for a synopsis; `None` when it is unavailable or fails
    async fn summarize(&self, transcript: &str) -> Option<String> {
        if !self.allow_summarization {
            debug!("Summarization refused for this call, truncating instead");
            return None;
        }
        let summarizer = self.summarizer.as_ref()?;
        match summarizer
            .summarize(transcript, self.summary_max_tokens)
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => Some(summary),
            Ok(_) => {
                warn!(service = summarizer.name(), "Summarizer returned empty text");
                None
            }
            Err(e) => {
                warn!(
                    service = summarizer.name(),
                    error = %e,
                    "Summarization failed, falling back to truncation"
                );
                None
            }
        }
    }
}

#[async_trait]
impl CompressionStrategy for SummarizationCompression {
    fn name(&self) -> &'static str {
        "summarization"
    }

    async fn compress(&self, messages: Vec<Message>, budget: usize) -> Compressed {
        let non_system: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != MessageRole::System)
            .map(|(i, _)| i)
            .collect();
        if non_system.len() <= self.keep_recent {
            return Compressed::counted(messages, &self.tokenizer);
        }
        let split = non_system[non_system.len() - self.keep_recent.max(1)];

        let mut messages = messages;
        let recent = messages.split_off(split);
        let (kept_system, older): (Vec<Message>, Vec<Message>) = messages
            .into_iter()
            .partition(|m| m.role == MessageRole::System);

        let retained_cost = kept_system
            .iter()
            .chain(&recent)
            .map(|m| self.tokenizer.count_message(m))
            .sum::<usize>()
            + REPLY_PRIMING_TOKENS;
        let synopsis_overhead = TOKENS_PER_MESSAGE
            + self.tokenizer.count(MessageRole::System.as_str())
            + self.tokenizer.count(SYNOPSIS_HEADING);
        let room = budget.saturating_sub(retained_cost + synopsis_overhead);

        let transcript = Self::transcript(&older);
        let (body, summary_used) = match self.summarize(&transcript).await {
            Some(summary) => (
                self.tokenizer
                    .truncate(&summary, room.min(self.summary_max_tokens)),
                true,
            ),
            None => (self.tokenizer.truncate(&transcript, room), false),
        };
        let synopsis = self.fit_synopsis(body, budget.saturating_sub(retained_cost));
        let summary_used = summary_used && synopsis.is_some();
        let degraded = !summary_used;

        let mut output = kept_system;
        output.extend(synopsis);
        output.extend(recent);

        debug!(
            strategy = self.name(),
            summarized = older.len(),
            summary_used,
            budget,
            "Compressed older messages"
        );
        let mut compressed = Compressed::counted(output, &self.tokenizer);
        compressed.summary_used = summary_used;
        compressed.degraded = degraded;
        compressed
    }
}

// ============================================================================
// Escalation
// ============================================================================

/// Run strategies in order, stopping once the result fits `budget`
///
/// Each strategy receives the previous strategy's output. Flags accumulate
/// across the run.
pub async fn escalate(
    strategies: &[&dyn CompressionStrategy],
    messages: Vec<Message>,
    budget: usize,
    tokenizer: &Tokenizer,
) -> Compressed {
    let mut current = Compressed::counted(messages, tokenizer);
    for strategy in strategies {
        if current.fits(budget) {
            break;
        }
        let summary_used = current.summary_used;
        let degraded = current.degraded;
        current = strategy.compress(current.messages, budget).await;
        current.summary_used |= summary_used;
        current.degraded |= degraded;
        debug!(
            strategy = strategy.name(),
            tokens = current.tokens,
            budget,
            "Compression step finished"
        );
    }
    current
}
