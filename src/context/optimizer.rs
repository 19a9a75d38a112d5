// ABOUTME: Context window optimizer that fits conversation history into a model's token budget
// ABOUTME: Reserves prompt and RAG material, escalates trim/summarize/trim, and never fails the call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::compressor::{escalate, CompressionStrategy, ImportanceTrimming, SummarizationCompression};
use super::models::model_context_limit;
use super::tokenizer::Tokenizer;
use crate::config::{EngineConfig, OptimizerConfig};
use crate::constants::tokens::{DEFAULT_MAX_RESPONSE_TOKENS, TRIM_CONTINUITY_MESSAGES};
use crate::errors::AppResult;
use crate::llm::{OpenAiCompatibleSummarizer, SummarizationService};
use crate::logging::{OptimizationLogContext, TenantLogger};
use crate::models::Message;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Heading placed before retrieved context in the combined system message
const RAG_HEADING: &str = "Relevant context:\n";

/// Input to a single optimization call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    /// Conversation history in chronological order
    pub messages: Vec<Message>,
    /// Instruction prompt reserved verbatim
    pub system_prompt: Option<String>,
    /// Retrieved context reserved verbatim
    pub rag_context: Option<String>,
    /// Tokens reserved for the model's reply
    pub max_response_tokens: usize,
    /// Target model identifier
    pub model: String,
    /// Whether the summarization service may be called for this request
    pub allow_summarization: bool,
}

impl OptimizeRequest {
    /// Request with no prompt material and the default response reservation
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            system_prompt: None,
            rag_context: None,
            max_response_tokens: DEFAULT_MAX_RESPONSE_TOKENS,
            model: model.into(),
            allow_summarization: true,
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set retrieved context
    #[must_use]
    pub fn with_rag_context(mut self, context: impl Into<String>) -> Self {
        self.rag_context = Some(context.into());
        self
    }

    /// Set the response reservation
    #[must_use]
    pub const fn with_max_response_tokens(mut self, tokens: usize) -> Self {
        self.max_response_tokens = tokens;
        self
    }

    /// Allow or refuse summarization for this request
    #[must_use]
    pub const fn with_summarization_allowed(mut self, allowed: bool) -> Self {
        self.allow_summarization = allowed;
        self
    }

    /// Single leading system message combining prompt and retrieved context
    fn combined_system_message(&self) -> Option<Message> {
        let prompt = self
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let rag = self
            .rag_context
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let content = match (prompt, rag) {
            (Some(prompt), Some(rag)) => format!("{prompt}\n\n{RAG_HEADING}{rag}"),
            (Some(prompt), None) => prompt.to_owned(),
            (None, Some(rag)) => format!("{RAG_HEADING}{rag}"),
            (None, None) => return None,
        };
        Some(Message::system(content))
    }
}

/// How the conversation was reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationOutcome {
    /// History already fit
    Unchanged,
    /// Lower-ranked messages were dropped
    Trimmed,
    /// Older messages were replaced by a synopsis
    Summarized,
    /// Content was hard-truncated to fit
    Degraded,
}

impl OptimizationOutcome {
    /// Lowercase label used in logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Trimmed => "trimmed",
            Self::Summarized => "summarized",
            Self::Degraded => "degraded",
        }
    }
}

/// Message list ready to send, with budget metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedContext {
    /// Final list: combined system message (if any) followed by the conversation
    pub messages: Vec<Message>,
    /// Conversation messages received
    pub original_count: usize,
    /// Conversation messages kept, excluding the combined system message
    pub optimized_count: usize,
    /// Chat-format cost of `messages`
    pub total_tokens: usize,
    /// Context window minus the response reservation
    pub available_tokens: usize,
    /// `total_tokens` as a percentage of `available_tokens`
    pub tokens_used_pct: f64,
    /// Target model
    pub model: String,
    /// Context window of the target model
    pub max_context: usize,
    /// How the conversation was reduced
    pub outcome: OptimizationOutcome,
    /// A synopsis from the summarization service was spliced in
    pub summary_used: bool,
}

/// Fits conversation history into a model's context window
#[derive(Clone)]
pub struct ContextWindowOptimizer {
    config: OptimizerConfig,
    summarizer: Option<Arc<dyn SummarizationService>>,
}

impl ContextWindowOptimizer {
    /// Optimizer without a summarization service
    ///
    /// Compression that would need a synopsis falls back to truncation.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            summarizer: None,
        }
    }

    /// Attach a summarization service
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn SummarizationService>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Build from engine configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the optimizer settings are invalid or the
    /// summarization client cannot be built
    pub fn from_config(config: &EngineConfig) -> AppResult<Self> {
        config.optimizer.validate()?;
        let optimizer = Self::new(config.optimizer.clone());
        match &config.summarizer {
            Some(summarizer) => Ok(optimizer.with_summarizer(Arc::new(
                OpenAiCompatibleSummarizer::new(summarizer.clone())?,
            ))),
            None => Ok(optimizer),
        }
    }

    /// Build from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed
    pub fn from_env() -> AppResult<Self> {
        let config = OptimizerConfig::from_env()?;
        config.validate()?;
        let optimizer = Self::new(config);
        Ok(match OpenAiCompatibleSummarizer::from_env()? {
            Some(summarizer) => optimizer.with_summarizer(Arc::new(summarizer)),
            None => optimizer,
        })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Context window used for a model
    #[must_use]
    pub fn max_context_for(&self, model: &str) -> usize {
        model_context_limit(model, self.config.default_max_context)
    }

    /// Trim with a continuity window; if that cannot fit, summarize and trim again
    async fn compress(
        &self,
        tokenizer: &Tokenizer,
        messages: Vec<Message>,
        budget: usize,
        allow_summarization: bool,
    ) -> (Vec<Message>, OptimizationOutcome, bool) {
        let continuity = TRIM_CONTINUITY_MESSAGES.max(self.config.keep_recent_messages + 1);
        let trimmed = ImportanceTrimming::new(*tokenizer)
            .with_continuity(continuity)
            .compress(messages.clone(), budget)
            .await;
        if trimmed.fits(budget) {
            return (trimmed.messages, OptimizationOutcome::Trimmed, false);
        }

        let summarize = SummarizationCompression::new(*tokenizer, self.summarizer.clone())
            .with_keep_recent(self.config.keep_recent_messages)
            .with_summary_max_tokens(self.config.summary_max_tokens)
            .with_summarization_allowed(allow_summarization);
        let trim = ImportanceTrimming::new(*tokenizer);
        let compressed = escalate(&[&summarize, &trim], messages, budget, tokenizer).await;

        let outcome = if compressed.degraded {
            OptimizationOutcome::Degraded
        } else if compressed.summary_used {
            OptimizationOutcome::Summarized
        } else {
            OptimizationOutcome::Trimmed
        };
        (compressed.messages, outcome, compressed.summary_used)
    }

    /// Fit a conversation into the target model's context window
    ///
    /// Never fails: summarization errors degrade to truncation, and content
    /// is truncated as a last resort so the result fits whenever the budget
    /// covers the fixed material and per-message overheads.
    #[instrument(skip_all, fields(model = %request.model))]
    pub async fn optimize(&self, request: OptimizeRequest) -> OptimizedContext {
        let start = Instant::now();
        let tokenizer = Tokenizer::for_model(&request.model);
        let max_context = self.max_context_for(&request.model);
        let available = max_context.saturating_sub(request.max_response_tokens);

        let combined = request.combined_system_message();
        let fixed = combined
            .as_ref()
            .map_or(0, |message| tokenizer.count_message(message));
        let budget = available.saturating_sub(fixed);

        let original_count = request.messages.len();
        let allow_summarization = request.allow_summarization && self.config.enable_summarization;

        let (mut conversation, mut outcome, summary_used) =
            if tokenizer.count_messages(&request.messages) <= budget {
                (request.messages, OptimizationOutcome::Unchanged, false)
            } else {
                self.compress(&tokenizer, request.messages, budget, allow_summarization)
                    .await
            };

        if enforce_budget(&tokenizer, &mut conversation, budget) {
            outcome = OptimizationOutcome::Degraded;
        }

        let optimized_count = conversation.len();
        let mut messages = Vec::with_capacity(optimized_count + 1);
        messages.extend(combined);
        messages.extend(conversation);

        let total_tokens = tokenizer.count_messages(&messages);
        let tokens_used_pct = if available == 0 {
            0.0
        } else {
            total_tokens as f64 / available as f64 * 100.0
        };

        TenantLogger::log_optimization(&OptimizationLogContext {
            model: &request.model,
            original_count,
            optimized_count,
            total_tokens,
            available_tokens: available,
            outcome: outcome.as_str(),
            degraded: outcome == OptimizationOutcome::Degraded,
            summary_used,
            duration_ms: start.elapsed().as_millis() as u64,
        });

        OptimizedContext {
            messages,
            original_count,
            optimized_count,
            total_tokens,
            available_tokens: available,
            tokens_used_pct,
            model: request.model,
            max_context,
            outcome,
            summary_used,
        }
    }
}

/// Truncate content until `messages` fits `budget`; returns whether anything changed
///
/// The most recent message is cut first, then the largest of the rest.
/// Messages emptied along the way are dropped, except the most recent one.
fn enforce_budget(tokenizer: &Tokenizer, messages: &mut Vec<Message>, budget: usize) -> bool {
    let mut total = tokenizer.count_messages(messages);
    if total <= budget {
        return false;
    }
    let Some(last) = messages.len().checked_sub(1) else {
        return false;
    };

    let mut order: Vec<usize> = (0..last).collect();
    order.sort_by_key(|&i| Reverse(tokenizer.count(&messages[i].content)));
    order.insert(0, last);

    for index in order {
        if total <= budget {
            break;
        }
        let over = total - budget;
        let content_tokens = tokenizer.count(&messages[index].content);
        let keep = content_tokens.saturating_sub(over);
        messages[index].content = tokenizer.truncate(&messages[index].content, keep);
        total = tokenizer.count_messages(messages);
    }

    let mut position = 0;
    messages.retain(|message| {
        let keep = position == last || !message.content.is_empty();
        position += 1;
        keep
    });
    while tokenizer.count_messages(messages) > budget && messages.len() > 1 {
        messages.remove(0);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    fn optimizer() -> ContextWindowOptimizer {
        ContextWindowOptimizer::new(OptimizerConfig::default())
    }

    #[test]
    fn test_combined_system_message_layout() {
        let request = OptimizeRequest::new("gpt-4", Vec::new())
            .with_system_prompt("Be helpful.")
            .with_rag_context("Refunds take 5 days.");
        let combined = request.combined_system_message().unwrap();
        assert_eq!(combined.role, MessageRole::System);
        assert_eq!(
            combined.content,
            "Be helpful.\n\nRelevant context:\nRefunds take 5 days."
        );

        let rag_only = OptimizeRequest::new("gpt-4", Vec::new()).with_rag_context("Doc");
        assert_eq!(
            rag_only.combined_system_message().unwrap().content,
            "Relevant context:\nDoc"
        );

        let blank = OptimizeRequest::new("gpt-4", Vec::new()).with_system_prompt("  ");
        assert!(blank.combined_system_message().is_none());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(OptimizationOutcome::Degraded.as_str(), "degraded");
        assert_eq!(
            serde_json::to_string(&OptimizationOutcome::Summarized).unwrap(),
            "\"summarized\""
        );
    }

    #[tokio::test]
    async fn test_small_conversation_is_unchanged() {
        let request = OptimizeRequest::new(
            "gpt-4",
            vec![Message::user("hello"), Message::assistant("hi!")],
        )
        .with_system_prompt("Be brief.");

        let result = optimizer().optimize(request).await;

        assert_eq!(result.outcome, OptimizationOutcome::Unchanged);
        assert_eq!(result.original_count, 2);
        assert_eq!(result.optimized_count, 2);
        assert_eq!(result.messages.len(), 3);
        assert_eq!(result.max_context, 8_192);
        assert_eq!(result.available_tokens, 8_192 - DEFAULT_MAX_RESPONSE_TOKENS);
        assert!(result.tokens_used_pct > 0.0 && result.tokens_used_pct < 5.0);
    }

    #[tokio::test]
    async fn test_empty_conversation_keeps_prompt() {
        let request = OptimizeRequest::new("gpt-4", Vec::new()).with_system_prompt("Rules");
        let result = optimizer().optimize(request).await;
        assert_eq!(result.optimized_count, 0);
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_last_message_is_truncated() {
        let huge = "lorem ipsum dolor sit amet ".repeat(2_000);
        let request = OptimizeRequest::new("unknown-model", vec![Message::user(huge)])
            .with_max_response_tokens(96);

        let result = optimizer().optimize(request).await;

        assert_eq!(result.outcome, OptimizationOutcome::Degraded);
        assert_eq!(result.optimized_count, 1);
        assert!(result.total_tokens <= result.available_tokens);
        assert_eq!(result.available_tokens, 4_096 - 96);
    }

    #[test]
    fn test_enforce_budget_noop_when_fitting() {
        let tokenizer = Tokenizer::for_model("gpt-4");
        let mut messages = vec![Message::user("short")];
        assert!(!enforce_budget(&tokenizer, &mut messages, 1_000));
        assert_eq!(messages[0].content, "short");
    }

    #[test]
    fn test_enforce_budget_fits_and_keeps_latest() {
        let tokenizer = Tokenizer::for_model("gpt-4");
        let mut messages = vec![
            Message::assistant("tiny"),
            Message::assistant("long text ".repeat(200)),
            Message::user("latest question?"),
        ];
        let budget = 60;
        assert!(enforce_budget(&tokenizer, &mut messages, budget));
        assert!(tokenizer.count_messages(&messages) <= budget);
        assert_eq!(messages.last().unwrap().role, MessageRole::User);
    }
}
