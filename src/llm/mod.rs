// ABOUTME: Summarization service contract consumed by the context optimizer
// ABOUTME: Prompt in, bounded text out; implementations may fail and callers must tolerate it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Summarization Service
//!
//! The optimizer's only external collaborator. Calls are best-effort: a
//! network error, rate limit, or refusal by an upstream metering layer is
//! reported as an [`AppError`](crate::errors::AppError) and the optimizer falls back to truncation.
//!
//! ```rust,no_run
//! use bounded_chat::llm::{OpenAiCompatibleSummarizer, SummarizationService};
//!
//! # async fn run() -> Result<(), bounded_chat::errors::AppError> {
//! if let Some(summarizer) = OpenAiCompatibleSummarizer::from_env()? {
//!     let synopsis = summarizer.summarize("user: my invoice is wrong", 200).await?;
//!     println!("{synopsis}");
//! }
//! # Ok(())
//! # }
//! ```

mod openai_compatible;
pub mod prompts;

pub use openai_compatible::OpenAiCompatibleSummarizer;

use crate::errors::AppResult;
use async_trait::async_trait;

/// Condenses a transcript into a bounded synopsis
#[async_trait]
pub trait SummarizationService: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Summarize `text` in at most `max_output_tokens` tokens
    ///
    /// # Errors
    ///
    /// Returns an error when the service is unreachable, rejects the request,
    /// or returns no usable text
    async fn summarize(&self, text: &str, max_output_tokens: usize) -> AppResult<String>;
}
