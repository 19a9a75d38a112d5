// ABOUTME: Context window optimization: token counting, scoring, compression, and the optimizer facade
// ABOUTME: Fits unbounded conversation history plus prompt material into a model's token budget
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Context Window Optimization
//!
//! Components, leaves first:
//!
//! - [`Tokenizer`]: model-aware BPE counting with chat-format overheads
//! - [`MessageScorer`]: structural importance heuristics
//! - [`CompressionStrategy`]: importance trimming and summarization
//! - [`ContextWindowOptimizer`]: reserves prompt material and escalates
//!   compression until the conversation fits

/// Compression strategies and escalation
pub mod compressor;
/// Context window sizes per model family
pub mod models;
/// Optimizer facade
pub mod optimizer;
/// Message importance heuristics
pub mod scorer;
/// BPE token counting
pub mod tokenizer;

pub use compressor::{
    escalate, Compressed, CompressionStrategy, ImportanceTrimming, SummarizationCompression,
};
pub use models::{known_context_limit, model_context_limit};
pub use optimizer::{ContextWindowOptimizer, OptimizationOutcome, OptimizeRequest, OptimizedContext};
pub use scorer::{score_messages, MessageScorer, ScoredMessage};
pub use tokenizer::{Encoding, Tokenizer};
