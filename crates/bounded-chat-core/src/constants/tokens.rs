// ABOUTME: Chat-format token accounting constants and context budget defaults
// ABOUTME: Overheads follow the standard chat markup convention for every encoding family
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Tokens charged per message for the role/separator markup
pub const TOKENS_PER_MESSAGE: usize = 4;

/// Tokens charged once per message list to prime the assistant reply
pub const REPLY_PRIMING_TOKENS: usize = 2;

/// Adjustment applied when a message carries a `name` (the role token is omitted)
pub const NAME_ADJUSTMENT: isize = -1;

/// Context window assumed for models missing from the limit table
pub const DEFAULT_MAX_CONTEXT: usize = 4096;

/// Number of most recent messages kept verbatim by summarization compression
pub const KEEP_RECENT_MESSAGES: usize = 4;

/// Output cap requested from the summarization service
pub const SUMMARY_MAX_TOKENS: usize = 200;

/// Characters per token used when no BPE table can be loaded
pub const FALLBACK_CHARS_PER_TOKEN: usize = 4;

/// Importance assigned to every message before heuristics apply
pub const BASE_IMPORTANCE: f64 = 0.5;

/// Weight of importance (versus recency) when ranking messages for trimming
pub const IMPORTANCE_WEIGHT: f64 = 0.5;

/// Tokens reserved for the model's reply when the caller does not specify
pub const DEFAULT_MAX_RESPONSE_TOKENS: usize = 1024;

/// Most recent non-system messages the first trimming pass must keep
///
/// When these alone exceed the budget, trimming gives way to summarization.
pub const TRIM_CONTINUITY_MESSAGES: usize = 8;
