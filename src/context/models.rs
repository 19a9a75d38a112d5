// ABOUTME: Context window sizes for known model families, resolved by identifier prefix
// ABOUTME: Unknown models fall back to a configurable default limit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Known prefixes and their context windows; longer prefixes come first
const MODEL_LIMITS: &[(&str, usize)] = &[
    ("gpt-3.5-turbo-instruct", 4_096),
    ("gpt-3.5-turbo", 16_384),
    ("gpt-4-32k", 32_768),
    ("gpt-4-turbo", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4.1", 128_000),
    ("gpt-4", 8_192),
    ("o1", 128_000),
    ("o3", 128_000),
    ("o4", 128_000),
    ("claude", 200_000),
    ("gemini", 128_000),
    ("llama-3", 8_192),
    ("llama3", 8_192),
    ("mistral", 32_768),
    ("mixtral", 32_768),
];

/// Context window for a model, if the family is known
///
/// Matching is case-insensitive and ignores a leading `provider/` segment.
#[must_use]
pub fn known_context_limit(model: &str) -> Option<usize> {
    let model = model.trim().to_ascii_lowercase();
    let bare = model.rsplit('/').next().unwrap_or(&model);
    MODEL_LIMITS
        .iter()
        .find(|(prefix, _)| bare.starts_with(prefix))
        .map(|&(_, limit)| limit)
}

/// Context window for a model, falling back to `default_limit`
#[must_use]
pub fn model_context_limit(model: &str, default_limit: usize) -> usize {
    known_context_limit(model).unwrap_or(default_limit)
}
