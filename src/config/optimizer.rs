// ABOUTME: Context window optimizer and summarization service configuration
// ABOUTME: Token budget defaults, compression knobs, and the summarizer endpoint settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{env_optional, env_parse_or, env_var_or};
use crate::constants::tokens::{DEFAULT_MAX_CONTEXT, KEEP_RECENT_MESSAGES, SUMMARY_MAX_TOKENS};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Default request timeout for the summarization endpoint
const DEFAULT_SUMMARIZER_TIMEOUT_SECS: u64 = 30;

/// Default summarization model
const DEFAULT_SUMMARIZER_MODEL: &str = "gpt-4o-mini";

/// Tuning for the context window optimizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Context window assumed for models missing from the limit table
    pub default_max_context: usize,
    /// Most recent messages kept verbatim by summarization compression
    pub keep_recent_messages: usize,
    /// Output cap requested from the summarization service
    pub summary_max_tokens: usize,
    /// Allow the optimizer to call the summarization service at all
    pub enable_summarization: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_max_context: DEFAULT_MAX_CONTEXT,
            keep_recent_messages: KEEP_RECENT_MESSAGES,
            summary_max_tokens: SUMMARY_MAX_TOKENS,
            enable_summarization: true,
        }
    }
}

impl OptimizerConfig {
    /// Load optimizer configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or is out of range
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        let config = Self {
            default_max_context: env_parse_or(
                "CONTEXT_DEFAULT_MAX_TOKENS",
                defaults.default_max_context,
            )?,
            keep_recent_messages: env_parse_or(
                "CONTEXT_KEEP_RECENT",
                defaults.keep_recent_messages,
            )?,
            summary_max_tokens: env_parse_or(
                "CONTEXT_SUMMARY_MAX_TOKENS",
                defaults.summary_max_tokens,
            )?,
            enable_summarization: env_parse_or(
                "CONTEXT_ENABLE_SUMMARIZATION",
                defaults.enable_summarization,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_INVALID` when a limit is zero
    pub fn validate(&self) -> AppResult<()> {
        if self.default_max_context == 0 {
            return Err(AppError::invalid_config(
                "CONTEXT_DEFAULT_MAX_TOKENS",
                "must be greater than zero",
            ));
        }
        if self.keep_recent_messages == 0 {
            return Err(AppError::invalid_config(
                "CONTEXT_KEEP_RECENT",
                "must keep at least one message",
            ));
        }
        if self.summary_max_tokens == 0 {
            return Err(AppError::invalid_config(
                "CONTEXT_SUMMARY_MAX_TOKENS",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Endpoint settings for the OpenAI-compatible summarization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Model used for summaries
    pub model: String,
    /// Bearer token (optional for local servers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SummarizerConfig {
    /// Load summarizer configuration from environment
    ///
    /// Returns `Ok(None)` when `SUMMARIZER_BASE_URL` is unset, which leaves the
    /// optimizer without a summarizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout cannot be parsed
    pub fn from_env() -> AppResult<Option<Self>> {
        let Some(base_url) = env_optional("SUMMARIZER_BASE_URL") else {
            return Ok(None);
        };
        Ok(Some(Self {
            base_url,
            model: env_var_or("SUMMARIZER_MODEL", DEFAULT_SUMMARIZER_MODEL),
            api_key: env_optional("SUMMARIZER_API_KEY"),
            timeout_secs: env_parse_or("SUMMARIZER_TIMEOUT_SECS", DEFAULT_SUMMARIZER_TIMEOUT_SECS)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_optimizer_config_is_valid() {
        let config = OptimizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.keep_recent_messages, 4);
        assert_eq!(config.summary_max_tokens, 200);
    }

    #[test]
    fn test_zero_keep_recent_is_rejected() {
        let config = OptimizerConfig {
            keep_recent_messages: 0,
            ..OptimizerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::ConfigInvalid);
    }
}
