// ABOUTME: Aggregated engine configuration loaded from environment variables
// ABOUTME: Combines database, optimizer, and summarizer settings into one validated struct
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::database::DatabaseConfig;
use super::optimizer::{OptimizerConfig, SummarizerConfig};
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Complete configuration for the store and the optimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Storage backend settings
    pub database: DatabaseConfig,
    /// Context window optimizer settings
    pub optimizer: OptimizerConfig,
    /// Summarization endpoint, absent when not configured
    pub summarizer: Option<SummarizerConfig>,
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is malformed or out of range
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");
        let config = Self {
            database: DatabaseConfig::from_env()?,
            optimizer: OptimizerConfig::from_env()?,
            summarizer: SummarizerConfig::from_env()?,
        };
        info!(
            database = %config.database.url,
            summarizer = config.summarizer.as_ref().map_or("disabled", |s| s.base_url.as_str()),
            "Configuration loaded"
        );
        Ok(config)
    }
}
