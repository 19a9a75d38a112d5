// ABOUTME: Configuration management for the conversation store and context optimizer
// ABOUTME: Environment-only configuration with typed parsing helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration is read exclusively from environment variables; there are no
//! configuration files.

/// Database URL and pool configuration
pub mod database;
/// Aggregated engine configuration
pub mod environment;
/// Optimizer and summarizer configuration
pub mod optimizer;

pub use database::{DatabaseConfig, DatabaseUrl};
pub use environment::EngineConfig;
pub use optimizer::{OptimizerConfig, SummarizerConfig};

use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Read a variable, falling back to `default` when unset
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Read a variable, treating unset and blank values as absent
fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset
fn env_parse_or<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    env_optional(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e| AppError::invalid_config(key, format!("'{raw}' ({e})")))
    })
}
