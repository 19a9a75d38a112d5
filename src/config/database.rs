// ABOUTME: Database configuration types for SQLite and PostgreSQL connections
// ABOUTME: Handles connection URLs, pool sizing, and migration settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{env_parse_or, env_var_or};
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// Default database location when `DATABASE_URL` is unset
const DEFAULT_DATABASE_URL: &str = "sqlite:./data/conversations.db";

/// Type-safe database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path to `SQLite` database file
        path: PathBuf,
    },
    /// `PostgreSQL` connection
    PostgreSQL {
        /// `PostgreSQL` connection string
        connection_string: String,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string
    ///
    /// Unrecognised schemes are treated as `SQLite` file paths.
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            if path_str == ":memory:" {
                Self::Memory
            } else {
                Self::SQLite {
                    path: PathBuf::from(path_str.trim_start_matches("//")),
                }
            }
        } else if s.starts_with("postgresql://") || s.starts_with("postgres://") {
            Self::PostgreSQL {
                connection_string: s.to_owned(),
            }
        } else {
            Self::SQLite {
                path: PathBuf::from(s),
            }
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::PostgreSQL { connection_string } => connection_string.clone(),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    /// Check if this is a `SQLite` database
    #[must_use]
    pub const fn is_sqlite(&self) -> bool {
        matches!(self, Self::SQLite { .. } | Self::Memory)
    }

    /// Check if this is a `PostgreSQL` database
    #[must_use]
    pub const fn is_postgresql(&self) -> bool {
        matches!(self, Self::PostgreSQL { .. })
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::parse_url(DEFAULT_DATABASE_URL)
    }
}

impl Display for DatabaseUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        // Never print PostgreSQL credentials
        match self {
            Self::PostgreSQL { connection_string } => {
                let host = connection_string
                    .rsplit_once('@')
                    .map_or(connection_string.as_str(), |(_, host)| host);
                write!(f, "postgres://***@{host}")
            }
            other => write!(f, "{}", other.to_connection_string()),
        }
    }
}

/// Database connection and management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (`SQLite` path or `PostgreSQL` connection string)
    pub url: DatabaseUrl,
    /// Run schema migrations when the backend is opened
    pub auto_migrate: bool,
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DatabaseUrl::default(),
            auto_migrate: true,
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// In-memory `SQLite` configuration used by tests
    ///
    /// A single connection keeps every query on the same in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            url: DatabaseUrl::Memory,
            auto_migrate: true,
            max_connections: 1,
            acquire_timeout_secs: 5,
        }
    }

    /// Load database configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            url: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL)),
            auto_migrate: env_parse_or("DATABASE_AUTO_MIGRATE", defaults.auto_migrate)?,
            max_connections: env_parse_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            acquire_timeout_secs: env_parse_or(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            )?,
        })
    }
}
