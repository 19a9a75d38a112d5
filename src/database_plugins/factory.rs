// ABOUTME: Database factory selecting the conversation backend from the configured URL
// ABOUTME: Delegates the backend trait to SQLite or, with the postgresql feature, PostgreSQL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Database factory
//!
//! Detects the backend from [`DatabaseUrl`], connects, optionally migrates, and
//! hands back a [`Database`] that implements [`ConversationBackend`].

use super::sqlite::SqliteBackend;
use super::{ConversationBackend, RotationPlan, VersionState};
use crate::config::{DatabaseConfig, DatabaseUrl};
use crate::errors::AppResult;
use crate::models::{Conversation, ConversationFilter, ConversationSummary, Message, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "postgresql")]
use super::postgres::PostgresBackend;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// Embedded `SQLite`
    SQLite,
    /// `PostgreSQL` with row-level security
    PostgreSQL,
}

/// Database instance wrapper that delegates to the appropriate implementation
#[derive(Clone)]
pub enum Database {
    /// `SQLite` backend
    SQLite(SqliteBackend),
    /// `PostgreSQL` backend
    #[cfg(feature = "postgresql")]
    PostgreSQL(PostgresBackend),
}

impl Database {
    /// Connect to the configured backend, running migrations when enabled
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `PostgreSQL` is requested without the `postgresql` feature
    /// - The connection fails
    /// - Migration fails
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        let db_type = detect_database_type(&config.url)?;
        info!(database = %config.url, backend = ?db_type, "Initializing conversation backend");

        let database = match db_type {
            DatabaseType::SQLite => Self::SQLite(SqliteBackend::connect(config).await?),
            #[cfg(feature = "postgresql")]
            DatabaseType::PostgreSQL => Self::PostgreSQL(PostgresBackend::connect(config).await?),
            #[cfg(not(feature = "postgresql"))]
            DatabaseType::PostgreSQL => {
                return Err(crate::errors::AppError::config(
                    "PostgreSQL support not enabled. Enable the 'postgresql' feature flag.",
                ));
            }
        };

        if config.auto_migrate {
            database.migrate().await?;
        }
        Ok(database)
    }

    /// Get a descriptive string for the current database backend
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::SQLite(_) => "SQLite (embedded, predicate isolation)",
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(_) => "PostgreSQL (row-level security)",
        }
    }

    /// Get the database type enum
    #[must_use]
    pub const fn database_type(&self) -> DatabaseType {
        match self {
            Self::SQLite(_) => DatabaseType::SQLite,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(_) => DatabaseType::PostgreSQL,
        }
    }

    /// Erase the concrete type for the conversation store
    #[must_use]
    pub fn into_shared(self) -> Arc<dyn ConversationBackend> {
        Arc::new(self)
    }
}

/// Detect the backend for a database URL
///
/// # Errors
///
/// Returns an error if a `PostgreSQL` URL is given without the `postgresql` feature
pub fn detect_database_type(url: &DatabaseUrl) -> AppResult<DatabaseType> {
    match url {
        DatabaseUrl::SQLite { .. } | DatabaseUrl::Memory => Ok(DatabaseType::SQLite),
        DatabaseUrl::PostgreSQL { .. } => {
            #[cfg(feature = "postgresql")]
            return Ok(DatabaseType::PostgreSQL);

            #[cfg(not(feature = "postgresql"))]
            return Err(crate::errors::AppError::config(
                "PostgreSQL connection string detected, but PostgreSQL support is not enabled. \
                 Enable the 'postgresql' feature flag in Cargo.toml",
            ));
        }
    }
}

#[async_trait]
impl ConversationBackend for Database {
    fn backend_name(&self) -> &'static str {
        match self {
            Self::SQLite(db) => db.backend_name(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.backend_name(),
        }
    }

    async fn migrate(&self) -> AppResult<()> {
        match self {
            Self::SQLite(db) => db.migrate().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.migrate().await,
        }
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        match self {
            Self::SQLite(db) => db.insert_conversation(conversation).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.insert_conversation(conversation).await,
        }
    }

    async fn fetch_conversation(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<Conversation>> {
        match self {
            Self::SQLite(db) => db.fetch_conversation(tenant_id, id).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.fetch_conversation(tenant_id, id).await,
        }
    }

    async fn fetch_version_state(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<VersionState>> {
        match self {
            Self::SQLite(db) => db.fetch_version_state(tenant_id, id).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.fetch_version_state(tenant_id, id).await,
        }
    }

    async fn append_message_if_current(
        &self,
        tenant_id: TenantId,
        id: &str,
        expected_version: i64,
        message: &Message,
        token_count: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Conversation>> {
        match self {
            Self::SQLite(db) => {
                db.append_message_if_current(tenant_id, id, expected_version, message, token_count, now)
                    .await
            }
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => {
                db.append_message_if_current(tenant_id, id, expected_version, message, token_count, now)
                    .await
            }
        }
    }

    async fn update_title_if_current(
        &self,
        tenant_id: TenantId,
        id: &str,
        expected_version: i64,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Conversation>> {
        match self {
            Self::SQLite(db) => {
                db.update_title_if_current(tenant_id, id, expected_version, title, now)
                    .await
            }
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => {
                db.update_title_if_current(tenant_id, id, expected_version, title, now)
                    .await
            }
        }
    }

    async fn list_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        match self {
            Self::SQLite(db) => db.list_by_user(tenant_id, filter, limit, offset).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.list_by_user(tenant_id, filter, limit, offset).await,
        }
    }

    async fn count_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
    ) -> AppResult<i64> {
        match self {
            Self::SQLite(db) => db.count_by_user(tenant_id, filter).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.count_by_user(tenant_id, filter).await,
        }
    }

    async fn delete_conversation(&self, tenant_id: TenantId, id: &str) -> AppResult<bool> {
        match self {
            Self::SQLite(db) => db.delete_conversation(tenant_id, id).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.delete_conversation(tenant_id, id).await,
        }
    }

    async fn archive_and_rotate(
        &self,
        tenant_id: TenantId,
        plan: &RotationPlan,
    ) -> AppResult<Option<Conversation>> {
        match self {
            Self::SQLite(db) => db.archive_and_rotate(tenant_id, plan).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(db) => db.archive_and_rotate(tenant_id, plan).await,
        }
    }
}
