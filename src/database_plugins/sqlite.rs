// ABOUTME: SQLite conversation backend using a JSON message column
// ABOUTME: Version-guarded single-statement updates with explicit tenant predicates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! `SQLite` backend
//!
//! Messages live in a JSON array column and are appended in place with
//! `json_insert`, so an append is one `UPDATE ... RETURNING` statement.
//! `SQLite` has no row-level security; isolation rests on the `tenant_id`
//! predicate present in every statement.

use super::shared::mappers::{
    encode_message, encode_messages, format_timestamp, parse_conversation_from_row,
    parse_summary_from_row,
};
use super::shared::transactions::SqliteTransactionGuard;
use super::{ConversationBackend, RotationPlan, VersionState};
use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{Conversation, ConversationFilter, ConversationSummary, Message, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// `SQLite` conversation backend
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open a pool for the configured URL, creating the database file if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let connection_string = config.url.to_connection_string();
        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| AppError::config(format!("Invalid SQLite URL {}: {e}", config.url)))?
            .create_if_missing(true);

        if let crate::config::DatabaseUrl::SQLite { path } = &config.url {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::database(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));
        if config.url.is_memory() {
            // An in-memory database disappears with its last connection
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to SQLite: {e}")))?;

        info!(database = %config.url, "SQLite conversation backend connected");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn insert_row<'e, E>(executor: E, conversation: &Conversation) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
        INSERT INTO conversations
            (id, tenant_id, user_id, title, model, app_context, messages,
             tokens_used, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(&conversation.id)
    .bind(conversation.tenant_id.to_string())
    .bind(&conversation.user_id)
    .bind(conversation.title.as_deref())
    .bind(&conversation.model)
    .bind(&conversation.app_context)
    .bind(encode_messages(&conversation.messages)?)
    .bind(conversation.tokens_used)
    .bind(conversation.version)
    .bind(format_timestamp(conversation.created_at))
    .bind(format_timestamp(conversation.updated_at))
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to insert conversation: {e}")))?;
    Ok(())
}

#[async_trait]
impl ConversationBackend for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                title TEXT,
                model TEXT NOT NULL,
                app_context TEXT NOT NULL,
                messages TEXT NOT NULL DEFAULT '[]'
                    CHECK (json_valid(messages) AND json_array_length(messages) <= 100),
                tokens_used INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversations table: {e}")))?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_conversations_tenant_user
                ON conversations (tenant_id, user_id, updated_at DESC)
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversations index: {e}")))?;

        debug!("SQLite conversation schema ready");
        Ok(())
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        insert_row(&self.pool, conversation).await
    }

    async fn fetch_conversation(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            r"
            SELECT id, tenant_id, user_id, title, model, app_context, messages,
                   tokens_used, version, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND tenant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        row.as_ref().map(parse_conversation_from_row).transpose()
    }

    async fn fetch_version_state(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<VersionState>> {
        let row = sqlx::query(
            r"
            SELECT version, json_array_length(messages) AS message_count
            FROM conversations
            WHERE id = $1 AND tenant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to read conversation version: {e}")))?;

        row.map(|row| {
            Ok(VersionState {
                version: row.try_get("version")?,
                message_count: row.try_get("message_count")?,
            })
        })
        .transpose()
        .map_err(|e: sqlx::Error| AppError::database(format!("Failed to parse version row: {e}")))
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
        let row = sqlx::query(
            r"
            UPDATE conversations
            SET messages = json_insert(messages, '$[#]', json($1)),
                tokens_used = tokens_used + $2,
                version = version + 1,
                updated_at = $3
            WHERE id = $4 AND tenant_id = $5 AND version = $6
            RETURNING id, tenant_id, user_id, title, model, app_context, messages,
                      tokens_used, version, created_at, updated_at
            ",
        )
        .bind(encode_message(message)?)
        .bind(token_count)
        .bind(format_timestamp(now))
        .bind(id)
        .bind(tenant_id.to_string())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to append message: {e}")))?;

        row.as_ref().map(parse_conversation_from_row).transpose()
    }

    async fn update_title_if_current(
        &self,
        tenant_id: TenantId,
        id: &str,
        expected_version: i64,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            r"
            UPDATE conversations
            SET title = $1,
                version = version + 1,
                updated_at = $2
            WHERE id = $3 AND tenant_id = $4 AND version = $5
            RETURNING id, tenant_id, user_id, title, model, app_context, messages,
                      tokens_used, version, created_at, updated_at
            ",
        )
        .bind(title)
        .bind(format_timestamp(now))
        .bind(id)
        .bind(tenant_id.to_string())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation title: {e}")))?;

        row.as_ref().map(parse_conversation_from_row).transpose()
    }

    async fn list_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, model, app_context,
                   json_array_length(messages) AS message_count,
                   tokens_used, version, created_at, updated_at
            FROM conversations
            WHERE tenant_id = $1 AND user_id = $2 AND ($3 IS NULL OR app_context = $3)
            ORDER BY updated_at DESC, id
            LIMIT $4 OFFSET $5
            ",
        )
        .bind(tenant_id.to_string())
        .bind(&filter.user_id)
        .bind(filter.app_context.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        rows.iter().map(parse_summary_from_row).collect()
    }

    async fn count_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total
            FROM conversations
            WHERE tenant_id = $1 AND user_id = $2 AND ($3 IS NULL OR app_context = $3)
            ",
        )
        .bind(tenant_id.to_string())
        .bind(&filter.user_id)
        .bind(filter.app_context.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count conversations: {e}")))?;

        row.try_get("total")
            .map_err(|e| AppError::database(format!("Failed to get column 'total': {e}")))
    }

    async fn delete_conversation(&self, tenant_id: TenantId, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn archive_and_rotate(
        &self,
        tenant_id: TenantId,
        plan: &RotationPlan,
    ) -> AppResult<Option<Conversation>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;
        let mut guard = SqliteTransactionGuard::new(tx);

        let archived = sqlx::query(
            r"
            UPDATE conversations
            SET app_context = $1, title = $2
            WHERE id = $3 AND tenant_id = $4 AND version = $5 AND app_context = $6
            ",
        )
        .bind(&plan.archived_app_context)
        .bind(&plan.archived_title)
        .bind(&plan.conversation_id)
        .bind(tenant_id.to_string())
        .bind(plan.expected_version)
        .bind(&plan.original_app_context)
        .execute(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to archive conversation: {e}")))?;

        if archived.rows_affected() == 0 {
            guard.rollback().await?;
            return Ok(None);
        }

        insert_row(guard.executor()?, &plan.successor).await?;
        guard.commit().await?;

        Ok(Some(plan.successor.clone()))
    }
}
