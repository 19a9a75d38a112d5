// ABOUTME: PostgreSQL conversation backend with row-level security keyed on a tenant claim
// ABOUTME: Every operation runs in a transaction that first sets the transaction-local tenant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! `PostgreSQL` backend
//!
//! Isolation is enforced twice: every statement carries a `tenant_id`
//! predicate, and a forced row-level security policy compares `tenant_id` with
//! `app.current_tenant`. The claim is set with `set_config(..., true)`, which is
//! scoped to the enclosing transaction, so a pooled connection returns to the
//! pool without any tenant attached.

use super::shared::mappers::{
    encode_message, encode_messages, parse_conversation_from_row, parse_summary_from_row,
};
use super::shared::transactions::PostgresTransactionGuard;
use super::{ConversationBackend, RotationPlan, VersionState};
use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{Conversation, ConversationFilter, ConversationSummary, Message, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, Postgres, Row};
use std::time::Duration;
use tracing::{debug, info};

/// Session setting read by the row-level security policy
const TENANT_SETTING: &str = "app.current_tenant";

/// `PostgreSQL` conversation backend
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Open a connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url.to_connection_string())
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to PostgreSQL: {e}")))?;

        info!(database = %config.url, "PostgreSQL conversation backend connected");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction carrying the tenant claim
    async fn begin_scoped(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<PostgresTransactionGuard<'static>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;
        let mut guard = PostgresTransactionGuard::new(tx);

        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(TENANT_SETTING)
            .bind(tenant_id.to_string())
            .execute(guard.executor()?)
            .await
            .map_err(|e| AppError::database(format!("Failed to set tenant context: {e}")))?;

        Ok(guard)
    }
}

async fn insert_row<'e, E>(executor: E, conversation: &Conversation) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r"
        INSERT INTO conversations
            (id, tenant_id, user_id, title, model, app_context, messages,
             tokens_used, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7::jsonb, $8, $9, $10, $11)
        ",
    )
    .bind(&conversation.id)
    .bind(conversation.tenant_id.as_uuid())
    .bind(&conversation.user_id)
    .bind(conversation.title.as_deref())
    .bind(&conversation.model)
    .bind(&conversation.app_context)
    .bind(encode_messages(&conversation.messages)?)
    .bind(conversation.tokens_used)
    .bind(conversation.version)
    .bind(conversation.created_at)
    .bind(conversation.updated_at)
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to insert conversation: {e}")))?;
    Ok(())
}

#[async_trait]
impl ConversationBackend for PostgresBackend {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn migrate(&self) -> AppResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                tenant_id UUID NOT NULL,
                user_id TEXT NOT NULL,
                title TEXT,
                model TEXT NOT NULL,
                app_context TEXT NOT NULL,
                messages JSONB NOT NULL DEFAULT '[]'::jsonb
                    CHECK (jsonb_array_length(messages) <= 100),
                tokens_used BIGINT NOT NULL DEFAULT 0,
                version BIGINT NOT NULL DEFAULT 1 CHECK (version >= 1),
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_conversations_tenant_user
                ON conversations (tenant_id, user_id, updated_at DESC)
            ",
            "ALTER TABLE conversations ENABLE ROW LEVEL SECURITY",
            "ALTER TABLE conversations FORCE ROW LEVEL SECURITY",
            r"
            DO $$
            BEGIN
                IF NOT EXISTS (
                    SELECT 1 FROM pg_policies
                    WHERE tablename = 'conversations'
                      AND policyname = 'conversations_tenant_isolation'
                ) THEN
                    CREATE POLICY conversations_tenant_isolation ON conversations
                        USING (tenant_id = NULLIF(current_setting('app.current_tenant', true), '')::uuid)
                        WITH CHECK (tenant_id = NULLIF(current_setting('app.current_tenant', true), '')::uuid);
                END IF;
            END
            $$
            ",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("PostgreSQL migration failed: {e}")))?;
        }

        debug!("PostgreSQL conversation schema and tenant policy ready");
        Ok(())
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        let mut guard = self.begin_scoped(conversation.tenant_id).await?;
        insert_row(guard.executor()?, conversation).await?;
        guard.commit().await
    }

    async fn fetch_conversation(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<Conversation>> {
        let mut guard = self.begin_scoped(tenant_id).await?;
        let row = sqlx::query(
            r"
            SELECT id, tenant_id::text AS tenant_id, user_id, title, model, app_context,
                   messages::text AS messages, tokens_used, version, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND tenant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant_id.as_uuid())
        .fetch_optional(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;
        guard.commit().await?;

        row.as_ref().map(parse_conversation_from_row).transpose()
    }

    async fn fetch_version_state(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<VersionState>> {
        let mut guard = self.begin_scoped(tenant_id).await?;
        let row = sqlx::query(
            r"
            SELECT version, jsonb_array_length(messages)::bigint AS message_count
            FROM conversations
            WHERE id = $1 AND tenant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant_id.as_uuid())
        .fetch_optional(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to read conversation version: {e}")))?;
        guard.commit().await?;

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
        let mut guard = self.begin_scoped(tenant_id).await?;
        let row = sqlx::query(
            r"
            UPDATE conversations
            SET messages = messages || jsonb_build_array($1::jsonb),
                tokens_used = tokens_used + $2,
                version = version + 1,
                updated_at = $3
            WHERE id = $4 AND tenant_id = $5 AND version = $6
            RETURNING id, tenant_id::text AS tenant_id, user_id, title, model, app_context,
                      messages::text AS messages, tokens_used, version, created_at, updated_at
            ",
        )
        .bind(encode_message(message)?)
        .bind(token_count)
        .bind(now)
        .bind(id)
        .bind(tenant_id.as_uuid())
        .bind(expected_version)
        .fetch_optional(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to append message: {e}")))?;
        guard.commit().await?;

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
        let mut guard = self.begin_scoped(tenant_id).await?;
        let row = sqlx::query(
            r"
            UPDATE conversations
            SET title = $1,
                version = version + 1,
                updated_at = $2
            WHERE id = $3 AND tenant_id = $4 AND version = $5
            RETURNING id, tenant_id::text AS tenant_id, user_id, title, model, app_context,
                      messages::text AS messages, tokens_used, version, created_at, updated_at
            ",
        )
        .bind(title)
        .bind(now)
        .bind(id)
        .bind(tenant_id.as_uuid())
        .bind(expected_version)
        .fetch_optional(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation title: {e}")))?;
        guard.commit().await?;

        row.as_ref().map(parse_conversation_from_row).transpose()
    }

    async fn list_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        let mut guard = self.begin_scoped(tenant_id).await?;
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, model, app_context,
                   jsonb_array_length(messages)::bigint AS message_count,
                   tokens_used, version, created_at, updated_at
            FROM conversations
            WHERE tenant_id = $1 AND user_id = $2
              AND ($3::text IS NULL OR app_context = $3::text)
            ORDER BY updated_at DESC, id
            LIMIT $4 OFFSET $5
            ",
        )
        .bind(tenant_id.as_uuid())
        .bind(&filter.user_id)
        .bind(filter.app_context.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;
        guard.commit().await?;

        rows.iter().map(parse_summary_from_row).collect()
    }

    async fn count_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
    ) -> AppResult<i64> {
        let mut guard = self.begin_scoped(tenant_id).await?;
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total
            FROM conversations
            WHERE tenant_id = $1 AND user_id = $2
              AND ($3::text IS NULL OR app_context = $3::text)
            ",
        )
        .bind(tenant_id.as_uuid())
        .bind(&filter.user_id)
        .bind(filter.app_context.as_deref())
        .fetch_one(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to count conversations: {e}")))?;
        guard.commit().await?;

        row.try_get("total")
            .map_err(|e| AppError::database(format!("Failed to get column 'total': {e}")))
    }

    async fn delete_conversation(&self, tenant_id: TenantId, id: &str) -> AppResult<bool> {
        let mut guard = self.begin_scoped(tenant_id).await?;
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id.as_uuid())
            .execute(guard.executor()?)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;
        guard.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn archive_and_rotate(
        &self,
        tenant_id: TenantId,
        plan: &RotationPlan,
    ) -> AppResult<Option<Conversation>> {
        let mut guard = self.begin_scoped(tenant_id).await?;

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
        .bind(tenant_id.as_uuid())
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
