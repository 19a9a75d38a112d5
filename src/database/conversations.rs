// ABOUTME: Tenant-scoped conversation store with optimistic concurrency control
// ABOUTME: Create, read, append, rename, list, count, delete, and archive-and-rotate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, MAX_MESSAGES};
use crate::database_plugins::{ConversationBackend, RotationPlan};
use crate::errors::ConversationError;
use crate::logging::TenantLogger;
use crate::models::{
    Conversation, ConversationFilter, ConversationSummary, NewConversation, NewMessage, TenantId,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

type StoreResult<T> = Result<T, ConversationError>;

/// Tenant-scoped, versioned conversation store
///
/// Every mutation is a single statement guarded by the caller's expected
/// version; a losing writer gets [`ConversationError::Conflict`] carrying the
/// current version and must re-fetch before retrying.
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn ConversationBackend>,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl ConversationStore {
    /// Create a store over a storage backend
    #[must_use]
    pub fn new(backend: Arc<dyn ConversationBackend>) -> Self {
        Self { backend }
    }

    /// Storage backend in use
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ConversationBackend> {
        &self.backend
    }

    /// Create an empty conversation at version 1
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank `user_id` or `model`, or `Backend` if the
    /// insert fails
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id))]
    pub async fn create(
        &self,
        tenant_id: TenantId,
        request: NewConversation,
    ) -> StoreResult<Conversation> {
        if request.user_id.trim().is_empty() {
            return Err(ConversationError::validation("user_id is required"));
        }
        if request.model.trim().is_empty() {
            return Err(ConversationError::validation("model is required"));
        }

        let start = Instant::now();
        let conversation = Conversation::new(tenant_id, request, Utc::now());
        self.backend.insert_conversation(&conversation).await?;

        TenantLogger::log_store_operation(
            tenant_id,
            &conversation.id,
            "create",
            Some(conversation.version),
            elapsed_ms(start),
        );
        Ok(conversation)
    }

    /// Fetch a conversation owned by the tenant
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the conversation is absent or belongs to another
    /// tenant (indistinguishable on purpose), or `Backend` on storage failure
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get(&self, id: &str, tenant_id: TenantId) -> StoreResult<Conversation> {
        self.backend
            .fetch_conversation(tenant_id, id)
            .await?
            .ok_or_else(|| ConversationError::not_found(id))
    }

    /// Append a message if the conversation is still at `expected_version`
    ///
    /// # Errors
    ///
    /// - `Validation` for blank content
    /// - `NotFound` if the conversation is not visible to the tenant
    /// - `Full` when the log already holds the maximum number of messages; no
    ///   write is attempted
    /// - `Conflict` when another writer advanced the version
    /// - `Backend` on storage failure
    #[instrument(skip(self, message), fields(tenant_id = %tenant_id))]
    pub async fn add_message(
        &self,
        id: &str,
        tenant_id: TenantId,
        message: NewMessage,
        expected_version: i64,
    ) -> StoreResult<Conversation> {
        let start = Instant::now();
        let token_count = message.token_count.map_or(0, i64::from);
        let now = Utc::now();
        let message = message.into_message(now)?;

        let state = self
            .backend
            .fetch_version_state(tenant_id, id)
            .await?
            .ok_or_else(|| ConversationError::not_found(id))?;

        if state.message_count >= MAX_MESSAGES as i64 {
            return Err(ConversationError::Full {
                id: id.to_owned(),
                limit: MAX_MESSAGES,
            });
        }
        if state.version != expected_version {
            return Err(Self::conflict(tenant_id, id, "add_message", expected_version, state.version));
        }

        match self
            .backend
            .append_message_if_current(tenant_id, id, expected_version, &message, token_count, now)
            .await?
        {
            Some(conversation) => {
                TenantLogger::log_store_operation(
                    tenant_id,
                    id,
                    "add_message",
                    Some(conversation.version),
                    elapsed_ms(start),
                );
                Ok(conversation)
            }
            None => Err(self
                .classify_guard_miss(tenant_id, id, "add_message", expected_version)
                .await),
        }
    }

    /// Replace the title if the conversation is still at `expected_version`
    ///
    /// `None` clears the title.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank title
    /// - `NotFound` if the conversation is not visible to the tenant
    /// - `Conflict` when another writer advanced the version
    /// - `Backend` on storage failure
    #[instrument(skip(self, title), fields(tenant_id = %tenant_id))]
    pub async fn update_title(
        &self,
        id: &str,
        tenant_id: TenantId,
        title: Option<&str>,
        expected_version: i64,
    ) -> StoreResult<Conversation> {
        let start = Instant::now();
        let title = match title.map(str::trim) {
            Some("") => return Err(ConversationError::validation("title must not be blank")),
            other => other,
        };

        match self
            .backend
            .update_title_if_current(tenant_id, id, expected_version, title, Utc::now())
            .await?
        {
            Some(conversation) => {
                TenantLogger::log_store_operation(
                    tenant_id,
                    id,
                    "update_title",
                    Some(conversation.version),
                    elapsed_ms(start),
                );
                Ok(conversation)
            }
            None => Err(self
                .classify_guard_miss(tenant_id, id, "update_title", expected_version)
                .await),
        }
    }

    /// List a user's conversations, most recently updated first
    ///
    /// `limit` is clamped to `1..=100` (defaulting to 20 when `None`) and a
    /// negative `offset` is treated as 0.
    ///
    /// # Errors
    ///
    /// Returns `Backend` on storage failure
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id, user_id = %filter.user_id))]
    pub async fn list_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> StoreResult<Vec<ConversationSummary>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.max(0);
        Ok(self
            .backend
            .list_by_user(tenant_id, filter, limit, offset)
            .await?)
    }

    /// Count a user's conversations with the same filter as [`Self::list_by_user`]
    ///
    /// # Errors
    ///
    /// Returns `Backend` on storage failure
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id, user_id = %filter.user_id))]
    pub async fn count_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
    ) -> StoreResult<i64> {
        Ok(self.backend.count_by_user(tenant_id, filter).await?)
    }

    /// Hard delete; returns whether a row was removed
    ///
    /// # Errors
    ///
    /// Returns `Backend` on storage failure
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn delete(&self, id: &str, tenant_id: TenantId) -> StoreResult<bool> {
        let start = Instant::now();
        let deleted = self.backend.delete_conversation(tenant_id, id).await?;
        if deleted {
            TenantLogger::log_store_operation(tenant_id, id, "delete", None, elapsed_ms(start));
        }
        Ok(deleted)
    }

    /// Freeze a conversation and continue its thread in a fresh one
    ///
    /// The archived row keeps its messages and version; its `app_context` gains
    /// the archive suffix and its title is annotated. The successor starts at
    /// version 1 with a single system message embedding `summary`. Both writes
    /// commit together or not at all.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank summary or an already archived conversation
    /// - `NotFound` if the conversation is not visible to the tenant
    /// - `Conflict` if the conversation changed while rotating
    /// - `Backend` on storage failure
    #[instrument(skip(self, summary), fields(tenant_id = %tenant_id))]
    pub async fn archive_and_rotate(
        &self,
        id: &str,
        tenant_id: TenantId,
        summary: &str,
    ) -> StoreResult<Conversation> {
        let start = Instant::now();
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(ConversationError::validation("summary text is required"));
        }

        let current = self.get(id, tenant_id).await?;
        if current.is_archived() {
            return Err(ConversationError::validation(format!(
                "conversation {id} is already archived"
            )));
        }

        let plan = RotationPlan::new(&current, summary, Utc::now());
        if let Some(successor) = self.backend.archive_and_rotate(tenant_id, &plan).await? {
            TenantLogger::log_rotation(
                tenant_id,
                id,
                &successor.id,
                current.message_count(),
                elapsed_ms(start),
            );
            return Ok(successor);
        }

        match self.backend.fetch_conversation(tenant_id, id).await? {
            None => Err(ConversationError::not_found(id)),
            Some(latest) if latest.is_archived() => Err(ConversationError::validation(format!(
                "conversation {id} is already archived"
            ))),
            Some(latest) => Err(Self::conflict(
                tenant_id,
                id,
                "archive_and_rotate",
                plan.expected_version,
                latest.version,
            )),
        }
    }

    /// Decide why a version-guarded statement matched no row
    async fn classify_guard_miss(
        &self,
        tenant_id: TenantId,
        id: &str,
        operation: &str,
        expected_version: i64,
    ) -> ConversationError {
        match self.backend.fetch_version_state(tenant_id, id).await {
            Ok(Some(state)) => {
                Self::conflict(tenant_id, id, operation, expected_version, state.version)
            }
            Ok(None) => ConversationError::not_found(id),
            Err(e) => ConversationError::Backend(e),
        }
    }

    fn conflict(
        tenant_id: TenantId,
        id: &str,
        operation: &str,
        expected_version: i64,
        current_version: i64,
    ) -> ConversationError {
        TenantLogger::log_version_conflict(
            tenant_id,
            id,
            operation,
            expected_version,
            current_version,
        );
        ConversationError::Conflict {
            id: id.to_owned(),
            expected_version,
            current_version,
        }
    }
}
