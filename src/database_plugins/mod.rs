// ABOUTME: Storage abstraction for tenant-scoped conversation logs
// ABOUTME: Backend trait with SQLite and PostgreSQL implementations selected by the factory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Storage backends for the conversation store
//!
//! Every method takes the caller's [`TenantId`] and scopes its statements by it.
//! Mutating methods are single conditional statements guarded by the caller's
//! expected version; they return `None` when the guard matched no row and leave
//! the classification (absent vs. stale) to the store.

use crate::constants::{
    ARCHIVE_CONTEXT_SUFFIX, ARCHIVE_DEFAULT_TITLE, ARCHIVE_TITLE_SUFFIX, INITIAL_VERSION,
    ROTATION_SUMMARY_PREFIX,
};
use crate::errors::AppResult;
use crate::models::{
    Conversation, ConversationFilter, ConversationSummary, Message, MessageRole, TenantId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Runtime backend selection
pub mod factory;
/// Helpers shared by the `SQLite` and `PostgreSQL` backends
pub mod shared;
/// `SQLite` backend
pub mod sqlite;

/// `PostgreSQL` backend with row-level security
#[cfg(feature = "postgresql")]
pub mod postgres;

/// Version and size of a conversation, read without taking a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionState {
    /// Current optimistic concurrency version
    pub version: i64,
    /// Number of stored messages
    pub message_count: i64,
}

/// Everything the backend needs to archive a conversation and insert its successor
#[derive(Debug, Clone)]
pub struct RotationPlan {
    /// Conversation being archived
    pub conversation_id: String,
    /// Version observed before the transaction; the archival update is guarded by it
    pub expected_version: i64,
    /// `app_context` observed before the transaction; guards against double archival
    pub original_app_context: String,
    /// `app_context` written to the archived row
    pub archived_app_context: String,
    /// Title written to the archived row
    pub archived_title: String,
    /// Fresh conversation continuing the thread
    pub successor: Conversation,
}

impl RotationPlan {
    /// Plan the rotation of `current`, seeding the successor with `summary`
    #[must_use]
    pub fn new(current: &Conversation, summary: &str, now: DateTime<Utc>) -> Self {
        let archived_title = current.title.as_deref().map_or_else(
            || ARCHIVE_DEFAULT_TITLE.to_owned(),
            |title| format!("{title}{ARCHIVE_TITLE_SUFFIX}"),
        );

        let successor = Conversation {
            id: Uuid::new_v4().to_string(),
            tenant_id: current.tenant_id,
            user_id: current.user_id.clone(),
            title: current.title.clone(),
            model: current.model.clone(),
            app_context: current.app_context.clone(),
            messages: vec![Message {
                role: MessageRole::System,
                content: format!("{ROTATION_SUMMARY_PREFIX}{summary}"),
                timestamp: now,
            }],
            tokens_used: 0,
            version: INITIAL_VERSION,
            created_at: now,
            updated_at: now,
        };

        Self {
            conversation_id: current.id.clone(),
            expected_version: current.version,
            original_app_context: current.app_context.clone(),
            archived_app_context: format!("{}{ARCHIVE_CONTEXT_SUFFIX}", current.app_context),
            archived_title,
            successor,
        }
    }
}

/// Relational collaborator behind the conversation store
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Create tables, indexes, and (where supported) row-level security policies
    async fn migrate(&self) -> AppResult<()>;

    /// Insert a new conversation row
    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()>;

    /// Fetch one conversation scoped to the tenant
    async fn fetch_conversation(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<Conversation>>;

    /// Read the version and message count without locking the row
    async fn fetch_version_state(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<VersionState>>;

    /// Append `message` and advance the version if it still equals `expected_version`
    ///
    /// Returns the updated conversation, or `None` when no row matched the guard.
    async fn append_message_if_current(
        &self,
        tenant_id: TenantId,
        id: &str,
        expected_version: i64,
        message: &Message,
        token_count: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Conversation>>;

    /// Replace the title and advance the version if it still equals `expected_version`
    ///
    /// Returns the updated conversation, or `None` when no row matched the guard.
    async fn update_title_if_current(
        &self,
        tenant_id: TenantId,
        id: &str,
        expected_version: i64,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Conversation>>;

    /// List conversation summaries, most recently updated first
    async fn list_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>>;

    /// Count conversations matching the filter
    async fn count_by_user(&self, tenant_id: TenantId, filter: &ConversationFilter)
        -> AppResult<i64>;

    /// Hard delete; returns whether a row was removed
    async fn delete_conversation(&self, tenant_id: TenantId, id: &str) -> AppResult<bool>;

    /// Archive the current row and insert the successor in one transaction
    ///
    /// Returns the successor, or `None` when the archival guard matched no row
    /// (absent, modified, or already archived); nothing is written in that case.
    async fn archive_and_rotate(
        &self,
        tenant_id: TenantId,
        plan: &RotationPlan,
    ) -> AppResult<Option<Conversation>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewConversation;

    fn conversation(title: Option<&str>) -> Conversation {
        let mut conversation = Conversation::new(
            TenantId::new(),
            NewConversation {
                user_id: "user-1".into(),
                app_context: "support".into(),
                title: title.map(str::to_owned),
                model: "gpt-4o".into(),
            },
            Utc::now(),
        );
        conversation.version = 101;
        conversation
    }

    #[test]
    fn test_rotation_plan_marks_archive_and_seeds_successor() {
        let current = conversation(Some("Billing"));
        let plan = RotationPlan::new(&current, "User billing complaint", Utc::now());

        assert_eq!(plan.archived_app_context, "support_archived");
        assert_eq!(plan.archived_title, "Billing (archived)");
        assert_eq!(plan.expected_version, 101);
        assert_eq!(plan.original_app_context, "support");

        let successor = &plan.successor;
        assert_ne!(successor.id, current.id);
        assert_eq!(successor.version, 1);
        assert_eq!(successor.app_context, "support");
        assert_eq!(successor.messages.len(), 1);
        assert_eq!(successor.messages[0].role, MessageRole::System);
        assert!(successor.messages[0]
            .content
            .contains("User billing complaint"));
    }

    #[test]
    fn test_rotation_plan_default_archived_title() {
        let plan = RotationPlan::new(&conversation(None), "summary", Utc::now());
        assert_eq!(plan.archived_title, "Archived conversation");
    }
}
