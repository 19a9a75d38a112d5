// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging, in-memory stores, a write-counting backend, and summarizer doubles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `bounded_chat`

use anyhow::Result;
use async_trait::async_trait;
use bounded_chat::{
    config::DatabaseConfig,
    database::ConversationStore,
    database_plugins::{factory::Database, ConversationBackend, RotationPlan, VersionState},
    errors::{AppError, AppResult},
    llm::SummarizationService,
    models::{
        Conversation, ConversationFilter, ConversationSummary, Message, NewConversation, TenantId,
    },
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Fresh in-memory backend with the schema applied
pub async fn create_test_backend() -> Result<Arc<dyn ConversationBackend>> {
    init_test_logging();
    let database = Database::new(&DatabaseConfig::in_memory()).await?;
    Ok(database.into_shared())
}

/// Store over a fresh in-memory backend
pub async fn create_test_store() -> Result<ConversationStore> {
    Ok(ConversationStore::new(create_test_backend().await?))
}

/// Store whose backend counts write attempts
pub async fn create_counting_store() -> Result<(ConversationStore, Arc<CountingBackend>)> {
    let counting = Arc::new(CountingBackend::new(create_test_backend().await?));
    let store = ConversationStore::new(counting.clone());
    Ok((store, counting))
}

/// Standard conversation request
pub fn new_conversation(user_id: &str, app_context: &str) -> NewConversation {
    NewConversation {
        user_id: user_id.to_owned(),
        app_context: app_context.to_owned(),
        title: None,
        model: "gpt-4o".to_owned(),
    }
}

/// Create a conversation in `tenant_id` for `user_id`
pub async fn create_test_conversation(
    store: &ConversationStore,
    tenant_id: TenantId,
    user_id: &str,
) -> Result<Conversation> {
    Ok(store
        .create(tenant_id, new_conversation(user_id, "support"))
        .await?)
}

// ============================================================================
// Write-counting backend
// ============================================================================

/// Delegating backend that counts conditional write attempts
pub struct CountingBackend {
    inner: Arc<dyn ConversationBackend>,
    appends: AtomicUsize,
    title_updates: AtomicUsize,
    rotations: AtomicUsize,
}

impl CountingBackend {
    pub fn new(inner: Arc<dyn ConversationBackend>) -> Self {
        Self {
            inner,
            appends: AtomicUsize::new(0),
            title_updates: AtomicUsize::new(0),
            rotations: AtomicUsize::new(0),
        }
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn title_updates(&self) -> usize {
        self.title_updates.load(Ordering::SeqCst)
    }

    pub fn rotations(&self) -> usize {
        self.rotations.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.appends() + self.title_updates() + self.rotations()
    }
}

#[async_trait]
impl ConversationBackend for CountingBackend {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn migrate(&self) -> AppResult<()> {
        self.inner.migrate().await
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        self.inner.insert_conversation(conversation).await
    }

    async fn fetch_conversation(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<Conversation>> {
        self.inner.fetch_conversation(tenant_id, id).await
    }

    async fn fetch_version_state(
        &self,
        tenant_id: TenantId,
        id: &str,
    ) -> AppResult<Option<VersionState>> {
        self.inner.fetch_version_state(tenant_id, id).await
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
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner
            .append_message_if_current(tenant_id, id, expected_version, message, token_count, now)
            .await
    }

    async fn update_title_if_current(
        &self,
        tenant_id: TenantId,
        id: &str,
        expected_version: i64,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Conversation>> {
        self.title_updates.fetch_add(1, Ordering::SeqCst);
        self.inner
            .update_title_if_current(tenant_id, id, expected_version, title, now)
            .await
    }

    async fn list_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        self.inner.list_by_user(tenant_id, filter, limit, offset).await
    }

    async fn count_by_user(
        &self,
        tenant_id: TenantId,
        filter: &ConversationFilter,
    ) -> AppResult<i64> {
        self.inner.count_by_user(tenant_id, filter).await
    }

    async fn delete_conversation(&self, tenant_id: TenantId, id: &str) -> AppResult<bool> {
        self.inner.delete_conversation(tenant_id, id).await
    }

    async fn archive_and_rotate(
        &self,
        tenant_id: TenantId,
        plan: &RotationPlan,
    ) -> AppResult<Option<Conversation>> {
        self.rotations.fetch_add(1, Ordering::SeqCst);
        self.inner.archive_and_rotate(tenant_id, plan).await
    }
}

// ============================================================================
// Summarizer doubles
// ============================================================================

/// Summarizer that returns a fixed reply and records every request
pub struct ScriptedSummarizer {
    reply: String,
    requests: Mutex<Vec<(String, usize)>>,
}

impl ScriptedSummarizer {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map_or(0, |requests| requests.len())
    }

    /// Transcripts received, in call order
    pub fn transcripts(&self) -> Vec<String> {
        self.requests.lock().map_or_else(
            |_| Vec::new(),
            |requests| requests.iter().map(|(text, _)| text.clone()).collect(),
        )
    }
}

#[async_trait]
impl SummarizationService for ScriptedSummarizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn summarize(&self, text: &str, max_output_tokens: usize) -> AppResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((text.to_owned(), max_output_tokens));
        }
        Ok(self.reply.clone())
    }
}

/// Summarizer whose every call fails as an unavailable upstream
#[derive(Default)]
pub struct FailingSummarizer {
    calls: AtomicUsize,
}

impl FailingSummarizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummarizationService for FailingSummarizer {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn summarize(&self, _text: &str, _max_output_tokens: usize) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::external_unavailable(
            "summarizer",
            "upstream returned 503",
        ))
    }
}
