// ABOUTME: Conversation and message models for tenant-scoped, versioned chat logs
// ABOUTME: Defines the persisted Conversation, append-only Message, and listing DTOs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::TenantId;
use crate::constants::{ARCHIVE_CONTEXT_SUFFIX, INITIAL_VERSION, MAX_MESSAGES};
use crate::errors::ConversationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Messages
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "" => Err(ConversationError::validation("message role is required")),
            other => Err(ConversationError::validation(format!(
                "unknown message role '{other}'"
            ))),
        }
    }
}

/// A single message in a conversation log
///
/// Messages are immutable once appended and have no identity outside the
/// conversation that owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// When the message was written
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Append request for a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Message text; must not be blank
    pub content: String,
    /// Client-supplied timestamp, defaulted server-side when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Tokens consumed producing this message, added to `tokens_used`
    #[serde(default)]
    pub token_count: Option<u32>,
}

impl NewMessage {
    /// Create an append request without timestamp or token count
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
            token_count: None,
        }
    }

    /// Set an explicit timestamp
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the token count charged for this message
    #[must_use]
    pub const fn with_token_count(mut self, tokens: u32) -> Self {
        self.token_count = Some(tokens);
        self
    }

    /// Check the request and build the message to persist
    ///
    /// # Errors
    ///
    /// Returns `ConversationError::Validation` if the content is blank
    pub fn into_message(self, now: DateTime<Utc>) -> Result<Message, ConversationError> {
        if self.content.trim().is_empty() {
            return Err(ConversationError::validation(
                "message content is required",
            ));
        }
        Ok(Message {
            role: self.role,
            content: self.content,
            timestamp: self.timestamp.unwrap_or(now),
        })
    }
}

// ============================================================================
// Conversations
// ============================================================================

/// Input for creating a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    /// Owning user within the tenant
    pub user_id: String,
    /// Tag used for filtering and archival state
    pub app_context: String,
    /// Optional display title
    pub title: Option<String>,
    /// Target LLM identifier
    pub model: String,
}

/// A versioned, bounded, append-only message log owned by one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Opaque unique identifier
    pub id: String,
    /// Owning tenant; every access is scoped by this value
    pub tenant_id: TenantId,
    /// Owning user within the tenant
    pub user_id: String,
    /// Optional, mutable title
    pub title: Option<String>,
    /// Target LLM identifier
    pub model: String,
    /// Tag used for filtering and archival state
    pub app_context: String,
    /// Messages in chronological order
    pub messages: Vec<Message>,
    /// Running token counter (informational)
    pub tokens_used: i64,
    /// Optimistic concurrency version, starts at 1
    pub version: i64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a fresh, empty conversation at version 1
    #[must_use]
    pub fn new(tenant_id: TenantId, request: NewConversation, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            user_id: request.user_id,
            title: request.title,
            model: request.model,
            app_context: request.app_context,
            messages: Vec::new(),
            tokens_used: 0,
            version: INITIAL_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of messages in the log
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log reached the message cap
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.messages.len() >= MAX_MESSAGES
    }

    /// Whether the conversation was frozen by archive-and-rotate
    #[must_use]
    pub fn is_archived(&self) -> bool {
        is_archived_context(&self.app_context)
    }

    /// Most recent message, if any
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Whether an `app_context` tag carries the archive suffix
#[must_use]
pub fn is_archived_context(app_context: &str) -> bool {
    app_context.ends_with(ARCHIVE_CONTEXT_SUFFIX)
}

/// Conversation listing entry; carries a message count instead of the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Conversation title
    pub title: Option<String>,
    /// LLM model used
    pub model: String,
    /// Filtering/archival tag
    pub app_context: String,
    /// Number of messages in the conversation
    pub message_count: i64,
    /// Total tokens used
    pub tokens_used: i64,
    /// Current version
    pub version: i64,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated
    pub updated_at: DateTime<Utc>,
}

/// Filter shared by conversation listing and counting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationFilter {
    /// Owning user
    pub user_id: String,
    /// Restrict to an exact `app_context` tag
    pub app_context: Option<String>,
}

impl ConversationFilter {
    /// Filter on a user only
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            app_context: None,
        }
    }

    /// Additionally restrict to an `app_context` tag
    #[must_use]
    pub fn with_app_context(mut self, app_context: impl Into<String>) -> Self {
        self.app_context = Some(app_context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("User".parse::<MessageRole>().unwrap(), MessageRole::User);
        assert_eq!(
            " assistant ".parse::<MessageRole>().unwrap(),
            MessageRole::Assistant
        );
        assert!(matches!(
            "tool".parse::<MessageRole>(),
            Err(ConversationError::Validation(_))
        ));
        assert!("".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_new_message_defaults_timestamp() {
        let now = Utc::now();
        let message = NewMessage::new(MessageRole::User, "hi")
            .into_message(now)
            .unwrap();
        assert_eq!(message.timestamp, now);
        assert_eq!(message.content, "hi");
    }

    #[test]
    fn test_new_message_keeps_client_timestamp() {
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let message = NewMessage::new(MessageRole::User, "hi")
            .with_timestamp(earlier)
            .into_message(Utc::now())
            .unwrap();
        assert_eq!(message.timestamp, earlier);
    }

    #[test]
    fn test_blank_content_is_rejected() {
        let result = NewMessage::new(MessageRole::User, "   ").into_message(Utc::now());
        assert!(matches!(result, Err(ConversationError::Validation(_))));
    }

    #[test]
    fn test_new_conversation_starts_at_version_one() {
        let conversation = Conversation::new(
            TenantId::new(),
            NewConversation {
                user_id: "user-1".into(),
                app_context: "support".into(),
                title: None,
                model: "gpt-4o".into(),
            },
            Utc::now(),
        );
        assert_eq!(conversation.version, 1);
        assert!(conversation.messages.is_empty());
        assert!(!conversation.is_full());
        assert!(!conversation.is_archived());
    }

    #[test]
    fn test_archived_context_detection() {
        assert!(is_archived_context("support_archived"));
        assert!(!is_archived_context("support"));
    }
}
