// ABOUTME: Typed conversation store errors that callers are expected to handle
// ABOUTME: NotFound, Conflict, Full, and Validation are recoverable; Backend is fatal for the call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{AppError, ErrorCode};
use serde_json::json;
use thiserror::Error;

/// Errors returned by every conversation store operation
///
/// `NotFound` deliberately does not distinguish "absent" from "owned by another
/// tenant" so callers cannot discover foreign conversations.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The conversation does not exist for the caller's tenant
    #[error("conversation {id} not found")]
    NotFound {
        /// Conversation ID that was requested
        id: String,
    },

    /// Another writer advanced the version since the caller last read it
    #[error(
        "conversation {id} was modified concurrently: expected version {expected_version}, current version {current_version}"
    )]
    Conflict {
        /// Conversation ID
        id: String,
        /// Version the caller presented
        expected_version: i64,
        /// Version currently stored
        current_version: i64,
    },

    /// The conversation reached its message cap and must be archived first
    #[error("conversation {id} holds the maximum of {limit} messages; archive it before appending")]
    Full {
        /// Conversation ID
        id: String,
        /// Message cap that was reached
        limit: usize,
    },

    /// The request was malformed
    #[error("validation failed: {0}")]
    Validation(String),

    /// The storage backend failed; propagated unchanged
    #[error(transparent)]
    Backend(#[from] AppError),
}

impl ConversationError {
    /// Build a `NotFound` error for the given ID
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Build a `Validation` error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether re-fetching and retrying can resolve this error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Version currently stored, when the error carries one
    #[must_use]
    pub const fn current_version(&self) -> Option<i64> {
        match self {
            Self::Conflict {
                current_version, ..
            } => Some(*current_version),
            _ => None,
        }
    }

    /// Error code this error maps onto
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::ResourceNotFound,
            Self::Conflict { .. } => ErrorCode::VersionConflict,
            Self::Full { .. } => ErrorCode::CapacityExceeded,
            Self::Validation(_) => ErrorCode::InvalidInput,
            Self::Backend(e) => e.code,
        }
    }
}

impl From<ConversationError> for AppError {
    fn from(error: ConversationError) -> Self {
        match error {
            ConversationError::Backend(inner) => inner,
            ConversationError::Conflict {
                ref id,
                expected_version,
                current_version,
            } => Self::new(ErrorCode::VersionConflict, error.to_string())
                .with_resource_id(id.clone())
                .with_details(json!({
                    "expected_version": expected_version,
                    "current_version": current_version,
                })),
            ConversationError::Full { ref id, limit } => {
                Self::new(ErrorCode::CapacityExceeded, error.to_string())
                    .with_resource_id(id.clone())
                    .with_details(json!({ "limit": limit }))
            }
            ConversationError::NotFound { ref id } => {
                Self::new(ErrorCode::ResourceNotFound, error.to_string())
                    .with_resource_id(id.clone())
            }
            ConversationError::Validation(message) => Self::invalid_input(message),
        }
    }
}
