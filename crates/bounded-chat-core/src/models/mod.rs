// ABOUTME: Core data models shared by the conversation store and the context optimizer
// ABOUTME: Re-exports tenant identifiers and conversation/message types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Conversation, message, and listing DTOs
pub mod conversation;
/// Type-safe tenant identifier
pub mod tenant;

pub use conversation::{
    is_archived_context, Conversation, ConversationFilter, ConversationSummary, Message,
    MessageRole, NewConversation, NewMessage,
};
pub use tenant::TenantId;
