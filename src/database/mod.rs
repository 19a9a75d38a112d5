// ABOUTME: Tenant conversation store built on the pluggable storage backends
// ABOUTME: Optimistic versioning, message cap enforcement, and archive-and-rotate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Conversation Storage
//!
//! [`ConversationStore`] is the only entry point callers use for persistence. It
//! validates input, enforces the message cap before any write, maps zero-row
//! conditional updates onto typed conflicts, and never retries on its own.

/// Tenant conversation store
pub mod conversations;

pub use conversations::ConversationStore;
