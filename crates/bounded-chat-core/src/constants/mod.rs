// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Storage limits, archive markers, and chat-format token accounting values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by the subsystem that owns them rather than living in a
//! single flat namespace.

/// Conversation storage limits and archive markers
pub mod storage;
/// Token accounting and context budget constants
pub mod tokens;

pub use storage::*;
