// ABOUTME: Conversation storage limits, pagination bounds, and archive markers
// ABOUTME: Shared by every storage backend so all of them enforce identical caps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Hard cap on the number of messages a single conversation may hold
pub const MAX_MESSAGES: usize = 100;

/// Version assigned to every newly created conversation
pub const INITIAL_VERSION: i64 = 1;

/// Suffix appended to `app_context` when a conversation is archived
pub const ARCHIVE_CONTEXT_SUFFIX: &str = "_archived";

/// Suffix appended to the title of an archived conversation
pub const ARCHIVE_TITLE_SUFFIX: &str = " (archived)";

/// Title given to an archived conversation that never had one
pub const ARCHIVE_DEFAULT_TITLE: &str = "Archived conversation";

/// Prefix of the system message that seeds a rotated conversation
pub const ROTATION_SUMMARY_PREFIX: &str = "Summary of previous conversation: ";

/// Default page size for conversation listings
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Largest page size a listing may request
pub const MAX_LIST_LIMIT: i64 = 100;
