// ABOUTME: Tenant-aware logging utilities for conversation store and optimizer events
// ABOUTME: Emits structured events carrying tenant, conversation, version, and timing fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::models::TenantId;
use tracing::{debug, info, warn, Level};

/// Context for logging one optimizer call
pub struct OptimizationLogContext<'a> {
    /// Target model
    pub model: &'a str,
    /// Conversation messages received
    pub original_count: usize,
    /// Conversation messages returned, excluding the combined system prompt
    pub optimized_count: usize,
    /// Tokens in the returned message list
    pub total_tokens: usize,
    /// Budget after reserving the response
    pub available_tokens: usize,
    /// Outcome label (unchanged, trimmed, summarized, degraded)
    pub outcome: &'a str,
    /// Whether the result fell back to truncation
    pub degraded: bool,
    /// Whether a synopsis from the summarization service was spliced in
    pub summary_used: bool,
    /// Call duration in milliseconds
    pub duration_ms: u64,
}

impl OptimizationLogContext<'_> {
    /// Level the result is reported at; truncation fallbacks warn
    #[must_use]
    pub const fn level(&self) -> Level {
        if self.degraded {
            Level::WARN
        } else {
            Level::DEBUG
        }
    }
}

/// Tenant-aware logging utilities
pub struct TenantLogger;

impl TenantLogger {
    /// Log a completed store operation
    pub fn log_store_operation(
        tenant_id: TenantId,
        conversation_id: &str,
        operation: &str,
        version: Option<i64>,
        duration_ms: u64,
    ) {
        debug!(
            tenant_id = %tenant_id,
            conversation_id = %conversation_id,
            operation = %operation,
            version = ?version,
            duration_ms = %duration_ms,
            event_type = "store_operation",
            "Conversation store operation completed"
        );
    }

    /// Log an optimistic concurrency conflict
    pub fn log_version_conflict(
        tenant_id: TenantId,
        conversation_id: &str,
        operation: &str,
        expected_version: i64,
        current_version: i64,
    ) {
        warn!(
            tenant_id = %tenant_id,
            conversation_id = %conversation_id,
            operation = %operation,
            expected_version = %expected_version,
            current_version = %current_version,
            event_type = "version_conflict",
            "Conversation modified concurrently"
        );
    }

    /// Log an archive-and-rotate
    pub fn log_rotation(
        tenant_id: TenantId,
        archived_id: &str,
        successor_id: &str,
        archived_messages: usize,
        duration_ms: u64,
    ) {
        info!(
            tenant_id = %tenant_id,
            conversation_id = %archived_id,
            successor_id = %successor_id,
            archived_messages = %archived_messages,
            duration_ms = %duration_ms,
            event_type = "conversation_rotation",
            "Conversation archived and rotated"
        );
    }

    /// Log the result of fitting a conversation into a context window
    pub fn log_optimization(context: &OptimizationLogContext) {
        if context.level() == Level::WARN {
            warn!(
                model = %context.model,
                original_count = %context.original_count,
                optimized_count = %context.optimized_count,
                total_tokens = %context.total_tokens,
                available_tokens = %context.available_tokens,
                outcome = %context.outcome,
                summary_used = %context.summary_used,
                duration_ms = %context.duration_ms,
                event_type = "context_optimization",
                "Context compression degraded to truncation"
            );
        } else {
            debug!(
                model = %context.model,
                original_count = %context.original_count,
                optimized_count = %context.optimized_count,
                total_tokens = %context.total_tokens,
                available_tokens = %context.available_tokens,
                outcome = %context.outcome,
                summary_used = %context.summary_used,
                duration_ms = %context.duration_ms,
                event_type = "context_optimization",
                "Context window optimized"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(outcome: &str, degraded: bool) -> OptimizationLogContext<'_> {
        OptimizationLogContext {
            model: "gpt-4o",
            original_count: 12,
            optimized_count: 5,
            total_tokens: 900,
            available_tokens: 1024,
            outcome,
            degraded,
            summary_used: false,
            duration_ms: 3,
        }
    }

    #[test]
    fn test_degraded_optimization_warns() {
        assert_eq!(context("degraded", true).level(), Level::WARN);
    }

    #[test]
    fn test_level_follows_flag_not_label() {
        assert_eq!(context("trimmed", false).level(), Level::DEBUG);
        assert_eq!(context("DEGRADED", false).level(), Level::DEBUG);
    }
}
