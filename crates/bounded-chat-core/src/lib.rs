// ABOUTME: Core types and constants for the bounded conversational state engine
// ABOUTME: Foundation crate with error taxonomy, tenant and conversation models, and limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Bounded Chat Core
//!
//! Foundation crate shared by the conversation store and the context window
//! optimizer. It is designed to change infrequently so the rest of the
//! workspace benefits from incremental compilation.
//!
//! ## Modules
//!
//! - **errors**: `AppError`, `ErrorCode`, and the typed `ConversationError`
//! - **constants**: Storage limits, archive markers, and token accounting constants
//! - **models**: `TenantId`, `Conversation`, `Message`, and related DTOs

/// Unified error handling system with standard error codes
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (tenants, conversations, messages)
pub mod models;
