// ABOUTME: Main library entry point for the bounded conversational state engine
// ABOUTME: Tenant-isolated, versioned conversation storage and LLM context window optimization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Bounded Chat
//!
//! Two cooperating components that keep an append-only message log bounded:
//!
//! - **Conversation store** ([`database::ConversationStore`]): persists conversations
//!   as versioned logs capped at 100 messages, scoped to a tenant, mutated only
//!   through optimistic version-guarded updates, and continued through
//!   archive-and-rotate once full.
//! - **Context window optimizer** ([`context::ContextWindowOptimizer`]): fits a
//!   conversation plus system prompt and retrieved context into a model's token
//!   budget using importance trimming, summarization, and truncation as a last resort.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bounded_chat::config::EngineConfig;
//! use bounded_chat::database::ConversationStore;
//! use bounded_chat::database_plugins::factory::Database;
//! use bounded_chat::models::{NewConversation, TenantId};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let store = ConversationStore::new(Database::new(&config.database).await?.into_shared());
//!
//! let conversation = store
//!     .create(
//!         TenantId::new(),
//!         NewConversation {
//!             user_id: "user-1".into(),
//!             app_context: "support".into(),
//!             title: None,
//!             model: "gpt-4o".into(),
//!         },
//!     )
//!     .await?;
//! assert_eq!(conversation.version, 1);
//! # Ok(())
//! # }
//! ```

/// Configuration loaded from environment variables
pub mod config;

/// Storage and token accounting constants
pub mod constants;

/// Context window optimization: tokenizer, scorer, compression, optimizer
pub mod context;

/// Tenant conversation store
pub mod database;

/// Storage backend abstraction with `SQLite` and `PostgreSQL` implementations
pub mod database_plugins;

/// Unified error handling system with standard error codes
pub mod errors;

/// Summarization service contract and OpenAI-compatible client
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// Conversation and tenant domain models
pub mod models;
