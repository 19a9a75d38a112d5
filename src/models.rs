// ABOUTME: Re-export of conversation and tenant domain models from the core crate
// ABOUTME: Conversation, Message, summaries, filters, and the TenantId newtype
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use bounded_chat_core::models::*;
