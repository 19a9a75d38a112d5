// ABOUTME: Re-export of storage and token accounting constants from the core crate
// ABOUTME: Message cap, archive markers, list limits, and chat-format token overheads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use bounded_chat_core::constants::*;
