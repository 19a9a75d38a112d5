// ABOUTME: Re-export of the unified error types from the core crate
// ABOUTME: Keeps `crate::errors` paths stable for store, backend, and optimizer modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use bounded_chat_core::errors::*;
