// ABOUTME: Shared database logic for PostgreSQL and SQLite implementations
// ABOUTME: Row mapping, message column encoding, and transaction guards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Row to model conversion and message column encoding
pub mod mappers;

/// RAII transaction guard
pub mod transactions;
