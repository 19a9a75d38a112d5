// ABOUTME: Heuristic message importance scoring used to rank messages for trimming
// ABOUTME: Rewards user turns, longer messages, code blocks, and questions; system messages score 1.0
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::tokenizer::Tokenizer;
use crate::constants::tokens::BASE_IMPORTANCE;
use crate::models::{Message, MessageRole};

const USER_BONUS: f64 = 0.1;
const LONG_MESSAGE_WORDS: usize = 50;
const LONG_MESSAGE_BONUS: f64 = 0.2;
const MEDIUM_MESSAGE_WORDS: usize = 20;
const MEDIUM_MESSAGE_BONUS: f64 = 0.1;
const CODE_BLOCK_BONUS: f64 = 0.2;
const QUESTION_BONUS: f64 = 0.1;

/// Message annotated with its position, cost, and importance
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMessage {
    /// Position in the original list
    pub index: usize,
    /// Message role
    pub role: MessageRole,
    /// Chat-format token cost
    pub tokens: usize,
    /// Importance in `[0.0, 1.0]`
    pub importance: f64,
}

/// Stateless importance heuristics
pub struct MessageScorer;

impl MessageScorer {
    /// Importance of a single message
    #[must_use]
    pub fn importance(message: &Message) -> f64 {
        if message.role == MessageRole::System {
            return 1.0;
        }

        let mut score = BASE_IMPORTANCE;
        if message.role == MessageRole::User {
            score += USER_BONUS;
        }

        let words = message.content.split_whitespace().count();
        if words > LONG_MESSAGE_WORDS {
            score += LONG_MESSAGE_BONUS;
        } else if words > MEDIUM_MESSAGE_WORDS {
            score += MEDIUM_MESSAGE_BONUS;
        }

        if message.content.contains("```") {
            score += CODE_BLOCK_BONUS;
        }
        if message.content.contains('?') {
            score += QUESTION_BONUS;
        }

        score.min(1.0)
    }
}

/// Score every message in order
#[must_use]
pub fn score_messages(messages: &[Message], tokenizer: &Tokenizer) -> Vec<ScoredMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| ScoredMessage {
            index,
            role: message.role,
            tokens: tokenizer.count_message(message),
            importance: MessageScorer::importance(message),
        })
        .collect()
}
