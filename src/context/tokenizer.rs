// ABOUTME: Model-aware BPE token counting and truncation using tiktoken-rs
// ABOUTME: Chat-format accounting (+4 per message, -1 with name, +2 per list) for every encoding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Token counting
//!
//! BPE tables are built once per process and shared. If a table cannot be
//! built the tokenizer falls back to a four-characters-per-token estimate
//! rather than failing the caller.

use crate::constants::tokens::{
    FALLBACK_CHARS_PER_TOKEN, NAME_ADJUSTMENT, REPLY_PRIMING_TOKENS, TOKENS_PER_MESSAGE,
};
use crate::models::{Message, MessageRole};
use std::sync::OnceLock;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};
use tracing::warn;

/// BPE encoding family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// GPT-4o, GPT-4.1, and the o-series reasoning models
    O200kBase,
    /// GPT-3.5, GPT-4, and the default for non-OpenAI models
    Cl100kBase,
}

impl Encoding {
    /// Encoding used for a model identifier
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        let model = model.rsplit('/').next().unwrap_or(&model);
        let is_o200k = ["gpt-4o", "gpt-4.1", "chatgpt-4o", "o1", "o3", "o4"]
            .iter()
            .any(|prefix| model.starts_with(prefix));
        if is_o200k {
            Self::O200kBase
        } else {
            Self::Cl100kBase
        }
    }

    /// Canonical encoding name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::O200kBase => "o200k_base",
            Self::Cl100kBase => "cl100k_base",
        }
    }
}

fn load_table(encoding: Encoding) -> Option<&'static CoreBPE> {
    static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();

    let (cell, build): (_, fn() -> anyhow::Result<CoreBPE>) = match encoding {
        Encoding::O200kBase => (&O200K, o200k_base),
        Encoding::Cl100kBase => (&CL100K, cl100k_base),
    };
    cell.get_or_init(|| match build() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            warn!(
                encoding = encoding.name(),
                error = %e,
                "Failed to load BPE table, falling back to character estimate"
            );
            None
        }
    })
    .as_ref()
}

/// Token counter bound to one encoding
#[derive(Clone, Copy)]
pub struct Tokenizer {
    encoding: Encoding,
    bpe: Option<&'static CoreBPE>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("encoding", &self.encoding)
            .field("exact", &self.is_exact())
            .finish()
    }
}

impl Tokenizer {
    /// Tokenizer for a model identifier
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        Self::with_encoding(Encoding::for_model(model))
    }

    /// Tokenizer for an explicit encoding
    #[must_use]
    pub fn with_encoding(encoding: Encoding) -> Self {
        Self {
            encoding,
            bpe: load_table(encoding),
        }
    }

    /// Character-estimate tokenizer that never loads a BPE table
    #[must_use]
    pub const fn estimate_only(encoding: Encoding) -> Self {
        Self {
            encoding,
            bpe: None,
        }
    }

    /// Encoding in use
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Whether counts come from a real BPE table
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.bpe.is_some()
    }

    /// Tokens in a string
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        match self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.chars().count().div_ceil(FALLBACK_CHARS_PER_TOKEN),
        }
    }

    /// Chat-format cost of one message given its parts
    #[must_use]
    pub fn count_parts(&self, role: MessageRole, content: &str, name: Option<&str>) -> usize {
        let base = TOKENS_PER_MESSAGE + self.count(role.as_str()) + self.count(content);
        match name {
            Some(name) => (base + self.count(name)).saturating_add_signed(NAME_ADJUSTMENT),
            None => base,
        }
    }

    /// Chat-format cost of one message
    #[must_use]
    pub fn count_message(&self, message: &Message) -> usize {
        self.count_parts(message.role, &message.content, None)
    }

    /// Chat-format cost of a message list, including reply priming
    ///
    /// An empty list costs nothing.
    #[must_use]
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        if messages.is_empty() {
            return 0;
        }
        messages
            .iter()
            .map(|message| self.count_message(message))
            .sum::<usize>()
            + REPLY_PRIMING_TOKENS
    }

    /// Keep the leading `max_tokens` tokens of `text`
    ///
    /// The result re-encodes to at most `max_tokens` tokens. Token boundaries
    /// that split a multi-byte character are moved back until the prefix
    /// decodes cleanly.
    #[must_use]
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if max_tokens == 0 {
            return String::new();
        }
        let Some(bpe) = self.bpe else {
            return text
                .chars()
                .take(max_tokens * FALLBACK_CHARS_PER_TOKEN)
                .collect();
        };

        let tokens = bpe.encode_with_special_tokens(text);
        if tokens.len() <= max_tokens {
            return text.to_owned();
        }

        let mut keep = max_tokens;
        while keep > 0 {
            if let Ok(prefix) = bpe.decode(tokens[..keep].to_vec()) {
                if self.count(&prefix) <= max_tokens {
                    return prefix;
                }
            }
            keep -= 1;
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_selection() {
        assert_eq!(Encoding::for_model("gpt-4o-mini"), Encoding::O200kBase);
        assert_eq!(Encoding::for_model("o3-mini"), Encoding::O200kBase);
        assert_eq!(Encoding::for_model("openai/gpt-4.1"), Encoding::O200kBase);
        assert_eq!(Encoding::for_model("gpt-4"), Encoding::Cl100kBase);
        assert_eq!(Encoding::for_model("claude-3-5-sonnet"), Encoding::Cl100kBase);
    }

    #[test]
    fn test_count_basic() {
        let tokenizer = Tokenizer::for_model("gpt-4");
        let hello = tokenizer.count("hello");
        assert!((1..=3).contains(&hello), "expected 1-3 tokens, got {hello}");
        assert_eq!(tokenizer.count(""), 0);
    }

    #[test]
    fn test_message_overheads() {
        let tokenizer = Tokenizer::for_model("gpt-4");
        let content_tokens = tokenizer.count("hi there");
        let role_tokens = tokenizer.count("user");

        let plain = tokenizer.count_parts(MessageRole::User, "hi there", None);
        assert_eq!(plain, 4 + role_tokens + content_tokens);

        let named = tokenizer.count_parts(MessageRole::User, "hi there", Some("alice"));
        assert_eq!(named, plain + tokenizer.count("alice") - 1);

        let list = vec![Message::user("hi there"), Message::assistant("hello")];
        let expected = tokenizer.count_message(&list[0]) + tokenizer.count_message(&list[1]) + 2;
        assert_eq!(tokenizer.count_messages(&list), expected);
        assert_eq!(tokenizer.count_messages(&[]), 0);
    }

    #[test]
    fn test_truncate_respects_budget() {
        let tokenizer = Tokenizer::for_model("gpt-4o");
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(50);
        for budget in [1, 7, 33, 100] {
            let truncated = tokenizer.truncate(&text, budget);
            assert!(tokenizer.count(&truncated) <= budget);
            assert!(text.starts_with(&truncated));
        }
        assert_eq!(tokenizer.truncate("short", 100), "short");
        assert_eq!(tokenizer.truncate("anything", 0), "");
    }

    #[test]
    fn test_truncate_multibyte_text() {
        let tokenizer = Tokenizer::for_model("gpt-4");
        let text = "日本語のテキストと絵文字🎉🎉🎉が混在しています。".repeat(10);
        for budget in 1..20 {
            let truncated = tokenizer.truncate(&text, budget);
            assert!(tokenizer.count(&truncated) <= budget);
            assert!(text.starts_with(&truncated));
        }
    }

    #[test]
    fn test_estimate_only_fallback() {
        let tokenizer = Tokenizer::estimate_only(Encoding::Cl100kBase);
        assert!(!tokenizer.is_exact());
        assert_eq!(tokenizer.count("abcdefgh"), 2);
        assert_eq!(tokenizer.count("abcdefghi"), 3);
        assert_eq!(tokenizer.truncate("abcdefghijkl", 2), "abcdefgh");
    }
}
