// ABOUTME: Prompts for the summarization service loaded at compile time
// ABOUTME: System instruction plus the transcript framing used when compressing history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Summarization Prompts
//!
//! The system prompt lives in a markdown file so it can be edited without
//! touching code.

/// System prompt instructing concise preservation of key points and decisions
pub const SUMMARIZE_SYSTEM_PROMPT: &str = include_str!("summarize_system.md");

/// Frame a transcript for the summarization request
#[must_use]
pub fn summarize_user_prompt(transcript: &str, max_output_tokens: usize) -> String {
    format!(
        "Summarize the following conversation in at most {max_output_tokens} tokens.\n\n\
         <transcript>\n{transcript}\n</transcript>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_mentions_decisions() {
        assert!(SUMMARIZE_SYSTEM_PROMPT.contains("decisions"));
    }

    #[test]
    fn test_user_prompt_embeds_transcript_and_cap() {
        let prompt = summarize_user_prompt("user: hi", 200);
        assert!(prompt.contains("200 tokens"));
        assert!(prompt.contains("user: hi"));
    }
}
