// ABOUTME: Model to SQL row conversion helpers for conversation storage
// ABOUTME: Generic row parsing plus JSON message column encoding shared by both backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Row mapping shared by the `SQLite` and `PostgreSQL` backends
//!
//! Both backends hand back the same column names: `tenant_id` and `messages` as
//! text (the `PostgreSQL` queries cast them), timestamps as `DateTime<Utc>`.

use crate::errors::{AppError, AppResult};
use crate::models::{Conversation, ConversationSummary, Message, TenantId};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};

/// Fixed-width UTC timestamp so stored text sorts chronologically
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serialize one message for appending to the JSON message column
///
/// # Errors
///
/// Returns a serialization error if the message cannot be encoded
pub fn encode_message(message: &Message) -> AppResult<String> {
    serde_json::to_string(message)
        .map_err(|e| AppError::serialization(format!("Failed to encode message: {e}")))
}

/// Serialize a full message log
///
/// # Errors
///
/// Returns a serialization error if a message cannot be encoded
pub fn encode_messages(messages: &[Message]) -> AppResult<String> {
    serde_json::to_string(messages)
        .map_err(|e| AppError::serialization(format!("Failed to encode messages: {e}")))
}

/// Decode the JSON message column
///
/// # Errors
///
/// Returns a serialization error if the stored JSON is not a message array
pub fn decode_messages(raw: &str) -> AppResult<Vec<Message>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::serialization(format!("Failed to decode messages column: {e}")))
}

fn column<'r, R, T>(row: &'r R, name: &str) -> AppResult<T>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(name)
        .map_err(|e| AppError::database(format!("Failed to get column '{name}': {e}")))
}

fn parse_tenant_id(raw: &str) -> AppResult<TenantId> {
    raw.parse()
        .map_err(|e| AppError::database(format!("Invalid tenant_id '{raw}' in row: {e}")))
}

/// Parse a full conversation from a database row (database-agnostic)
///
/// # Errors
///
/// Returns an error if a column is missing, has the wrong type, or the message
/// column does not hold a message array
pub fn parse_conversation_from_row<R>(row: &R) -> AppResult<Conversation>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    Option<String>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    i64: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    DateTime<Utc>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    let tenant_id: String = column(row, "tenant_id")?;
    let messages: String = column(row, "messages")?;

    Ok(Conversation {
        id: column(row, "id")?,
        tenant_id: parse_tenant_id(&tenant_id)?,
        user_id: column(row, "user_id")?,
        title: column(row, "title")?,
        model: column(row, "model")?,
        app_context: column(row, "app_context")?,
        messages: decode_messages(&messages)?,
        tokens_used: column(row, "tokens_used")?,
        version: column(row, "version")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Parse a listing entry from a database row (database-agnostic)
///
/// # Errors
///
/// Returns an error if a column is missing or has the wrong type
pub fn parse_summary_from_row<R>(row: &R) -> AppResult<ConversationSummary>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    Option<String>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    i64: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    DateTime<Utc>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    Ok(ConversationSummary {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        title: column(row, "title")?,
        model: column(row, "model")?,
        app_context: column(row, "app_context")?,
        message_count: column(row, "message_count")?,
        tokens_used: column(row, "tokens_used")?,
        version: column(row, "version")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(format_timestamp(later), "2025-01-10T00:00:00.000000Z");
    }

    #[test]
    fn test_message_column_decoding() {
        let stored = r#"[{"role":"user","content":"hello","timestamp":"2025-01-10T00:00:00.000000Z"}]"#;
        let messages = decode_messages(stored).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);

        let err = decode_messages(r#"{"role":"user"}"#).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::SerializationError);
    }
}
