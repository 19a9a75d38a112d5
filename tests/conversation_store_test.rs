// ABOUTME: Integration tests for the tenant-scoped conversation store over in-memory SQLite
// ABOUTME: Covers version guards, concurrent writers, the message cap, rotation, and tenant isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

mod common;

use bounded_chat::constants::{MAX_MESSAGES, ROTATION_SUMMARY_PREFIX};
use bounded_chat::errors::ConversationError;
use bounded_chat::models::{
    ConversationFilter, MessageRole, NewConversation, NewMessage, TenantId,
};
use common::{create_counting_store, create_test_conversation, create_test_store, new_conversation};

fn user_message(content: &str) -> NewMessage {
    NewMessage::new(MessageRole::User, content)
}

#[tokio::test]
async fn test_create_and_get() {
    let store = create_test_store().await.unwrap();
    let tenant = TenantId::new();

    let created = store
        .create(
            tenant,
            NewConversation {
                title: Some("Onboarding".into()),
                ..new_conversation("user-1", "support")
            },
        )
        .await
        .unwrap();
    assert_eq!(created.version, 1);
    assert!(created.messages.is_empty());

    let fetched = store.get(&created.id, tenant).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.tenant_id, tenant);
    assert_eq!(fetched.title.as_deref(), Some("Onboarding"));
    assert_eq!(fetched.version, 1);
}

#[tokio::test]
async fn test_create_rejects_blank_user() {
    let store = create_test_store().await.unwrap();
    let result = store
        .create(TenantId::new(), new_conversation("  ", "support"))
        .await;
    assert!(matches!(result, Err(ConversationError::Validation(_))));
}

#[tokio::test]
async fn test_every_mutation_advances_version() {
    let store = create_test_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();

    let after_append = store
        .add_message(
            &conversation.id,
            tenant,
            user_message("hello").with_token_count(12),
            1,
        )
        .await
        .unwrap();
    assert_eq!(after_append.version, 2);
    assert_eq!(after_append.messages.len(), 1);
    assert_eq!(after_append.tokens_used, 12);
    assert!(after_append.updated_at >= conversation.updated_at);

    let after_title = store
        .update_title(&conversation.id, tenant, Some("Greeting"), 2)
        .await
        .unwrap();
    assert_eq!(after_title.version, 3);
    assert_eq!(after_title.title.as_deref(), Some("Greeting"));

    let after_clear = store
        .update_title(&conversation.id, tenant, None, 3)
        .await
        .unwrap();
    assert_eq!(after_clear.version, 4);
    assert!(after_clear.title.is_none());
    assert_eq!(after_clear.messages.len(), 1);
}

#[tokio::test]
async fn test_stale_version_conflicts_without_mutation() {
    let (store, counting) = create_counting_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();
    store
        .add_message(&conversation.id, tenant, user_message("first"), 1)
        .await
        .unwrap();

    let stale = store
        .add_message(&conversation.id, tenant, user_message("second"), 1)
        .await;
    match stale {
        Err(ConversationError::Conflict {
            expected_version,
            current_version,
            ..
        }) => {
            assert_eq!(expected_version, 1);
            assert_eq!(current_version, 2);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let stale_title = store
        .update_title(&conversation.id, tenant, Some("Renamed"), 1)
        .await
        .unwrap_err();
    assert!(stale_title.is_retryable());
    assert_eq!(stale_title.current_version(), Some(2));

    let current = store.get(&conversation.id, tenant).await.unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.messages.len(), 1);
    assert!(current.title.is_none());
    assert_eq!(counting.appends(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_exactly_one_wins() {
    let store = create_test_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();

    let mut handles = Vec::new();
    for writer in 0..8 {
        let store = store.clone();
        let id = conversation.id.clone();
        handles.push(tokio::spawn(async move {
            store
                .add_message(&id, tenant, user_message(&format!("writer {writer}")), 1)
                .await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(updated) => {
                assert_eq!(updated.version, 2);
                successes += 1;
            }
            Err(ConversationError::Conflict {
                current_version, ..
            }) => {
                assert_eq!(current_version, 2);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    let stored = store.get(&conversation.id, tenant).await.unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.messages.len(), 1);
}

#[tokio::test]
async fn test_full_conversation_rejects_append_without_writing() {
    let (store, counting) = create_counting_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();

    let mut version = conversation.version;
    for i in 0..MAX_MESSAGES {
        let updated = store
            .add_message(
                &conversation.id,
                tenant,
                user_message(&format!("message {i}")),
                version,
            )
            .await
            .unwrap();
        version = updated.version;
    }
    assert_eq!(counting.appends(), MAX_MESSAGES);

    let result = store
        .add_message(&conversation.id, tenant, user_message("one too many"), version)
        .await;
    assert!(matches!(
        result,
        Err(ConversationError::Full { limit, .. }) if limit == MAX_MESSAGES
    ));
    assert_eq!(counting.appends(), MAX_MESSAGES);

    let stored = store.get(&conversation.id, tenant).await.unwrap();
    assert!(stored.is_full());
    assert_eq!(stored.version, version);
}

#[tokio::test]
async fn test_archive_and_rotate_full_conversation() {
    let store = create_test_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = store
        .create(
            tenant,
            NewConversation {
                title: Some("Billing".into()),
                ..new_conversation("user-7", "support")
            },
        )
        .await
        .unwrap();

    let mut full = conversation.clone();
    for i in 0..MAX_MESSAGES {
        full = store
            .add_message(
                &conversation.id,
                tenant,
                user_message(&format!("charge question {i}")),
                full.version,
            )
            .await
            .unwrap();
    }
    assert!(full.is_full());

    let successor = store
        .archive_and_rotate(&conversation.id, tenant, "User billing complaint")
        .await
        .unwrap();

    assert_ne!(successor.id, conversation.id);
    assert_eq!(successor.version, 1);
    assert_eq!(successor.title.as_deref(), Some("Billing"));
    assert_eq!(successor.app_context, "support");
    assert_eq!(successor.user_id, "user-7");
    assert_eq!(successor.model, conversation.model);
    assert_eq!(successor.messages.len(), 1);
    assert_eq!(successor.messages[0].role, MessageRole::System);
    assert_eq!(
        successor.messages[0].content,
        format!("{ROTATION_SUMMARY_PREFIX}User billing complaint")
    );

    let archived = store.get(&conversation.id, tenant).await.unwrap();
    assert!(archived.is_archived());
    assert_eq!(archived.app_context, "support_archived");
    assert_eq!(archived.title.as_deref(), Some("Billing (archived)"));
    assert_eq!(archived.version, full.version);
    assert_eq!(archived.messages.len(), MAX_MESSAGES);
    assert_eq!(archived.messages, full.messages);

    let again = store
        .archive_and_rotate(&conversation.id, tenant, "again")
        .await;
    assert!(matches!(again, Err(ConversationError::Validation(_))));

    let active = store
        .list_by_user(
            tenant,
            &ConversationFilter::for_user("user-7").with_app_context("support"),
            None,
            0,
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, successor.id);
    assert_eq!(active[0].message_count, 1);
}

#[tokio::test]
async fn test_archive_untitled_conversation_gets_default_title() {
    let store = create_test_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();

    let successor = store
        .archive_and_rotate(&conversation.id, tenant, "Short chat about shipping")
        .await
        .unwrap();
    assert!(successor.title.is_none());

    let archived = store.get(&conversation.id, tenant).await.unwrap();
    assert_eq!(archived.title.as_deref(), Some("Archived conversation"));
    assert_eq!(archived.version, 1);
}

#[tokio::test]
async fn test_archive_rejects_blank_summary_and_unknown_id() {
    let (store, counting) = create_counting_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();

    let blank = store.archive_and_rotate(&conversation.id, tenant, "   ").await;
    assert!(matches!(blank, Err(ConversationError::Validation(_))));

    let missing = store.archive_and_rotate("missing", tenant, "summary").await;
    assert!(matches!(missing, Err(ConversationError::NotFound { .. })));
    assert_eq!(counting.rotations(), 0);
}

#[tokio::test]
async fn test_tenants_cannot_see_each_other() {
    let store = create_test_store().await.unwrap();
    let owner = TenantId::new();
    let intruder = TenantId::new();
    let conversation = create_test_conversation(&store, owner, "shared-user").await.unwrap();

    assert!(matches!(
        store.get(&conversation.id, intruder).await,
        Err(ConversationError::NotFound { .. })
    ));
    assert!(matches!(
        store
            .add_message(&conversation.id, intruder, user_message("hi"), 1)
            .await,
        Err(ConversationError::NotFound { .. })
    ));
    assert!(matches!(
        store
            .update_title(&conversation.id, intruder, Some("mine"), 1)
            .await,
        Err(ConversationError::NotFound { .. })
    ));
    assert!(matches!(
        store.archive_and_rotate(&conversation.id, intruder, "summary").await,
        Err(ConversationError::NotFound { .. })
    ));
    assert!(!store.delete(&conversation.id, intruder).await.unwrap());

    let filter = ConversationFilter::for_user("shared-user");
    assert!(store
        .list_by_user(intruder, &filter, None, 0)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.count_by_user(intruder, &filter).await.unwrap(), 0);

    let untouched = store.get(&conversation.id, owner).await.unwrap();
    assert_eq!(untouched.version, 1);
    assert!(untouched.messages.is_empty());
}

#[tokio::test]
async fn test_list_count_and_pagination() {
    let store = create_test_store().await.unwrap();
    let tenant = TenantId::new();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            create_test_conversation(&store, tenant, "user-1")
                .await
                .unwrap()
                .id,
        );
    }
    store
        .create(tenant, new_conversation("user-1", "billing"))
        .await
        .unwrap();
    create_test_conversation(&store, tenant, "user-2").await.unwrap();

    // touching the first conversation moves it to the front
    store
        .add_message(&ids[0], tenant, user_message("bump"), 1)
        .await
        .unwrap();

    let filter = ConversationFilter::for_user("user-1");
    assert_eq!(store.count_by_user(tenant, &filter).await.unwrap(), 4);

    let support = filter.clone().with_app_context("support");
    assert_eq!(store.count_by_user(tenant, &support).await.unwrap(), 3);

    let page = store.list_by_user(tenant, &support, Some(2), 0).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, ids[0]);
    assert_eq!(page[0].message_count, 1);
    assert_eq!(page[0].version, 2);

    let rest = store.list_by_user(tenant, &support, Some(2), 2).await.unwrap();
    assert_eq!(rest.len(), 1);

    let clamped = store.list_by_user(tenant, &filter, Some(0), -5).await.unwrap();
    assert_eq!(clamped.len(), 1);
}

#[tokio::test]
async fn test_delete_removes_conversation() {
    let store = create_test_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();

    assert!(store.delete(&conversation.id, tenant).await.unwrap());
    assert!(!store.delete(&conversation.id, tenant).await.unwrap());
    assert!(matches!(
        store.get(&conversation.id, tenant).await,
        Err(ConversationError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_append_validation_and_missing_conversation() {
    let (store, counting) = create_counting_store().await.unwrap();
    let tenant = TenantId::new();
    let conversation = create_test_conversation(&store, tenant, "user-1").await.unwrap();

    let blank = store
        .add_message(&conversation.id, tenant, user_message("  "), 1)
        .await;
    assert!(matches!(blank, Err(ConversationError::Validation(_))));

    let missing = store
        .add_message("does-not-exist", tenant, user_message("hi"), 1)
        .await;
    assert!(matches!(missing, Err(ConversationError::NotFound { .. })));

    let blank_title = store
        .update_title(&conversation.id, tenant, Some(" "), 1)
        .await;
    assert!(matches!(blank_title, Err(ConversationError::Validation(_))));
    assert_eq!(counting.writes(), 0);
}
