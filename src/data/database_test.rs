//! Database tests

use super::*;
use crate::identity::IdentityKeys;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn test_conversation(numbers: &str) -> Conversation {
    let participants: Vec<String> = numbers.split(", ").map(str::to_string).collect();
    let keys = IdentityKeys::from_participants(&participants);
    Conversation::new(
        numbers.to_string(),
        keys.default_key().to_string(),
        numbers.to_string(),
    )
}

fn received(conversation_id: i64, body: &str, timestamp: i64) -> Message {
    let mut message = Message::new(
        MessageKind::Received,
        body.to_string(),
        MIME_TEXT_PLAIN.to_string(),
        timestamp,
    );
    message.conversation_id = conversation_id;
    message
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_identity_lookup_round_trip() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.insert_conversation(&conversation).await.unwrap();

    // Same number, different formatting, must hit the same row.
    let keys = IdentityKeys::from_participants(&["(515) 555-1234".to_string()]);
    let found = db.find_conversation_by_identity(&keys).await.unwrap();
    assert_eq!(found, Some(conversation.id));

    // Unrelated number must miss.
    let keys = IdentityKeys::from_participants(&["5155559999".to_string()]);
    assert!(db.find_conversation_by_identity(&keys).await.unwrap().is_none());
}

#[tokio::test]
async fn test_identity_lookup_is_order_invariant() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234, 5154440000");
    db.insert_conversation(&conversation).await.unwrap();

    let reversed = IdentityKeys::from_participants(&[
        "515-444-0000".to_string(),
        "515-555-1234".to_string(),
    ]);
    let found = db.find_conversation_by_identity(&reversed).await.unwrap();
    assert_eq!(found, Some(conversation.id));
}

#[tokio::test]
async fn test_persist_message_creates_conversation_and_summary() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    let message = received(0, "hi", 1_000);

    let conversation_id = db
        .persist_message(ConversationTarget::Create(&conversation), &message)
        .await
        .unwrap();
    assert_eq!(conversation_id, conversation.id);

    let stored = db.get_conversation(conversation_id).await.unwrap().unwrap();
    assert_eq!(stored.snippet, "hi");
    assert_eq!(stored.timestamp, 1_000);
    assert!(!stored.read);
}

#[tokio::test]
async fn test_outgoing_message_prefixes_snippet_and_marks_read() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.persist_message(
        ConversationTarget::Create(&conversation),
        &received(0, "hi", 1_000),
    )
    .await
    .unwrap();

    let sent = Message::new(
        MessageKind::Sent,
        "ok".to_string(),
        MIME_TEXT_PLAIN.to_string(),
        2_000,
    );
    db.persist_message(ConversationTarget::Existing(conversation.id), &sent)
        .await
        .unwrap();

    let stored = db.get_conversation(conversation.id).await.unwrap().unwrap();
    assert_eq!(stored.snippet, "You: ok");
    assert_eq!(stored.timestamp, 2_000);
    assert!(stored.read);
}

#[tokio::test]
async fn test_media_message_leaves_summary_untouched() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.persist_message(
        ConversationTarget::Create(&conversation),
        &received(0, "hi", 1_000),
    )
    .await
    .unwrap();

    let media = Message::new(
        MessageKind::Media,
        "content://media/42".to_string(),
        "image/jpeg".to_string(),
        5_000,
    );
    db.persist_message(ConversationTarget::Existing(conversation.id), &media)
        .await
        .unwrap();

    let stored = db.get_conversation(conversation.id).await.unwrap().unwrap();
    assert_eq!(stored.snippet, "hi");
    assert_eq!(stored.timestamp, 1_000);
}

#[tokio::test]
async fn test_non_plain_text_blanks_snippet_but_advances_summary() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.persist_message(
        ConversationTarget::Create(&conversation),
        &received(0, "hi", 1_000),
    )
    .await
    .unwrap();

    let mms = Message::new(
        MessageKind::Received,
        "content://mms/7".to_string(),
        "image/png".to_string(),
        3_000,
    );
    db.persist_message(ConversationTarget::Existing(conversation.id), &mms)
        .await
        .unwrap();

    let stored = db.get_conversation(conversation.id).await.unwrap().unwrap();
    assert_eq!(stored.snippet, "");
    assert_eq!(stored.timestamp, 3_000);
}

#[tokio::test]
async fn test_unarchived_partition_orders_pinned_first() {
    let (db, _temp_dir) = create_test_db().await;

    let mut old_pinned = test_conversation("5155550001");
    old_pinned.pinned = true;
    old_pinned.timestamp = 1_000;
    let mut recent = test_conversation("5155550002");
    recent.timestamp = 9_000;
    let mut archived = test_conversation("5155550003");
    archived.archived = true;
    archived.timestamp = 10_000;

    db.insert_conversation(&old_pinned).await.unwrap();
    db.insert_conversation(&recent).await.unwrap();
    db.insert_conversation(&archived).await.unwrap();

    let unarchived = db.get_unarchived_conversations().await.unwrap();
    let ids: Vec<i64> = unarchived.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![old_pinned.id, recent.id]);

    let archived_rows = db.get_archived_conversations().await.unwrap();
    assert_eq!(archived_rows.len(), 1);
    assert_eq!(archived_rows[0].id, archived.id);
}

#[tokio::test]
async fn test_unread_badge_excludes_muted_but_list_keeps_them() {
    let (db, _temp_dir) = create_test_db().await;

    let unread = test_conversation("5155550001");
    let mut muted_unread = test_conversation("5155550002");
    muted_unread.muted = true;
    let mut read = test_conversation("5155550003");
    read.read = true;

    db.insert_conversation(&unread).await.unwrap();
    db.insert_conversation(&muted_unread).await.unwrap();
    db.insert_conversation(&read).await.unwrap();

    let list = db.get_unread_conversations().await.unwrap();
    let ids: Vec<i64> = list.iter().map(|c| c.id).collect();
    assert!(ids.contains(&unread.id));
    assert!(ids.contains(&muted_unread.id));

    assert_eq!(db.unread_conversation_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_mark_conversation_read() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.persist_message(
        ConversationTarget::Create(&conversation),
        &received(0, "hi", 1_000),
    )
    .await
    .unwrap();

    db.mark_conversation_read(conversation.id).await.unwrap();

    let stored = db.get_conversation(conversation.id).await.unwrap().unwrap();
    assert!(stored.read);
    let latest = db.latest_message(conversation.id).await.unwrap().unwrap();
    assert!(latest.read);
    assert!(latest.seen);
}

#[tokio::test]
async fn test_failed_batch_leaves_no_ghost_conversation() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    let first = received(conversation.id, "hi", 1_000);
    // Second row clashes on the primary key and fails the batch.
    let mut clash = received(conversation.id, "again", 2_000);
    clash.id = first.id;

    let result = db
        .insert_message_batch(std::slice::from_ref(&conversation), &[first, clash])
        .await;
    assert!(result.is_err());

    // The conversation created inside the batch must roll back with it.
    assert!(db.get_conversation(conversation.id).await.unwrap().is_none());
    assert!(db
        .get_message_page(conversation.id, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_batch_commits_conversations_with_their_messages() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    let message = received(conversation.id, "hi", 1_000);

    db.insert_message_batch(std::slice::from_ref(&conversation), &[message])
        .await
        .unwrap();

    let stored = db.get_conversation(conversation.id).await.unwrap().unwrap();
    assert_eq!(stored.snippet, "hi");
    assert_eq!(db.get_message_page(conversation.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_mark_all_read_covers_every_conversation() {
    let (db, _temp_dir) = create_test_db().await;

    for number in ["5155550001", "5155550002"] {
        let conversation = test_conversation(number);
        db.persist_message(
            ConversationTarget::Create(&conversation),
            &received(0, "hi", 1_000),
        )
        .await
        .unwrap();
    }
    assert_eq!(db.unread_conversation_count().await.unwrap(), 2);

    db.mark_all_read().await.unwrap();

    assert_eq!(db.unread_conversation_count().await.unwrap(), 0);
    for conversation in db.get_unarchived_conversations().await.unwrap() {
        assert!(conversation.read);
        let latest = db.latest_message(conversation.id).await.unwrap().unwrap();
        assert!(latest.read);
        assert!(latest.seen);
    }
}

#[tokio::test]
async fn test_message_page_returns_tail_in_ascending_order() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.insert_conversation(&conversation).await.unwrap();

    for ts in 1..=5 {
        db.insert_message(&received(conversation.id, &format!("m{}", ts), ts))
            .await
            .unwrap();
    }

    let page = db.get_message_page(conversation.id, 3).await.unwrap();
    let timestamps: Vec<i64> = page.iter().map(|m| m.timestamp).collect();
    assert_eq!(timestamps, vec![3, 4, 5]);

    // Limit larger than the conversation returns everything.
    let all = db.get_message_page(conversation.id, 50).await.unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn test_body_search_filters_mime_and_joins_title() {
    let (db, _temp_dir) = create_test_db().await;

    let mut conversation = test_conversation("5155551234");
    conversation.title = "Alice".to_string();
    db.insert_conversation(&conversation).await.unwrap();

    db.insert_message(&received(conversation.id, "lunch tomorrow?", 1_000))
        .await
        .unwrap();
    let mut media = Message::new(
        MessageKind::Media,
        "lunch.png".to_string(),
        "image/png".to_string(),
        2_000,
    );
    media.conversation_id = conversation.id;
    db.insert_message(&media).await.unwrap();

    let hits = db.search_messages_by_body("LUNCH").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].conversation_title, "Alice");
    assert_eq!(hits[0].data, "lunch tomorrow?");
}

#[tokio::test]
async fn test_title_search_is_case_insensitive() {
    let (db, _temp_dir) = create_test_db().await;

    let mut conversation = test_conversation("5155551234");
    conversation.title = "Project Falcon".to_string();
    db.insert_conversation(&conversation).await.unwrap();

    let hits = db.search_conversations_by_title("falcon").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(db.search_conversations_by_title("eagle").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_conversation_cascades_messages() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    let message = received(0, "hi", 1_000);
    db.persist_message(ConversationTarget::Create(&conversation), &message)
        .await
        .unwrap();

    db.delete_conversation(conversation.id).await.unwrap();

    assert!(db.get_conversation(conversation.id).await.unwrap().is_none());
    assert!(db.get_message(message.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_older_than_sweeps_messages_and_conversations() {
    let (db, _temp_dir) = create_test_db().await;

    let old = test_conversation("5155550001");
    db.persist_message(ConversationTarget::Create(&old), &received(0, "old", 1_000))
        .await
        .unwrap();
    let fresh = test_conversation("5155550002");
    db.persist_message(
        ConversationTarget::Create(&fresh),
        &received(0, "fresh", 50_000),
    )
    .await
    .unwrap();

    let deleted = db.delete_older_than(10_000).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(db.get_conversation(old.id).await.unwrap().is_none());
    assert!(db.get_conversation(fresh.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_message_kind_and_data_updates() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.insert_conversation(&conversation).await.unwrap();

    let mut sending = Message::new(
        MessageKind::Sending,
        "on my way".to_string(),
        MIME_TEXT_PLAIN.to_string(),
        1_000,
    );
    sending.conversation_id = conversation.id;
    db.insert_message(&sending).await.unwrap();

    db.update_message_kind(sending.id, MessageKind::Delivered)
        .await
        .unwrap();
    db.update_message_data(sending.id, "content://media/9")
        .await
        .unwrap();

    let stored = db.get_message(sending.id).await.unwrap().unwrap();
    assert_eq!(stored.kind, MessageKind::Delivered);
    assert_eq!(stored.data, "content://media/9");
}

#[tokio::test]
async fn test_blacklist_crud() {
    let (db, _temp_dir) = create_test_db().await;

    let entry = BlacklistEntry::by_number("5155551234".to_string());
    db.insert_blacklist_entry(&entry).await.unwrap();

    let entries = db.get_blacklist_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].phone_number.as_deref(), Some("5155551234"));

    db.delete_blacklist_entry(entry.id).await.unwrap();
    assert!(db.get_blacklist_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_handle_survives_explicit_close() {
    let (db, _temp_dir) = create_test_db().await;

    let conversation = test_conversation("5155551234");
    db.insert_conversation(&conversation).await.unwrap();

    // Closing the handle must not poison it: the next statement
    // lazily reopens the pool.
    db.close().await;

    let stored = db.get_conversation(conversation.id).await.unwrap();
    assert!(stored.is_some());
}
