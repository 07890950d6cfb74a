//! Message service
//!
//! Query and mutation surface over the message table. Inserts keep the
//! owning conversation's denormalized summary consistent; read-state
//! changes and kind progressions are mirrored best-effort.

use std::sync::Arc;

use crate::data::{
    ConversationTarget, Database, Message, MessageKind, MessageSearchResult, generate_id,
};
use crate::error::Result;
use crate::mirror::{RemoteMirror, spawn_best_effort};

/// Message store surface
pub struct MessageService {
    db: Arc<Database>,
    mirror: Arc<RemoteMirror>,
}

impl MessageService {
    pub fn new(db: Arc<Database>, mirror: Arc<RemoteMirror>) -> Self {
        Self { db, mirror }
    }

    /// Insert a message into an existing conversation, assigning an ID
    /// if the caller left it zero.
    ///
    /// The conversation summary is updated in the same transaction
    /// unless the message is a Media placeholder.
    pub async fn insert(&self, conversation_id: i64, mut message: Message) -> Result<i64> {
        if message.id == 0 {
            message.id = generate_id();
        }
        self.db
            .persist_message(ConversationTarget::Existing(conversation_id), &message)
            .await?;

        let id = message.id;
        let mirror = self.mirror.clone();
        spawn_best_effort(async move { mirror.added_message(conversation_id, &message).await });
        Ok(id)
    }

    /// Bulk import: one transaction, per-row summary updates.
    ///
    /// Every message must already carry its resolved `conversation_id`.
    pub async fn insert_batch(&self, messages: &[Message]) -> Result<()> {
        self.db.insert_message_batch(&[], messages).await?;

        for message in messages {
            let mirror = self.mirror.clone();
            let mirrored = message.clone();
            spawn_best_effort(async move {
                mirror.added_message(mirrored.conversation_id, &mirrored).await
            });
        }
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Message>> {
        self.db.get_message(id).await
    }

    /// Most recent `limit` messages in ascending delivery order.
    pub async fn get_page(&self, conversation_id: i64, limit: i64) -> Result<Vec<Message>> {
        self.db.get_message_page(conversation_id, limit).await
    }

    pub async fn media(&self, conversation_id: i64) -> Result<Vec<Message>> {
        self.db.get_media_messages(conversation_id).await
    }

    /// Plain-text body search joined with conversation titles.
    pub async fn search_by_body(&self, query: &str) -> Result<Vec<MessageSearchResult>> {
        self.db.search_messages_by_body(query).await
    }

    pub async fn mark_read(&self, conversation_id: i64) -> Result<()> {
        self.db.mark_conversation_read(conversation_id).await?;

        let mirror = self.mirror.clone();
        spawn_best_effort(async move { mirror.marked_read(conversation_id).await });
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.db.mark_all_read().await
    }

    pub async fn mark_seen(&self, conversation_id: i64) -> Result<()> {
        self.db.mark_conversation_seen(conversation_id).await
    }

    /// Progress a message through sending -> sent/delivered/error.
    pub async fn update_kind(&self, id: i64, kind: MessageKind) -> Result<()> {
        self.db.update_message_kind(id, kind).await?;

        let mirror = self.mirror.clone();
        spawn_best_effort(async move { mirror.updated_message_kind(id, kind).await });
        Ok(())
    }

    /// Backfill a media placeholder with the real media URI.
    pub async fn update_data(&self, id: i64, data: &str) -> Result<()> {
        self.db.update_message_data(id, data).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.db.delete_message(id).await
    }

    /// Age-based cleanup; sweeps matching conversations too.
    pub async fn delete_older_than(&self, timestamp: i64) -> Result<u64> {
        let deleted = self.db.delete_older_than(timestamp).await?;
        if deleted > 0 {
            tracing::info!(deleted, cutoff = timestamp, "cleaned up old messages");
        }
        Ok(deleted)
    }

    /// Retention sweep: delete everything with no activity in `days` days.
    pub async fn clean_old(&self, days: i64) -> Result<u64> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days)).timestamp_millis();
        self.delete_older_than(cutoff).await
    }
}
