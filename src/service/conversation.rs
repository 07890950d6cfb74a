//! Conversation service
//!
//! Query and mutation surface over the conversation table. Every
//! mutation is mirrored to the sync backend on a best-effort basis
//! after the local write commits.

use std::sync::Arc;

use crate::data::{Conversation, Database};
use crate::error::{Result, StoreError};
use crate::identity::{IdentityKeys, join_participants};
use crate::mirror::{RemoteMirror, spawn_best_effort};

/// Conversation store surface
pub struct ConversationService {
    db: Arc<Database>,
    mirror: Arc<RemoteMirror>,
}

impl ConversationService {
    pub fn new(db: Arc<Database>, mirror: Arc<RemoteMirror>) -> Self {
        Self { db, mirror }
    }

    /// Resolve the owning conversation for a participant set, matching
    /// against any of the six identity keys.
    pub async fn find_by_identity(&self, participants: &[String]) -> Result<Option<i64>> {
        let keys = IdentityKeys::from_participants(participants);
        self.db.find_conversation_by_identity(&keys).await
    }

    /// Explicitly create a thread (group creation) before any message
    /// exists. Returns the existing id if the participant set already
    /// has one.
    pub async fn create(&self, participants: &[String], title: &str) -> Result<i64> {
        let keys = IdentityKeys::from_participants(participants);
        if let Some(existing) = self.db.find_conversation_by_identity(&keys).await? {
            return Ok(existing);
        }

        let joined = join_participants(participants);
        let title = if title.is_empty() {
            joined.clone()
        } else {
            title.to_string()
        };
        let mut conversation =
            Conversation::new(joined, keys.default_key().to_string(), title);
        // User-created threads have nothing to read yet.
        conversation.read = true;
        self.db.insert_conversation(&conversation).await?;

        let id = conversation.id;
        let mirror = self.mirror.clone();
        spawn_best_effort(async move { mirror.added_conversation(&conversation).await });
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Conversation> {
        self.db
            .get_conversation(id)
            .await?
            .ok_or_else(|| StoreError::Validation(format!("no conversation with id {}", id)))
    }

    pub async fn find(&self, id: i64) -> Result<Option<Conversation>> {
        self.db.get_conversation(id).await
    }

    pub async fn archive(&self, id: i64, archived: bool) -> Result<()> {
        self.db.set_conversation_archived(id, archived).await?;
        self.mirror_updated(id).await;
        Ok(())
    }

    pub async fn pin(&self, id: i64, pinned: bool) -> Result<()> {
        self.db.set_conversation_pinned(id, pinned).await?;
        self.mirror_updated(id).await;
        Ok(())
    }

    pub async fn mute(&self, id: i64, muted: bool) -> Result<()> {
        self.db.set_conversation_muted(id, muted).await?;
        self.mirror_updated(id).await;
        Ok(())
    }

    pub async fn update_title(&self, id: i64, title: &str) -> Result<()> {
        self.db.update_conversation_title(id, title).await?;
        self.mirror_updated(id).await;
        Ok(())
    }

    /// Full settings update (notification, color, folder fields).
    pub async fn update_settings(&self, conversation: &Conversation) -> Result<()> {
        self.db.update_conversation_settings(conversation).await?;

        let mirror = self.mirror.clone();
        let conversation = conversation.clone();
        spawn_best_effort(async move { mirror.updated_conversation(&conversation).await });
        Ok(())
    }

    /// Delete a conversation and (by cascade) its messages.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.db.delete_conversation(id).await?;

        let mirror = self.mirror.clone();
        spawn_best_effort(async move { mirror.deleted_conversation(id).await });
        Ok(())
    }

    pub async fn unarchived(&self) -> Result<Vec<Conversation>> {
        self.db.get_unarchived_conversations().await
    }

    pub async fn pinned(&self) -> Result<Vec<Conversation>> {
        self.db.get_pinned_conversations().await
    }

    pub async fn archived(&self) -> Result<Vec<Conversation>> {
        self.db.get_archived_conversations().await
    }

    /// Unread partition; includes muted conversations.
    pub async fn unread(&self) -> Result<Vec<Conversation>> {
        self.db.get_unread_conversations().await
    }

    /// Numeric unread badge; excludes muted conversations even though
    /// they remain in [`ConversationService::unread`].
    pub async fn unread_count(&self) -> Result<i64> {
        self.db.unread_conversation_count().await
    }

    pub async fn search_by_title(&self, query: &str) -> Result<Vec<Conversation>> {
        self.db.search_conversations_by_title(query).await
    }

    /// Fetch the updated row and mirror it; failure to read back is
    /// only a lost mirror push, never a local error.
    async fn mirror_updated(&self, id: i64) {
        match self.db.get_conversation(id).await {
            Ok(Some(conversation)) => {
                let mirror = self.mirror.clone();
                spawn_best_effort(async move { mirror.updated_conversation(&conversation).await });
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, id, "could not read conversation back for mirroring");
            }
        }
    }
}
