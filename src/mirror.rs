//! Remote mirror
//!
//! Pushes every local mutation to the multi-device sync backend. Calls
//! are strictly best-effort: failures are logged and never block or roll
//! back the local write. Local state is the source of truth and stays
//! authoritative even if a device is offline indefinitely.

use std::future::Future;

use crate::config::MirrorConfig;
use crate::data::{BlacklistEntry, Conversation, Message, MessageKind};
use crate::error::StoreError;

/// Best-effort sync client.
///
/// The per-account sync key is treated as an opaque credential; this
/// library never derives or inspects encryption material itself.
pub struct RemoteMirror {
    http_client: reqwest::Client,
    base_url: String,
    account_id: String,
    sync_key: Option<String>,
    device_id: i64,
    enabled: bool,
}

impl RemoteMirror {
    /// Build a mirror client from configuration.
    pub fn new(config: &MirrorConfig) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent("Threadline/0.1.0")
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StoreError::Internal(e.into()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            sync_key: config.sync_key.clone(),
            device_id: config.device_id,
            enabled: config.enabled,
        })
    }

    /// A mirror that drops every call (purely local operation, tests).
    pub fn disabled() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: String::new(),
            account_id: String::new(),
            sync_key: None,
            device_id: 0,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// POST one mutation to the backend.
    async fn post(&self, path: &str, payload: serde_json::Value) -> Result<(), StoreError> {
        if !self.enabled {
            return Ok(());
        }

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self
            .http_client
            .post(&url)
            .query(&[("account_id", self.account_id.as_str())])
            .json(&payload);

        if let Some(key) = &self.sync_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        response.error_for_status()?;

        tracing::debug!(%url, "mirrored mutation");
        Ok(())
    }

    pub async fn added_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.post(
            "conversations/add",
            serde_json::json!({
                "device_id": self.device_id,
                "conversation": conversation,
            }),
        )
        .await
    }

    pub async fn updated_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.post(
            "conversations/update",
            serde_json::json!({
                "device_id": self.device_id,
                "conversation": conversation,
            }),
        )
        .await
    }

    pub async fn deleted_conversation(&self, conversation_id: i64) -> Result<(), StoreError> {
        self.post(
            "conversations/remove",
            serde_json::json!({
                "device_id": self.device_id,
                "conversation_id": conversation_id,
            }),
        )
        .await
    }

    pub async fn added_message(
        &self,
        conversation_id: i64,
        message: &Message,
    ) -> Result<(), StoreError> {
        self.post(
            "messages/add",
            serde_json::json!({
                "device_id": self.device_id,
                "conversation_id": conversation_id,
                "message": message,
            }),
        )
        .await
    }

    pub async fn updated_message_kind(
        &self,
        message_id: i64,
        kind: MessageKind,
    ) -> Result<(), StoreError> {
        self.post(
            "messages/update",
            serde_json::json!({
                "device_id": self.device_id,
                "message_id": message_id,
                "kind": kind.as_str(),
            }),
        )
        .await
    }

    pub async fn marked_read(&self, conversation_id: i64) -> Result<(), StoreError> {
        self.post(
            "conversations/read",
            serde_json::json!({
                "device_id": self.device_id,
                "conversation_id": conversation_id,
            }),
        )
        .await
    }

    pub async fn added_blacklist(&self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        self.post(
            "blacklist/add",
            serde_json::json!({
                "device_id": self.device_id,
                "entry": entry,
            }),
        )
        .await
    }

    pub async fn removed_blacklist(&self, entry_id: i64) -> Result<(), StoreError> {
        self.post(
            "blacklist/remove",
            serde_json::json!({
                "device_id": self.device_id,
                "entry_id": entry_id,
            }),
        )
        .await
    }
}

/// Fire-and-forget a mirror call off the caller's task.
///
/// The local mutation has already committed by the time this runs;
/// failures are logged at warn and otherwise dropped.
pub fn spawn_best_effort<F>(future: F)
where
    F: Future<Output = Result<(), StoreError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(error) = future.await {
            tracing::warn!(%error, "remote mirror push failed; local state remains authoritative");
        }
    });
}
