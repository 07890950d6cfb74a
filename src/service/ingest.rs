//! Ingestion pipeline
//!
//! Orchestrates the path every inbound or outbound message takes:
//! normalize participants, blacklist check, identity match-or-create,
//! transactional persist with summary update, then a best-effort mirror
//! push. The same path serves live SMS broadcasts, bulk historical
//! import, and remote-sync downloads, and must produce identical results
//! for all three even when they race.
//!
//! Per-message states run strictly in order and are not resumable:
//! RECEIVED_RAW -> NORMALIZED -> BLACKLIST_CHECKED -> CONVERSATION_RESOLVED
//! -> MESSAGE_PERSISTED -> SUMMARY_UPDATED -> MIRRORED(best-effort).
//! A persist failure is retried once by the self-healing store handle;
//! identity resolution and the blacklist check are never re-run, since a
//! partially committed write could otherwise spawn a second conversation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::blacklist::is_blocked;
use crate::data::{
    Conversation, ConversationTarget, Database, Message, MessageKind,
};
use crate::error::Result;
use crate::identity::{IdentityKeys, join_participants, parse_participants};
use crate::mirror::{RemoteMirror, spawn_best_effort};

/// Two broadcasts of the same SMS within this window count as one message.
const DUPLICATE_WINDOW_MS: i64 = 10_000;

/// A raw event from the device provider, the compose UI, or a
/// remote-sync download.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Comma-separated raw participant numbers ("5551234, 5559999")
    pub participants: String,
    /// Text body or media placeholder
    pub body: String,
    pub mime_type: String,
    /// Epoch millis
    pub timestamp: i64,
    pub kind: MessageKind,
    /// Sender display name for group messages
    pub sender: Option<String>,
    pub sim_subscription_id: Option<i32>,
    pub sim_phone_number: Option<String>,
    pub sent_device_id: Option<i64>,
}

impl IncomingMessage {
    /// A plain-text event with the common fields filled in.
    pub fn text(participants: &str, body: &str, timestamp: i64, kind: MessageKind) -> Self {
        Self {
            participants: participants.to_string(),
            body: body.to_string(),
            mime_type: crate::data::MIME_TEXT_PLAIN.to_string(),
            timestamp,
            kind,
            sender: None,
            sim_subscription_id: None,
            sim_phone_number: None,
            sent_device_id: None,
        }
    }
}

/// Terminal pipeline states.
///
/// `Blocked` and `Duplicate` are normal outcomes, not errors: the
/// caller must treat them as "processed, nothing newly visible".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Persisted {
        conversation_id: i64,
        message_id: i64,
    },
    /// Suppressed duplicate broadcast; points at the already-stored row
    Duplicate {
        conversation_id: i64,
        message_id: i64,
    },
    /// Blacklist hit; no conversation or message was created
    Blocked,
}

/// The ingestion pipeline.
pub struct IngestionPipeline {
    db: Arc<Database>,
    mirror: Arc<RemoteMirror>,
}

impl IngestionPipeline {
    pub fn new(db: Arc<Database>, mirror: Arc<RemoteMirror>) -> Self {
        Self { db, mirror }
    }

    /// Ingest one message end to end.
    pub async fn ingest(&self, event: IncomingMessage) -> Result<IngestOutcome> {
        // NORMALIZED
        let participants = parse_participants(&event.participants);

        // BLACKLIST_CHECKED: only inbound traffic is filtered, and it is
        // filtered before any conversation or message work.
        if event.kind == MessageKind::Received {
            let entries = self.db.get_blacklist_entries().await?;
            if is_blocked(&entries, &participants[0], Some(&event.body)) {
                tracing::debug!(
                    sender = %participants[0],
                    "inbound message blocked by blacklist"
                );
                return Ok(IngestOutcome::Blocked);
            }
        }

        // CONVERSATION_RESOLVED
        let keys = IdentityKeys::from_participants(&participants);
        let existing = self.db.find_conversation_by_identity(&keys).await?;

        // Duplicate-broadcast suppression: the provider sometimes hands
        // us the same SMS twice in quick succession.
        if let Some(conversation_id) = existing {
            if event.kind == MessageKind::Received {
                if let Some(latest) = self.db.latest_message(conversation_id).await? {
                    if latest.kind == MessageKind::Received
                        && latest.data == event.body
                        && (latest.timestamp - event.timestamp).abs() <= DUPLICATE_WINDOW_MS
                    {
                        tracing::debug!(
                            conversation_id,
                            message_id = latest.id,
                            "suppressed duplicate broadcast"
                        );
                        return Ok(IngestOutcome::Duplicate {
                            conversation_id,
                            message_id: latest.id,
                        });
                    }
                }
            }
        }

        let mut message = build_message(&event);
        let new_conversation = match existing {
            Some(_) => None,
            None => Some(build_conversation(&participants, &keys, &event)),
        };

        // MESSAGE_PERSISTED + SUMMARY_UPDATED: one transaction, retried
        // once internally by the store handle. On a failure after retry,
        // compare the visible state against what we tried to write; if
        // our row landed, the failure was on the reporting side only.
        let target = match (&existing, &new_conversation) {
            (Some(id), _) => ConversationTarget::Existing(*id),
            (None, Some(conversation)) => ConversationTarget::Create(conversation),
            (None, None) => unreachable!(),
        };

        let conversation_id = match self.db.persist_message(target, &message).await {
            Ok(conversation_id) => conversation_id,
            Err(error) => {
                let checked_id = existing
                    .or_else(|| new_conversation.as_ref().map(|c| c.id))
                    .unwrap_or_default();
                let latest_after = self.db.latest_message(checked_id).await.unwrap_or(None);
                if latest_after.map(|m| m.id) == Some(message.id) {
                    tracing::warn!(
                        conversation_id = checked_id,
                        message_id = message.id,
                        "persist reported failure but the row is visible; treating as ingested"
                    );
                    checked_id
                } else {
                    return Err(error);
                }
            }
        };
        message.conversation_id = conversation_id;

        if let Ok(unread) = self.db.unread_conversation_count().await {
            tracing::debug!(unread, "unread badge recomputed");
        }

        // MIRRORED (best-effort, never gates local success)
        if let Some(conversation) = new_conversation {
            let mirror = self.mirror.clone();
            spawn_best_effort(async move { mirror.added_conversation(&conversation).await });
        }
        let mirror = self.mirror.clone();
        let mirrored = message.clone();
        spawn_best_effort(async move {
            mirror.added_message(mirrored.conversation_id, &mirrored).await
        });

        tracing::debug!(
            conversation_id,
            message_id = message.id,
            kind = message.kind.as_str(),
            "message ingested"
        );

        Ok(IngestOutcome::Persisted {
            conversation_id,
            message_id: message.id,
        })
    }

    /// Bulk historical import.
    ///
    /// Conversations are resolved up front but creations are deferred:
    /// new conversations commit in the same transaction as the messages,
    /// so a failed batch leaves no empty ghost threads behind. Blacklist
    /// and duplicate rules apply per row.
    pub async fn ingest_batch(&self, events: Vec<IncomingMessage>) -> Result<Vec<IngestOutcome>> {
        let entries = self.db.get_blacklist_entries().await?;
        let mut resolved: HashMap<String, i64> = HashMap::new();
        let mut outcomes = Vec::with_capacity(events.len());
        let mut pending: Vec<Message> = Vec::with_capacity(events.len());
        let mut created: Vec<Conversation> = Vec::new();

        for event in &events {
            let participants = parse_participants(&event.participants);

            if event.kind == MessageKind::Received
                && is_blocked(&entries, &participants[0], Some(&event.body))
            {
                outcomes.push(IngestOutcome::Blocked);
                continue;
            }

            let keys = IdentityKeys::from_participants(&participants);
            let conversation_id = match resolved.get(keys.default_key()) {
                Some(id) => *id,
                None => {
                    // Pending creates are not visible in the store yet,
                    // so the identity lookup must also scan them.
                    let pending_create = created
                        .iter()
                        .find(|c| keys.all().contains(&c.id_matcher.as_str()))
                        .map(|c| c.id);
                    let id = match self.db.find_conversation_by_identity(&keys).await? {
                        Some(id) => id,
                        None => match pending_create {
                            Some(id) => id,
                            None => {
                                let conversation =
                                    build_conversation(&participants, &keys, event);
                                let id = conversation.id;
                                created.push(conversation);
                                id
                            }
                        },
                    };
                    resolved.insert(keys.default_key().to_string(), id);
                    id
                }
            };

            // Duplicate check against both the store and earlier rows
            // of this same batch.
            if event.kind == MessageKind::Received {
                let batch_dup = pending.iter().rev().find(|m| {
                    m.conversation_id == conversation_id
                        && m.kind == MessageKind::Received
                        && m.data == event.body
                        && (m.timestamp - event.timestamp).abs() <= DUPLICATE_WINDOW_MS
                });
                if let Some(duplicate) = batch_dup {
                    outcomes.push(IngestOutcome::Duplicate {
                        conversation_id,
                        message_id: duplicate.id,
                    });
                    continue;
                }

                if let Some(latest) = self.db.latest_message(conversation_id).await? {
                    if latest.kind == MessageKind::Received
                        && latest.data == event.body
                        && (latest.timestamp - event.timestamp).abs() <= DUPLICATE_WINDOW_MS
                    {
                        outcomes.push(IngestOutcome::Duplicate {
                            conversation_id,
                            message_id: latest.id,
                        });
                        continue;
                    }
                }
            }

            let mut message = build_message(event);
            message.conversation_id = conversation_id;
            outcomes.push(IngestOutcome::Persisted {
                conversation_id,
                message_id: message.id,
            });
            pending.push(message);
        }

        self.db.insert_message_batch(&created, &pending).await?;

        tracing::info!(
            imported = pending.len(),
            conversations_created = created.len(),
            skipped = events.len() - pending.len(),
            "bulk import committed"
        );

        for conversation in created {
            let mirror = self.mirror.clone();
            spawn_best_effort(async move { mirror.added_conversation(&conversation).await });
        }
        for message in pending {
            let mirror = self.mirror.clone();
            spawn_best_effort(async move {
                mirror.added_message(message.conversation_id, &message).await
            });
        }

        Ok(outcomes)
    }
}

fn build_message(event: &IncomingMessage) -> Message {
    let mut message = Message::new(
        event.kind,
        event.body.clone(),
        event.mime_type.clone(),
        event.timestamp,
    );
    message.sender = event.sender.clone();
    message.sim_phone_number = event.sim_phone_number.clone();
    message.sent_device_id = event.sent_device_id;
    message
}

fn build_conversation(
    participants: &[String],
    keys: &IdentityKeys,
    event: &IncomingMessage,
) -> Conversation {
    let joined = join_participants(participants);
    // Without a contact lookup the raw participant list doubles as the
    // title until the caller renames it.
    let mut conversation =
        Conversation::new(joined.clone(), keys.default_key().to_string(), joined);
    conversation.timestamp = event.timestamp;
    conversation.sim_subscription_id = event.sim_subscription_id;
    conversation
}
