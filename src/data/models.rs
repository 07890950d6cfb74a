//! Data models
//!
//! Rust structs representing database entities. IDs are random 64-bit
//! integers so that multiple offline devices can assign them without a
//! central sequence allocator.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound for generated IDs.
///
/// Bounding the range keeps IDs small enough to combine across bulk
/// uploads of ~100k messages without overflow while keeping collision
/// probability acceptable (~1 in 200,000 at 100k inserts).
pub const MAX_ID: i64 = i64::MAX / 10_000;

/// Generate a random entity ID, uniform in `[1, i64::MAX / 10_000]`.
///
/// Collisions are not detected here; they surface as primary-key insert
/// failures the caller may retry with a fresh ID.
pub fn generate_id() -> i64 {
    rand::thread_rng().gen_range(1..=MAX_ID)
}

/// Material-ish palette used when no contact-derived color is available.
pub const COLOR_PALETTE: [i32; 8] = [
    0xF44336, // red
    0xE91E63, // pink
    0x9C27B0, // purple
    0x3F51B5, // indigo
    0x03A9F4, // light blue
    0x009688, // teal
    0xFF9800, // orange
    0x795548, // brown
];

/// Pick a random palette color for a new conversation.
pub fn random_palette_color() -> i32 {
    let idx = rand::thread_rng().gen_range(0..COLOR_PALETTE.len());
    COLOR_PALETTE[idx]
}

pub const MIME_TEXT_PLAIN: &str = "text/plain";

// =============================================================================
// Conversation
// =============================================================================

/// A thread tied to a fixed, order-independent set of participants.
///
/// Exactly one row should exist per distinct normalized participant set.
/// That is enforced by identity-key lookup before insert, not by a DB
/// uniqueness constraint; duplicate rows under race are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: i64,
    /// Ordered, comma-space-joined raw participant list
    pub phone_numbers: String,
    /// Canonical identity key (8-digit no-formatting bucket)
    pub id_matcher: String,
    pub title: String,
    /// Conversation-list preview text, kept in sync with the most recent
    /// eligible message
    pub snippet: String,
    /// Last-activity epoch millis
    pub timestamp: i64,
    pub pinned: bool,
    pub read: bool,
    pub archived: bool,
    pub muted: bool,
    pub private_notifications: bool,
    pub color: i32,
    pub color_dark: i32,
    pub color_light: i32,
    pub color_accent: i32,
    pub led_color: i32,
    pub ringtone_uri: Option<String>,
    pub image_uri: Option<String>,
    pub sim_subscription_id: Option<i32>,
    pub folder_id: Option<i64>,
}

impl Conversation {
    /// Construct a fresh conversation for a participant set.
    ///
    /// New conversations start unread, unpinned, unmuted, unarchived,
    /// with a random palette color.
    pub fn new(phone_numbers: String, id_matcher: String, title: String) -> Self {
        let color = random_palette_color();
        Self {
            id: generate_id(),
            phone_numbers,
            id_matcher,
            title,
            snippet: String::new(),
            timestamp: 0,
            pinned: false,
            read: false,
            archived: false,
            muted: false,
            private_notifications: false,
            color,
            color_dark: color,
            color_light: color,
            color_accent: color,
            led_color: -1,
            ringtone_uri: None,
            image_uri: None,
            sim_subscription_id: None,
            folder_id: None,
        }
    }
}

// =============================================================================
// Message
// =============================================================================

/// Message direction/state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Received,
    Sent,
    Sending,
    Delivered,
    Error,
    Info,
    /// MIME placeholder row preceding the real media payload; never
    /// drives the conversation summary
    Media,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Sent => "sent",
            Self::Sending => "sending",
            Self::Delivered => "delivered",
            Self::Error => "error",
            Self::Info => "info",
            Self::Media => "media",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "sent" => Self::Sent,
            "sending" => Self::Sending,
            "delivered" => Self::Delivered,
            "error" => Self::Error,
            "info" => Self::Info,
            "media" => Self::Media,
            _ => Self::Received,
        }
    }

    /// Outgoing kinds get the "You: " snippet prefix.
    pub fn is_outgoing(&self) -> bool {
        matches!(self, Self::Sent | Self::Sending | Self::Delivered)
    }
}

/// A single message within a conversation.
///
/// `timestamp` ordering defines display order within a conversation.
/// After creation only `kind`, `read`, `seen`, and `data` (media URI
/// backfill) are ever mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub kind: MessageKind,
    /// Text body, or a media URI/placeholder string
    pub data: String,
    pub mime_type: String,
    /// Epoch millis
    pub timestamp: i64,
    pub read: bool,
    pub seen: bool,
    /// Sender display name for group chats, None for 1:1
    pub sender: Option<String>,
    /// Per-sender color override for group chats
    pub color: Option<i32>,
    pub sim_phone_number: Option<String>,
    pub sent_device_id: Option<i64>,
}

impl Message {
    /// Construct a message with a freshly generated ID, not yet tied to
    /// a conversation.
    pub fn new(kind: MessageKind, data: String, mime_type: String, timestamp: i64) -> Self {
        Self {
            id: generate_id(),
            conversation_id: 0,
            kind,
            data,
            mime_type,
            timestamp,
            read: kind != MessageKind::Received,
            seen: kind != MessageKind::Received,
            sender: None,
            color: None,
            sim_phone_number: None,
            sent_device_id: None,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for Message {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            kind: MessageKind::parse(row.try_get::<&str, _>("kind")?),
            data: row.try_get("data")?,
            mime_type: row.try_get("mime_type")?,
            timestamp: row.try_get("timestamp")?,
            read: row.try_get("read")?,
            seen: row.try_get("seen")?,
            sender: row.try_get("sender")?,
            color: row.try_get("color")?,
            sim_phone_number: row.try_get("sim_phone_number")?,
            sent_device_id: row.try_get("sent_device_id")?,
        })
    }
}

/// A body-search hit joined with its conversation title.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageSearchResult {
    pub id: i64,
    pub conversation_id: i64,
    pub data: String,
    pub timestamp: i64,
    pub conversation_title: String,
}

/// Snippet text a message contributes to its conversation.
///
/// Empty for Info messages and any non-plain-text mimetype; outgoing
/// messages are prefixed with the localized "You: " label. Media
/// messages never reach this function (the summary is not touched).
pub fn snippet_for(kind: MessageKind, data: &str, mime_type: &str) -> String {
    if kind == MessageKind::Info || mime_type != MIME_TEXT_PLAIN {
        return String::new();
    }
    if kind.is_outgoing() {
        format!("You: {}", data)
    } else {
        data.to_string()
    }
}

// =============================================================================
// Blacklist
// =============================================================================

/// A rule that suppresses ingestion of matching inbound messages.
///
/// Either field may be set; a message is blocked when *any* entry
/// matches by number or by phrase (OR semantics).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlacklistEntry {
    pub id: i64,
    pub phone_number: Option<String>,
    pub phrase: Option<String>,
}

impl BlacklistEntry {
    pub fn by_number(phone_number: String) -> Self {
        Self {
            id: generate_id(),
            phone_number: Some(phone_number),
            phrase: None,
        }
    }

    pub fn by_phrase(phrase: String) -> Self {
        Self {
            id: generate_id(),
            phone_number: None,
            phrase: Some(phrase),
        }
    }
}
