//! SQLite database operations
//!
//! All database access goes through this module. The connection pool is
//! held behind a self-healing handle: on a transient data-access error
//! the pool is torn down, reopened after a short fixed backoff, and the
//! failing statement retried exactly once. A second failure surfaces as
//! [`StoreError::StoreUnavailable`].
//!
//! This is deliberately not transactional isolation. Concurrent writers
//! still interleave at the row level; the only hard ordering guarantee
//! is SQLite transaction atomicity for statements inside an explicit
//! `BEGIN IMMEDIATE` block (bulk import, insert-plus-summary).

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use tokio::sync::Mutex;

use super::models::*;
use crate::error::StoreError;
use crate::identity::IdentityKeys;

/// Where a persisted message should land.
#[derive(Debug, Clone, Copy)]
pub enum ConversationTarget<'a> {
    /// A conversation already resolved by identity lookup
    Existing(i64),
    /// No identity match; create this conversation in the same transaction
    Create(&'a Conversation),
}

/// Self-healing SQLite handle.
///
/// The pool is lazily (re)initialized and explicitly invalidatable.
/// This is the only shared mutable state in the library.
pub struct Database {
    path: PathBuf,
    pool: Mutex<Option<SqlitePool>>,
    reopen_backoff: Duration,
}

/// Errors worth a teardown-and-reopen cycle: a closed or exhausted pool,
/// I/O faults, and SQLITE_BUSY/SQLITE_LOCKED.
fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6") | Some("261") | Some("262"))
        }
        _ => false,
    }
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to the SQLite database.
    ///
    /// Creates the database file if it doesn't exist and runs pending
    /// migrations automatically.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        Self::connect_with_backoff(path, Duration::from_millis(1_000)).await
    }

    /// Connect with an explicit reopen backoff (from configuration).
    pub async fn connect_with_backoff(
        path: &Path,
        reopen_backoff: Duration,
    ) -> Result<Self, StoreError> {
        let pool = open_pool(path).await?;
        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self {
            path: path.to_path_buf(),
            pool: Mutex::new(Some(pool)),
            reopen_backoff,
        })
    }

    /// Close the underlying pool. The next statement lazily reopens it.
    pub async fn close(&self) {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
            tracing::info!("Database handle closed");
        }
    }

    /// Current pool, lazily opening if the handle was closed.
    async fn ensure_open(&self) -> Result<SqlitePool, StoreError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let pool = open_pool(&self.path).await?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Tear down the pool and reopen it after the configured backoff.
    async fn reopen(&self) -> Result<SqlitePool, StoreError> {
        let mut guard = self.pool.lock().await;
        if let Some(old) = guard.take() {
            old.close().await;
        }
        tokio::time::sleep(self.reopen_backoff).await;

        let pool = open_pool(&self.path).await?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Run a statement with the reopen-and-retry-once policy.
    ///
    /// Non-transient errors propagate immediately. A transient error on
    /// the retry surfaces as [`StoreError::StoreUnavailable`].
    pub(crate) async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(SqlitePool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let pool = self.ensure_open().await?;
        match op(pool).await {
            Ok(value) => Ok(value),
            Err(error) if is_transient(&error) => {
                tracing::warn!(%error, "store not actionable; reopening connection");
                let pool = self.reopen().await?;
                op(pool).await.map_err(|retry_error| {
                    if is_transient(&retry_error) {
                        tracing::error!(error = %retry_error, "store still unavailable after reopen");
                        StoreError::StoreUnavailable
                    } else {
                        StoreError::Database(retry_error)
                    }
                })
            }
            Err(error) => Err(StoreError::Database(error)),
        }
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Insert a conversation row.
    pub async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            let mut conn = pool.acquire().await?;
            insert_conversation_tx(&mut conn, conversation).await?;
            Ok(())
        })
        .await
    }

    /// Get a conversation by ID.
    pub async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
                .bind(id)
                .fetch_optional(&pool)
                .await
        })
        .await
    }

    /// Look up a conversation by any of the six identity keys.
    ///
    /// First row wins under multi-row ambiguity; duplicate conversations
    /// silently diverging is an accepted risk of the random-id plus
    /// best-effort-matching design.
    pub async fn find_conversation_by_identity(
        &self,
        keys: &IdentityKeys,
    ) -> Result<Option<i64>, StoreError> {
        self.with_retry(|pool| async move {
            let [five, seven, seven_raw, eight, eight_raw, ten] = keys.all();
            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM conversations WHERE id_matcher IN (?, ?, ?, ?, ?, ?) LIMIT 1",
            )
            .bind(five)
            .bind(seven)
            .bind(seven_raw)
            .bind(eight)
            .bind(eight_raw)
            .bind(ten)
            .fetch_optional(&pool)
            .await
        })
        .await
    }

    /// Persist a message and its conversation summary as one logical unit.
    ///
    /// Conversation creation (when the identity lookup missed), the
    /// message insert, and the denormalized summary update run inside a
    /// single `BEGIN IMMEDIATE` transaction, so a failure leaves no
    /// partial writes visible. Media messages skip the summary update:
    /// their MIME placeholder precedes the real payload arriving later.
    pub async fn persist_message(
        &self,
        target: ConversationTarget<'_>,
        message: &Message,
    ) -> Result<i64, StoreError> {
        self.with_retry(|pool| async move {
            let mut conn = pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            match persist_message_tx(&mut conn, target, message).await {
                Ok(conversation_id) => {
                    sqlx::query("COMMIT").execute(&mut *conn).await?;
                    Ok(conversation_id)
                }
                Err(error) => {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Err(error)
                }
            }
        })
        .await
    }

    pub async fn set_conversation_archived(&self, id: i64, archived: bool) -> Result<(), StoreError> {
        self.set_conversation_flag(id, "archived", archived).await
    }

    pub async fn set_conversation_pinned(&self, id: i64, pinned: bool) -> Result<(), StoreError> {
        self.set_conversation_flag(id, "pinned", pinned).await
    }

    pub async fn set_conversation_muted(&self, id: i64, muted: bool) -> Result<(), StoreError> {
        self.set_conversation_flag(id, "muted", muted).await
    }

    async fn set_conversation_flag(
        &self,
        id: i64,
        column: &'static str,
        value: bool,
    ) -> Result<(), StoreError> {
        // Column names come from the fixed call sites above, never input.
        let sql = format!("UPDATE conversations SET {} = ? WHERE id = ?", column);
        self.with_retry(|pool| {
            let sql = sql.clone();
            async move {
                sqlx::query(&sql).bind(value).bind(id).execute(&pool).await?;
                Ok(())
            }
        })
        .await
    }

    pub async fn update_conversation_title(&self, id: i64, title: &str) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("UPDATE conversations SET title = ? WHERE id = ?")
                .bind(title)
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Full-object settings update (everything except id and identity).
    pub async fn update_conversation_settings(
        &self,
        conversation: &Conversation,
    ) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query(
                r#"
                UPDATE conversations SET
                    title = ?, pinned = ?, muted = ?, archived = ?,
                    private_notifications = ?, color = ?, color_dark = ?,
                    color_light = ?, color_accent = ?, led_color = ?,
                    ringtone_uri = ?, image_uri = ?, sim_subscription_id = ?,
                    folder_id = ?
                WHERE id = ?
                "#,
            )
            .bind(&conversation.title)
            .bind(conversation.pinned)
            .bind(conversation.muted)
            .bind(conversation.archived)
            .bind(conversation.private_notifications)
            .bind(conversation.color)
            .bind(conversation.color_dark)
            .bind(conversation.color_light)
            .bind(conversation.color_accent)
            .bind(conversation.led_color)
            .bind(&conversation.ringtone_uri)
            .bind(&conversation.image_uri)
            .bind(conversation.sim_subscription_id)
            .bind(conversation.folder_id)
            .bind(conversation.id)
            .execute(&pool)
            .await?;
            Ok(())
        })
        .await
    }

    /// Delete a conversation; its messages cascade.
    pub async fn delete_conversation(&self, id: i64) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("DELETE FROM conversations WHERE id = ?")
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Unarchived partition: pinned first, then most recent activity.
    pub async fn get_unarchived_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Conversation>(
                "SELECT * FROM conversations WHERE archived = 0 \
                 ORDER BY pinned DESC, timestamp DESC",
            )
            .fetch_all(&pool)
            .await
        })
        .await
    }

    pub async fn get_pinned_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Conversation>(
                "SELECT * FROM conversations WHERE pinned = 1 ORDER BY timestamp DESC",
            )
            .fetch_all(&pool)
            .await
        })
        .await
    }

    pub async fn get_archived_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Conversation>(
                "SELECT * FROM conversations WHERE archived = 1 ORDER BY timestamp DESC",
            )
            .fetch_all(&pool)
            .await
        })
        .await
    }

    /// Unread partition. Muted conversations stay in this list even
    /// though they are excluded from [`Database::unread_conversation_count`].
    pub async fn get_unread_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Conversation>(
                "SELECT * FROM conversations WHERE read = 0 AND archived = 0 \
                 ORDER BY timestamp DESC",
            )
            .fetch_all(&pool)
            .await
        })
        .await
    }

    /// Numeric unread badge: unread, unarchived, and *not muted*.
    pub async fn unread_conversation_count(&self) -> Result<i64, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM conversations \
                 WHERE read = 0 AND archived = 0 AND muted = 0",
            )
            .fetch_one(&pool)
            .await
        })
        .await
    }

    /// Case-insensitive title substring search.
    pub async fn search_conversations_by_title(
        &self,
        query: &str,
    ) -> Result<Vec<Conversation>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Conversation>(
                "SELECT * FROM conversations WHERE title LIKE '%' || ? || '%' \
                 ORDER BY timestamp DESC",
            )
            .bind(query)
            .fetch_all(&pool)
            .await
        })
        .await
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Insert a message row without touching the conversation summary.
    ///
    /// Callers almost always want [`Database::persist_message`] instead.
    pub async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            let mut conn = pool.acquire().await?;
            insert_message_tx(&mut conn, message.conversation_id, message).await?;
            Ok(())
        })
        .await
    }

    /// Bulk import: newly created conversations and every message
    /// (conversation already resolved) are inserted, with per-row
    /// summary updates, inside one transaction. A failure anywhere in
    /// the batch rolls back the conversation creations too, so no
    /// empty ghost threads remain visible.
    pub async fn insert_message_batch(
        &self,
        conversations: &[Conversation],
        messages: &[Message],
    ) -> Result<(), StoreError> {
        if conversations.is_empty() && messages.is_empty() {
            return Ok(());
        }

        self.with_retry(|pool| async move {
            let mut conn = pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            let result: Result<(), sqlx::Error> = async {
                for conversation in conversations {
                    insert_conversation_tx(&mut conn, conversation).await?;
                }
                for message in messages {
                    insert_message_tx(&mut conn, message.conversation_id, message).await?;
                    if message.kind != MessageKind::Media {
                        let snippet =
                            snippet_for(message.kind, &message.data, &message.mime_type);
                        update_summary_tx(
                            &mut conn,
                            message.conversation_id,
                            &snippet,
                            message.timestamp,
                            message.kind != MessageKind::Received,
                        )
                        .await?;
                    }
                }
                Ok(())
            }
            .await;

            match result {
                Ok(()) => {
                    sqlx::query("COMMIT").execute(&mut *conn).await?;
                    Ok(())
                }
                Err(error) => {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Err(error)
                }
            }
        })
        .await
    }

    pub async fn get_message(&self, id: i64) -> Result<Option<Message>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
                .bind(id)
                .fetch_optional(&pool)
                .await
        })
        .await
    }

    /// Most recent message in a conversation (duplicate-broadcast check).
    pub async fn latest_message(&self, conversation_id: i64) -> Result<Option<Message>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Message>(
                "SELECT * FROM messages WHERE conversation_id = ? \
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
            )
            .bind(conversation_id)
            .fetch_optional(&pool)
            .await
        })
        .await
    }

    /// Most recent `limit` messages in ascending timestamp order.
    ///
    /// Computed as count-then-offset rather than LIMIT from the end so
    /// the caller receives rows already in delivery order.
    pub async fn get_message_page(
        &self,
        conversation_id: i64,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError> {
        self.with_retry(|pool| async move {
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?",
            )
            .bind(conversation_id)
            .fetch_one(&pool)
            .await?;

            let offset = (total - limit).max(0);
            sqlx::query_as::<_, Message>(
                "SELECT * FROM messages WHERE conversation_id = ? \
                 ORDER BY timestamp ASC, id ASC LIMIT ? OFFSET ?",
            )
            .bind(conversation_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&pool)
            .await
        })
        .await
    }

    /// Media rows for a conversation (gallery view).
    pub async fn get_media_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<Message>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, Message>(
                "SELECT * FROM messages WHERE conversation_id = ? AND kind = 'media' \
                 ORDER BY timestamp ASC",
            )
            .bind(conversation_id)
            .fetch_all(&pool)
            .await
        })
        .await
    }

    /// Case-insensitive plain-text body search, joined with the owning
    /// conversation's title.
    pub async fn search_messages_by_body(
        &self,
        query: &str,
    ) -> Result<Vec<MessageSearchResult>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, MessageSearchResult>(
                "SELECT m.id, m.conversation_id, m.data, m.timestamp, \
                        c.title AS conversation_title \
                 FROM messages m JOIN conversations c ON c.id = m.conversation_id \
                 WHERE m.mime_type = 'text/plain' AND m.data LIKE '%' || ? || '%' \
                 ORDER BY m.timestamp DESC",
            )
            .bind(query)
            .fetch_all(&pool)
            .await
        })
        .await
    }

    /// Mark every message in a conversation read and seen, and flip the
    /// conversation's read flag.
    pub async fn mark_conversation_read(&self, conversation_id: i64) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            let mut conn = pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            let result: Result<(), sqlx::Error> = async {
                sqlx::query(
                    "UPDATE messages SET read = 1, seen = 1 \
                     WHERE conversation_id = ? AND read = 0",
                )
                .bind(conversation_id)
                .execute(&mut *conn)
                .await?;
                sqlx::query("UPDATE conversations SET read = 1 WHERE id = ?")
                    .bind(conversation_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            }
            .await;

            match result {
                Ok(()) => {
                    sqlx::query("COMMIT").execute(&mut *conn).await?;
                    Ok(())
                }
                Err(error) => {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Err(error)
                }
            }
        })
        .await
    }

    pub async fn mark_all_read(&self) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            let mut conn = pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            let result: Result<(), sqlx::Error> = async {
                sqlx::query("UPDATE messages SET read = 1, seen = 1 WHERE read = 0")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("UPDATE conversations SET read = 1 WHERE read = 0")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            }
            .await;

            match result {
                Ok(()) => {
                    sqlx::query("COMMIT").execute(&mut *conn).await?;
                    Ok(())
                }
                Err(error) => {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Err(error)
                }
            }
        })
        .await
    }

    /// Mark messages seen (notification dismissed) without marking read.
    pub async fn mark_conversation_seen(&self, conversation_id: i64) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("UPDATE messages SET seen = 1 WHERE conversation_id = ? AND seen = 0")
                .bind(conversation_id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Message state progression (sending -> sent/delivered/error).
    pub async fn update_message_kind(&self, id: i64, kind: MessageKind) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("UPDATE messages SET kind = ? WHERE id = ?")
                .bind(kind.as_str())
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Media URI backfill for a placeholder row.
    pub async fn update_message_data(&self, id: i64, data: &str) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("UPDATE messages SET data = ? WHERE id = ?")
                .bind(data)
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_message(&self, id: i64) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("DELETE FROM messages WHERE id = ?")
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Age-based cleanup sweep: drops old messages, then conversations
    /// whose last activity predates the cutoff.
    pub async fn delete_older_than(&self, timestamp: i64) -> Result<u64, StoreError> {
        self.with_retry(|pool| async move {
            let mut conn = pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            let result: Result<u64, sqlx::Error> = async {
                let messages = sqlx::query("DELETE FROM messages WHERE timestamp < ?")
                    .bind(timestamp)
                    .execute(&mut *conn)
                    .await?
                    .rows_affected();
                sqlx::query("DELETE FROM conversations WHERE timestamp < ?")
                    .bind(timestamp)
                    .execute(&mut *conn)
                    .await?;
                Ok(messages)
            }
            .await;

            match result {
                Ok(count) => {
                    sqlx::query("COMMIT").execute(&mut *conn).await?;
                    Ok(count)
                }
                Err(error) => {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Err(error)
                }
            }
        })
        .await
    }

    // =========================================================================
    // Blacklist
    // =========================================================================

    pub async fn get_blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query_as::<_, BlacklistEntry>("SELECT * FROM blacklist ORDER BY id")
                .fetch_all(&pool)
                .await
        })
        .await
    }

    pub async fn insert_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("INSERT INTO blacklist (id, phone_number, phrase) VALUES (?, ?, ?)")
                .bind(entry.id)
                .bind(&entry.phone_number)
                .bind(&entry.phrase)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_blacklist_entry(&self, id: i64) -> Result<(), StoreError> {
        self.with_retry(|pool| async move {
            sqlx::query("DELETE FROM blacklist WHERE id = ?")
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }
}

async fn open_pool(path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Migration failed: {}", e);
        StoreError::Internal(anyhow::anyhow!("Migration failed: {}", e))
    })?;

    Ok(pool)
}

async fn insert_conversation_tx(
    conn: &mut SqliteConnection,
    conversation: &Conversation,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO conversations (
            id, phone_numbers, id_matcher, title, snippet, timestamp,
            pinned, read, archived, muted, private_notifications,
            color, color_dark, color_light, color_accent, led_color,
            ringtone_uri, image_uri, sim_subscription_id, folder_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(conversation.id)
    .bind(&conversation.phone_numbers)
    .bind(&conversation.id_matcher)
    .bind(&conversation.title)
    .bind(&conversation.snippet)
    .bind(conversation.timestamp)
    .bind(conversation.pinned)
    .bind(conversation.read)
    .bind(conversation.archived)
    .bind(conversation.muted)
    .bind(conversation.private_notifications)
    .bind(conversation.color)
    .bind(conversation.color_dark)
    .bind(conversation.color_light)
    .bind(conversation.color_accent)
    .bind(conversation.led_color)
    .bind(&conversation.ringtone_uri)
    .bind(&conversation.image_uri)
    .bind(conversation.sim_subscription_id)
    .bind(conversation.folder_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_message_tx(
    conn: &mut SqliteConnection,
    conversation_id: i64,
    message: &Message,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO messages (
            id, conversation_id, kind, data, mime_type, timestamp,
            read, seen, sender, color, sim_phone_number, sent_device_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(message.id)
    .bind(conversation_id)
    .bind(message.kind.as_str())
    .bind(&message.data)
    .bind(&message.mime_type)
    .bind(message.timestamp)
    .bind(message.read)
    .bind(message.seen)
    .bind(&message.sender)
    .bind(message.color)
    .bind(&message.sim_phone_number)
    .bind(message.sent_device_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn update_summary_tx(
    conn: &mut SqliteConnection,
    conversation_id: i64,
    snippet: &str,
    timestamp: i64,
    read: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE conversations SET snippet = ?, timestamp = ?, read = ? WHERE id = ?",
    )
    .bind(snippet)
    .bind(timestamp)
    .bind(read)
    .bind(conversation_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn persist_message_tx(
    conn: &mut SqliteConnection,
    target: ConversationTarget<'_>,
    message: &Message,
) -> Result<i64, sqlx::Error> {
    let conversation_id = match target {
        ConversationTarget::Existing(id) => id,
        ConversationTarget::Create(conversation) => {
            insert_conversation_tx(conn, conversation).await?;
            conversation.id
        }
    };

    insert_message_tx(conn, conversation_id, message).await?;

    if message.kind != MessageKind::Media {
        let snippet = snippet_for(message.kind, &message.data, &message.mime_type);
        update_summary_tx(
            conn,
            conversation_id,
            &snippet,
            message.timestamp,
            message.kind != MessageKind::Received,
        )
        .await?;
    }

    Ok(conversation_id)
}
