//! Blacklist service
//!
//! Management surface for blacklist entries plus the pre-ingestion
//! block check. The check is a pure predicate over stored entries and
//! must run before any conversation or message work.

use std::sync::Arc;

use crate::blacklist::is_blocked;
use crate::data::{BlacklistEntry, Database};
use crate::error::Result;
use crate::mirror::{RemoteMirror, spawn_best_effort};

pub struct BlacklistService {
    db: Arc<Database>,
    mirror: Arc<RemoteMirror>,
}

impl BlacklistService {
    pub fn new(db: Arc<Database>, mirror: Arc<RemoteMirror>) -> Self {
        Self { db, mirror }
    }

    /// Entries as a simple list for the management UI.
    pub async fn entries(&self) -> Result<Vec<BlacklistEntry>> {
        self.db.get_blacklist_entries().await
    }

    pub async fn add(&self, entry: BlacklistEntry) -> Result<()> {
        self.db.insert_blacklist_entry(&entry).await?;

        let mirror = self.mirror.clone();
        spawn_best_effort(async move { mirror.added_blacklist(&entry).await });
        Ok(())
    }

    pub async fn remove(&self, id: i64) -> Result<()> {
        self.db.delete_blacklist_entry(id).await?;

        let mirror = self.mirror.clone();
        spawn_best_effort(async move { mirror.removed_blacklist(id).await });
        Ok(())
    }

    /// Whether an inbound (number, body) pair is suppressed.
    pub async fn is_blocked(&self, number: &str, text: Option<&str>) -> Result<bool> {
        let entries = self.db.get_blacklist_entries().await?;
        let blocked = is_blocked(&entries, number, text);
        if blocked {
            tracing::debug!(number, "inbound message blocked by blacklist");
        }
        Ok(blocked)
    }
}
