//! Threadline - a local-first, multi-source messaging store
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Callers (UI, broadcast receiver,             │
//! │                 bulk importer, remote-sync downloader)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - IngestionPipeline (normalize → blacklist → identity →     │
//! │    persist → summary → mirror)                               │
//! │  - Conversation/Message/Blacklist services                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx) behind a self-healing handle                │
//! │  - Best-effort remote mirror (reqwest)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `service`: ingestion pipeline and store surfaces
//! - `data`: database and entity models
//! - `identity`: participant-set identity key derivation
//! - `blacklist`: inbound suppression predicates
//! - `mirror`: best-effort sync backend client
//! - `config`: configuration management
//! - `error`: error types

pub mod blacklist;
pub mod config;
pub mod data;
pub mod error;
pub mod identity;
pub mod mirror;
pub mod service;

use std::sync::Arc;

/// Composition root shared by all callers
///
/// Everything is dependency-injected: there is no process-wide static
/// state, and callers own exactly one `MessagingCore` per database.
#[derive(Clone)]
pub struct MessagingCore {
    /// Library configuration
    pub config: Arc<config::AppConfig>,

    /// Self-healing database handle
    pub db: Arc<data::Database>,

    /// Best-effort sync mirror
    pub mirror: Arc<mirror::RemoteMirror>,

    /// Ingestion pipeline (live SMS, bulk import, remote download)
    pub pipeline: Arc<service::IngestionPipeline>,

    /// Conversation store surface
    pub conversations: Arc<service::ConversationService>,

    /// Message store surface
    pub messages: Arc<service::MessageService>,

    /// Blacklist management and pre-ingestion checks
    pub blacklist: Arc<service::BlacklistService>,
}

impl MessagingCore {
    /// Initialize the messaging core
    ///
    /// # Steps
    /// 1. Connect to the SQLite database (runs migrations)
    /// 2. Build the mirror client
    /// 3. Wire up services and the ingestion pipeline
    ///
    /// # Errors
    /// Returns error if the database or mirror client cannot be built
    pub async fn new(config: config::AppConfig) -> Result<Self, error::StoreError> {
        tracing::info!("Initializing messaging core...");

        let db = Arc::new(
            data::Database::connect_with_backoff(
                &config.database.path,
                std::time::Duration::from_millis(config.database.reopen_backoff_ms),
            )
            .await?,
        );
        tracing::info!("Database connected");

        let mirror = Arc::new(mirror::RemoteMirror::new(&config.mirror)?);
        if mirror.is_enabled() {
            tracing::info!(base_url = %config.mirror.base_url, "Remote mirror enabled");
        } else {
            tracing::info!("Remote mirror disabled; operating purely locally");
        }

        let pipeline = Arc::new(service::IngestionPipeline::new(db.clone(), mirror.clone()));
        let conversations = Arc::new(service::ConversationService::new(
            db.clone(),
            mirror.clone(),
        ));
        let messages = Arc::new(service::MessageService::new(db.clone(), mirror.clone()));
        let blacklist = Arc::new(service::BlacklistService::new(db.clone(), mirror.clone()));

        tracing::info!("Messaging core initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            mirror,
            pipeline,
            conversations,
            messages,
            blacklist,
        })
    }
}
