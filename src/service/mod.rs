//! Service layer
//!
//! Business logic over the data layer: conversation and message store
//! surfaces, blacklist management, and the ingestion pipeline.

mod blacklist;
mod conversation;
mod ingest;
mod message;

pub use blacklist::BlacklistService;
pub use conversation::ConversationService;
pub use ingest::{IncomingMessage, IngestOutcome, IngestionPipeline};
pub use message::MessageService;
