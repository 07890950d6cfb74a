//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations (self-healing handle)
//! - Entity models and ID generation

mod database;
mod models;

pub use database::{ConversationTarget, Database};
pub use models::*;

#[cfg(test)]
mod database_test;
