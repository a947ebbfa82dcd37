//! Persistence layer
//!
//! SQLite-based storage for the ordered message dataset that
//! [`SqliteSource`](crate::source::SqliteSource) pages through.

mod database;
mod messages;

pub use database::{Database, SharedDatabase};
pub use messages::MessageStore;
