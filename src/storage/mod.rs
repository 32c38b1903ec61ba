//! SQLite storage for extracted regatta results
//!
//! Sailors and categories are upserted by normalized name, so repeated
//! runs over overlapping pages converge on one identity per sailor.

pub mod repository;
pub mod schema;

pub use repository::{ResultStore, SqliteStore, StoreStats, StoreSummary, StoredResult};
pub use schema::create_tables;
