//! Chat history persistence for Confab.
//!
//! Implementations of the `confab_core::HistoryStore` trait: SQLite for the
//! real service, an in-memory store for tests.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryHistory;
pub use sqlite::SqliteHistory;
