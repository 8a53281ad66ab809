//! Storage backends for the Warren URL store.
//!
//! All three backends implement [`warren_core::UrlStore`] with the same
//! dedup and soft-delete semantics:
//!
//! - [`InMemoryStore`]: volatile, for tests and single-process setups.
//! - [`FileStore`]: in-memory maps made durable by a JSON-lines write-ahead log.
//! - [`PostgresStore`]: a `urls` table with a unique constraint on the original URL.

mod index;

pub mod file;
pub mod memory;
pub mod postgres;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use warren_core::{StorageError, UrlStore};
