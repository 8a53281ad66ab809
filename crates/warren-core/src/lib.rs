//! Core types and traits for the Warren URL store.
//!
//! This crate holds the store contract shared by every backend in
//! `warren-storage`, the identifiers it is keyed by, and the narrow
//! [`DeletionSink`] seam the deletion pipeline is written against.

pub mod error;
pub mod short_id;
pub mod store;
pub mod task;

pub use error::{CoreError, StorageError};
pub use short_id::{OwnerId, ShortId};
pub use store::{BatchItem, BatchOutcome, DeletionSink, SaveStatus, Saved, UrlRecord, UrlStore};
pub use task::DeleteTask;
